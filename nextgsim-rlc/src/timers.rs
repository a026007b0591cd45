//! Timer service for RLC entities
//!
//! Entities allocate their protocol timers when configured (UM: reordering,
//! AM: poll-retransmit, reordering and status-prohibit), stop them when the
//! entity is stopped or reestablished, and release them when destroyed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Timer identifier handed out by a [`TimerService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u32);

impl TimerId {
    /// Creates a timer identifier from its raw value
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw identifier value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer({})", self.0)
    }
}

/// Timer service shared by all entities of a layer.
pub trait TimerService: Send + Sync {
    /// Allocates a new timer with the given duration in milliseconds
    fn allocate_timer(&self, duration_ms: u32) -> TimerId;

    /// Stops a running timer; stopping an idle or unknown timer is a no-op
    fn stop_timer(&self, id: TimerId);

    /// Returns a timer to the service
    fn release_timer(&self, id: TimerId);
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    duration_ms: u32,
    running: bool,
}

/// In-process [`TimerService`] tracking timer allocation state.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: AtomicU32,
    timers: Mutex<HashMap<TimerId, TimerSlot>>,
    stops: AtomicU64,
}

impl TimerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an allocated timer. Returns false for unknown identifiers.
    pub fn start_timer(&self, id: TimerId) -> bool {
        match self.timers.lock().get_mut(&id) {
            Some(slot) => {
                slot.running = true;
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` is allocated and running
    pub fn is_running(&self, id: TimerId) -> bool {
        self.timers.lock().get(&id).is_some_and(|slot| slot.running)
    }

    /// Configured duration of an allocated timer
    pub fn duration_ms(&self, id: TimerId) -> Option<u32> {
        self.timers.lock().get(&id).map(|slot| slot.duration_ms)
    }

    /// Number of currently allocated timers
    pub fn allocated(&self) -> usize {
        self.timers.lock().len()
    }

    /// Total number of stop requests served
    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }
}

impl TimerService for TimerRegistry {
    fn allocate_timer(&self, duration_ms: u32) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.timers.lock().insert(
            id,
            TimerSlot {
                duration_ms,
                running: false,
            },
        );
        id
    }

    fn stop_timer(&self, id: TimerId) {
        self.stops.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = self.timers.lock().get_mut(&id) {
            slot.running = false;
        }
    }

    fn release_timer(&self, id: TimerId) {
        if self.timers.lock().remove(&id).is_none() {
            tracing::debug!(timer = %id, "release of unknown timer");
        }
    }
}
