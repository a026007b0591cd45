//! Bounded SDU queue with blocking admission

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::buffer::ByteBuffer;

#[derive(Debug)]
struct QueueState {
    sdus: VecDeque<ByteBuffer>,
    bytes: usize,
    enabled: bool,
}

/// Outcome of a queue admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Queued,
    /// Queue full in non-blocking mode
    Full,
    /// Entity stopped, before or while waiting
    Disabled,
}

/// SDU queue shared by the TM, UM and AM transmitters.
///
/// A blocking writer parks on `not_full` until a reader pops, the queue is
/// cleared, or the queue is disabled by `stop`.
#[derive(Debug)]
pub(crate) struct SduQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    capacity: usize,
}

impl SduQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                sdus: VecDeque::with_capacity(capacity),
                bytes: 0,
                enabled: true,
            }),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rejected SDUs are dropped here, returning their buffer to the pool.
    pub(crate) fn push(&self, sdu: ByteBuffer, blocking: bool) -> Admission {
        let mut state = self.state.lock();
        loop {
            if !state.enabled {
                return Admission::Disabled;
            }
            if state.sdus.len() < self.capacity {
                break;
            }
            if !blocking {
                return Admission::Full;
            }
            self.not_full.wait(&mut state);
        }
        state.bytes += sdu.len();
        state.sdus.push_back(sdu);
        Admission::Queued
    }

    pub(crate) fn pop(&self) -> Option<ByteBuffer> {
        self.pop_if(|_| true)
    }

    /// Pops the head SDU only if `accept` approves it.
    pub(crate) fn pop_if(&self, accept: impl FnOnce(&ByteBuffer) -> bool) -> Option<ByteBuffer> {
        let mut state = self.state.lock();
        if !accept(state.sdus.front()?) {
            return None;
        }
        let sdu = state.sdus.pop_front()?;
        state.bytes -= sdu.len();
        drop(state);
        self.not_full.notify_one();
        Some(sdu)
    }

    pub(crate) fn front_len(&self) -> Option<usize> {
        self.state.lock().sdus.front().map(|sdu| sdu.len())
    }

    /// (SDU count, payload bytes)
    pub(crate) fn occupancy(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.sdus.len(), state.bytes)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state.lock().sdus.is_empty()
    }

    pub(crate) fn clear(&self) {
        let discarded = {
            let mut state = self.state.lock();
            state.bytes = 0;
            std::mem::take(&mut state.sdus)
        };
        self.not_full.notify_all();
        drop(discarded);
    }

    /// Clears the queue and rejects all further admissions, waking blocked writers.
    pub(crate) fn disable(&self) {
        self.state.lock().enabled = false;
        self.clear();
    }

    pub(crate) fn enable(&self) {
        self.state.lock().enabled = true;
    }
}
