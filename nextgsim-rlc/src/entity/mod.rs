//! RLC entities
//!
//! One entity serves one logical channel and implements exactly one mode.
//! The manager only sees the [`RlcEntity`] contract; entities are built by
//! [`create_entity`] keyed on the mode tag and are configured once, before
//! they are inserted into the bearer table.
//!
//! Every method except [`RlcEntity::configure`] takes `&self`: entities are
//! reached concurrently by the MAC, PDCP and control-plane threads through a
//! shared table lock and synchronize internally.

mod am;
mod queue;
mod segment;
mod tm;
mod um;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::{BufferPool, ByteBuffer};
use crate::config::{RlcConfig, RlcMode};
use crate::interfaces::{PdcpInterface, RrcInterface};
use crate::timers::{TimerId, TimerService};

pub use am::AmEntity;
pub use tm::TmEntity;
pub use um::UmEntity;

/// Capability set shared by the TM, UM and AM entities.
pub trait RlcEntity: Send + Sync {
    /// Applies the configuration. Returns false if it is invalid for this mode.
    fn configure(&mut self, config: &RlcConfig) -> bool;

    /// Cancels timers and discards queued data. Idempotent.
    fn stop(&self);

    /// Clears protocol state, keeping configuration.
    fn reestablish(&self);

    /// Discards queued SDUs.
    fn empty_queue(&self);

    /// Resets the byte counters.
    fn reset_metrics(&self);

    /// Operating mode
    fn mode(&self) -> RlcMode;

    /// Current logical channel identifier
    fn lcid(&self) -> u32;

    /// Moves the entity to another logical channel identifier.
    fn set_lcid(&self, lcid: u32);

    /// Queues an SDU for transmission.
    ///
    /// With `blocking` set, waits while the queue is full; otherwise a full
    /// queue discards the SDU.
    fn write_sdu(&self, sdu: ByteBuffer, blocking: bool);

    /// Returns true if there is data to transmit
    fn has_data(&self) -> bool;

    /// Bytes needed to transmit everything queued, headers included
    fn buffer_state(&self) -> usize;

    /// Serializes up to `payload.len()` bytes of one PDU, returning the size written.
    fn read_pdu(&self, payload: &mut [u8]) -> usize;

    /// Processes a PDU received from MAC.
    fn write_pdu(&self, payload: &[u8]);

    /// Bytes received since the last metrics reset
    fn num_rx_bytes(&self) -> u64;

    /// Bytes transmitted since the last metrics reset
    fn num_tx_bytes(&self) -> u64;
}

/// Collaborators and identity handed to an entity at construction.
#[derive(Clone)]
pub struct EntityContext {
    /// Logical channel identifier
    pub lcid: u32,
    /// Upper layer receiving reassembled SDUs
    pub pdcp: Arc<dyn PdcpInterface>,
    /// Control plane, for bearer names
    pub rrc: Arc<dyn RrcInterface>,
    /// Timer service
    pub timers: Arc<dyn TimerService>,
    /// Pool for reassembled SDUs
    pub pool: BufferPool,
    /// SDU queue capacity
    pub queue_capacity: usize,
    /// Largest SDU accepted from PDCP or reassembled from MAC
    pub max_sdu_size: usize,
}

/// Builds an unconfigured entity for `mode`.
pub fn create_entity(mode: RlcMode, ctx: EntityContext) -> Box<dyn RlcEntity> {
    match mode {
        RlcMode::Tm => Box::new(TmEntity::new(ctx)),
        RlcMode::Um => Box::new(UmEntity::new(ctx)),
        RlcMode::Am => Box::new(AmEntity::new(ctx)),
    }
}

/// State every entity carries regardless of mode.
struct EntityCore {
    lcid: AtomicU32,
    pdcp: Arc<dyn PdcpInterface>,
    rrc: Arc<dyn RrcInterface>,
    timers: EntityTimers,
    pool: BufferPool,
    max_sdu_size: usize,
    rx_bytes: AtomicU64,
    tx_bytes: AtomicU64,
}

impl EntityCore {
    fn new(ctx: EntityContext) -> Self {
        Self {
            lcid: AtomicU32::new(ctx.lcid),
            pdcp: ctx.pdcp,
            rrc: ctx.rrc,
            timers: EntityTimers::new(ctx.timers),
            pool: ctx.pool,
            max_sdu_size: ctx.max_sdu_size,
            rx_bytes: AtomicU64::new(0),
            tx_bytes: AtomicU64::new(0),
        }
    }

    fn lcid(&self) -> u32 {
        self.lcid.load(Ordering::Acquire)
    }

    fn set_lcid(&self, lcid: u32) {
        self.lcid.store(lcid, Ordering::Release);
    }

    fn rb_name(&self) -> String {
        self.rrc.get_rb_name(self.lcid())
    }

    fn add_rx(&self, n: usize) {
        self.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_tx(&self, n: usize) {
        self.tx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn reset_metrics(&self) {
        self.rx_bytes.store(0, Ordering::Relaxed);
        self.tx_bytes.store(0, Ordering::Relaxed);
    }

    fn num_rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    fn num_tx_bytes(&self) -> u64 {
        self.tx_bytes.load(Ordering::Relaxed)
    }

    /// Copies a received SDU into a pool buffer and hands it upward.
    ///
    /// SDUs that cannot fit a pool buffer are dropped at WARN; only an
    /// exhausted pool is reported as an error.
    fn deliver(&self, sdu: &[u8], multicast: bool) {
        let lcid = self.lcid();
        if sdu.len() > self.pool.buffer_size() {
            tracing::warn!(
                lcid,
                len = sdu.len(),
                max = self.pool.buffer_size(),
                "Received SDU exceeds buffer size, dropping"
            );
            return;
        }
        let Some(mut buf) = self.pool.allocate_from(sdu) else {
            tracing::error!(
                lcid,
                len = sdu.len(),
                "Fatal error: out of buffers from the pool delivering SDU"
            );
            return;
        };
        buf.set_timestamp();
        if multicast {
            self.pdcp.write_pdu_mch(lcid, buf);
        } else {
            self.pdcp.write_pdu(lcid, buf);
        }
    }
}

/// Protocol timers owned by one entity; released when the entity is destroyed.
struct EntityTimers {
    service: Arc<dyn TimerService>,
    ids: Vec<TimerId>,
}

impl EntityTimers {
    fn new(service: Arc<dyn TimerService>) -> Self {
        Self {
            service,
            ids: Vec::new(),
        }
    }

    fn allocate(&mut self, duration_ms: u32) {
        let id = self.service.allocate_timer(duration_ms);
        self.ids.push(id);
    }

    fn stop_all(&self) {
        for id in &self.ids {
            self.service.stop_timer(*id);
        }
    }

    fn release_all(&mut self) {
        for id in self.ids.drain(..) {
            self.service.release_timer(id);
        }
    }
}

impl Drop for EntityTimers {
    fn drop(&mut self) {
        self.release_all();
    }
}
