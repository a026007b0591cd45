//! RLC bearer manager
//!
//! Owns the bearer table (unicast and multicast namespaces) behind a single
//! reader/writer lock and exposes it through three facades:
//!
//! - control: add, delete, rename, reestablish, reset (write lock for table
//!   edits, read lock for in-place entity operations; the ones that can wake
//!   a blocked submitter take the recursive read lock like the MAC path)
//! - data-plane-in: SDU submission from PDCP (read lock)
//! - data-plane-out: occupancy queries and PDU exchange with MAC (recursive
//!   read lock, so the MAC thread never queues behind a waiting writer while
//!   a blocked submitter holds the lock)
//!
//! Entities are owned by their table slot. Removing the slot stops and drops
//! the entity while the write lock is held, so no data-plane call can reach a
//! deleted entity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::buffer::{BufferPool, ByteBuffer};
use crate::config::{BearerProfile, RlcConfig, RlcLayerConfig, RlcMode};
use crate::entity::{create_entity, EntityContext, RlcEntity};
use crate::error::RlcError;
use crate::interfaces::{PdcpInterface, RrcInterface};
use crate::logging::log_broadcast;
use crate::metrics::{throughput_mbps, BearerMetrics, MchMetrics, MetricsClock, RlcMetrics};
use crate::timers::TimerService;
use crate::{N_MCH_LCIDS, N_RADIO_BEARERS};

/// Collaborators shared by the manager and every entity it creates.
#[derive(Clone)]
pub struct RlcInterfaces {
    /// Upper layer
    pub pdcp: Arc<dyn PdcpInterface>,
    /// Control plane
    pub rrc: Arc<dyn RrcInterface>,
    /// Timer service
    pub timers: Arc<dyn TimerService>,
    /// Byte-buffer pool
    pub pool: BufferPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Unicast,
    Multicast,
}

impl Namespace {
    fn limit(self) -> u32 {
        match self {
            Namespace::Unicast => N_RADIO_BEARERS,
            Namespace::Multicast => N_MCH_LCIDS,
        }
    }
}

type EntityMap = HashMap<u32, Box<dyn RlcEntity>>;

#[derive(Default)]
struct BearerTable {
    bearers: EntityMap,
    mrb: EntityMap,
}

impl BearerTable {
    fn map(&self, ns: Namespace) -> &EntityMap {
        match ns {
            Namespace::Unicast => &self.bearers,
            Namespace::Multicast => &self.mrb,
        }
    }

    fn map_mut(&mut self, ns: Namespace) -> &mut EntityMap {
        match ns {
            Namespace::Unicast => &mut self.bearers,
            Namespace::Multicast => &mut self.mrb,
        }
    }

    fn entities(&self) -> impl Iterator<Item = &Box<dyn RlcEntity>> {
        self.bearers.values().chain(self.mrb.values())
    }

    /// Stops and destroys every entity in both namespaces.
    fn clear(&mut self) {
        for (_, entity) in self.bearers.drain().chain(self.mrb.drain()) {
            entity.stop();
        }
    }
}

/// The RLC bearer manager.
///
/// All methods take `&self`; share the manager between the MAC, PDCP and
/// control-plane threads with an `Arc`.
pub struct RlcManager {
    interfaces: RlcInterfaces,
    default_lcid: u32,
    max_sdu_size: usize,
    queue_capacity: usize,
    table: RwLock<BearerTable>,
    clock: Mutex<MetricsClock>,
}

impl RlcManager {
    /// Creates the manager with its default control-channel bearer (TM) and
    /// the bearers listed in `config`.
    ///
    /// `config` is validated first; an invalid configuration fails with
    /// [`RlcError::InvalidConfiguration`].
    pub fn new(interfaces: RlcInterfaces, config: &RlcLayerConfig) -> Result<Self, RlcError> {
        if let Err(err) = config.validate() {
            let err = RlcError::from(err);
            err.log("config");
            return Err(err);
        }
        let manager = Self {
            interfaces,
            default_lcid: config.default_lcid,
            max_sdu_size: config.max_sdu_size,
            queue_capacity: config.sdu_queue_capacity,
            table: RwLock::new(BearerTable::default()),
            clock: Mutex::new(MetricsClock::new(Instant::now())),
        };

        {
            let mut table = manager.table.write();
            manager.insert_entity(
                &mut table,
                Namespace::Unicast,
                manager.default_lcid,
                &RlcConfig::Tm,
            )?;
        }
        manager.apply_profiles(&config.bearers)?;

        tracing::info!(
            default_lcid = manager.default_lcid,
            max_sdu_size = manager.max_sdu_size,
            "RLC layer initialized"
        );
        Ok(manager)
    }

    /// LCID of the default control-channel bearer
    pub fn default_lcid(&self) -> u32 {
        self.default_lcid
    }

    /// Buffer pool shared with the entities
    pub fn pool(&self) -> &BufferPool {
        &self.interfaces.pool
    }

    fn rb_name(&self, lcid: u32) -> String {
        self.interfaces.rrc.get_rb_name(lcid)
    }

    fn fail<T>(&self, lcid: u32, err: RlcError) -> Result<T, RlcError> {
        err.log(&self.rb_name(lcid));
        Err(err)
    }

    fn entity_context(&self, lcid: u32) -> EntityContext {
        EntityContext {
            lcid,
            pdcp: Arc::clone(&self.interfaces.pdcp),
            rrc: Arc::clone(&self.interfaces.rrc),
            timers: Arc::clone(&self.interfaces.timers),
            pool: self.interfaces.pool.clone(),
            queue_capacity: self.queue_capacity,
            max_sdu_size: self.max_sdu_size,
        }
    }

    /// Builds, configures and inserts an entity. The table is untouched on failure.
    fn insert_entity(
        &self,
        table: &mut BearerTable,
        ns: Namespace,
        lcid: u32,
        config: &RlcConfig,
    ) -> Result<(), RlcError> {
        if lcid >= ns.limit() {
            return self.fail(
                lcid,
                RlcError::InvalidLcid {
                    lcid,
                    limit: ns.limit(),
                },
            );
        }
        if table.map(ns).contains_key(&lcid) {
            return self.fail(lcid, RlcError::AlreadyExists(lcid));
        }

        let mode = config.mode();
        let mut entity = create_entity(mode, self.entity_context(lcid));
        if mode != RlcMode::Tm && !entity.configure(config) {
            return self.fail(lcid, RlcError::ConfigurationError { lcid, mode });
        }
        table.map_mut(ns).insert(lcid, entity);

        match ns {
            Namespace::Unicast => {
                tracing::info!(bearer = %self.rb_name(lcid), lcid, %mode, "Added bearer");
            }
            Namespace::Multicast => {
                tracing::info!(lcid, %mode, "Added multicast bearer");
            }
        }
        Ok(())
    }

    fn remove_entity(&self, ns: Namespace, lcid: u32) -> Result<(), RlcError> {
        let mut table = self.table.write();
        match table.map_mut(ns).remove(&lcid) {
            Some(entity) => {
                entity.stop();
                drop(entity);
                match ns {
                    Namespace::Unicast => {
                        tracing::info!(bearer = %self.rb_name(lcid), lcid, "Deleted bearer");
                    }
                    Namespace::Multicast => {
                        tracing::info!(lcid, "Deleted multicast bearer");
                    }
                }
                Ok(())
            }
            None => self.fail(lcid, RlcError::NotFound(lcid)),
        }
    }

    // ------------------------------------------------------------------
    // Control facade
    // ------------------------------------------------------------------

    /// Adds a unicast bearer with an explicit configuration.
    pub fn add_bearer(&self, lcid: u32, config: RlcConfig) -> Result<(), RlcError> {
        let mut table = self.table.write();
        self.insert_entity(&mut table, Namespace::Unicast, lcid, &config)
    }

    /// Adds a signalling bearer with its default configuration.
    ///
    /// LCID 0 gets TM and LCIDs 1-2 get the default AM profile. Any other
    /// LCID fails with [`RlcError::ConfigurationRequired`].
    pub fn add_default_bearer(&self, lcid: u32) -> Result<(), RlcError> {
        let config = match RlcConfig::srb_default(lcid) {
            Ok(config) => config,
            Err(err) => return self.fail(lcid, err),
        };
        self.add_bearer(lcid, config)
    }

    /// Adds a multicast bearer with the fixed MCH UM profile.
    pub fn add_multicast_bearer(&self, lcid: u32) -> Result<(), RlcError> {
        let mut table = self.table.write();
        self.insert_entity(&mut table, Namespace::Multicast, lcid, &RlcConfig::mch())
    }

    /// Adds the bearers described by configuration profiles, stopping at the
    /// first failure.
    pub fn apply_profiles(&self, profiles: &[BearerProfile]) -> Result<(), RlcError> {
        for profile in profiles {
            let config = match RlcConfig::try_from(profile) {
                Ok(config) => config,
                Err(err) => return self.fail(profile.lcid, err),
            };
            self.add_bearer(profile.lcid, config)?;
        }
        Ok(())
    }

    /// Stops and removes a unicast bearer.
    pub fn delete_bearer(&self, lcid: u32) -> Result<(), RlcError> {
        self.remove_entity(Namespace::Unicast, lcid)
    }

    /// Stops and removes a multicast bearer.
    pub fn delete_multicast_bearer(&self, lcid: u32) -> Result<(), RlcError> {
        self.remove_entity(Namespace::Multicast, lcid)
    }

    /// Moves the entity at `old_lcid` to `new_lcid` without touching its state.
    pub fn change_lcid(&self, old_lcid: u32, new_lcid: u32) -> Result<(), RlcError> {
        let mut table = self.table.write();
        if !table.bearers.contains_key(&old_lcid) {
            return self.fail(old_lcid, RlcError::NotFound(old_lcid));
        }
        if new_lcid >= N_RADIO_BEARERS {
            return self.fail(
                new_lcid,
                RlcError::InvalidLcid {
                    lcid: new_lcid,
                    limit: N_RADIO_BEARERS,
                },
            );
        }
        if table.bearers.contains_key(&new_lcid) {
            return self.fail(new_lcid, RlcError::AlreadyExists(new_lcid));
        }

        let Some(entity) = table.bearers.remove(&old_lcid) else {
            return self.fail(old_lcid, RlcError::NotFound(old_lcid));
        };
        entity.set_lcid(new_lcid);
        table.bearers.insert(new_lcid, entity);

        tracing::info!(
            bearer = %self.rb_name(new_lcid),
            old_lcid,
            new_lcid,
            "Changed LCID"
        );
        Ok(())
    }

    /// Reestablishes every entity in both namespaces.
    pub fn reestablish_all(&self) {
        let table = self.table.read_recursive();
        for entity in table.entities() {
            entity.reestablish();
        }
        tracing::info!("Reestablished all bearers");
    }

    /// Reestablishes one unicast bearer.
    pub fn reestablish_bearer(&self, lcid: u32) -> Result<(), RlcError> {
        let table = self.table.read_recursive();
        match table.bearers.get(&lcid) {
            Some(entity) => {
                entity.reestablish();
                tracing::info!(bearer = %self.rb_name(lcid), lcid, "Reestablished bearer");
                Ok(())
            }
            None => self.fail(lcid, RlcError::NotFound(lcid)),
        }
    }

    /// Destroys every bearer and recreates the default bearer.
    ///
    /// The default bearer is recreated before the write lock is released, so
    /// no caller observes an empty table.
    pub fn reset(&self) -> Result<(), RlcError> {
        let mut table = self.table.write();
        table.clear();
        self.insert_entity(&mut table, Namespace::Unicast, self.default_lcid, &RlcConfig::Tm)?;
        tracing::info!(default_lcid = self.default_lcid, "RLC layer reset");
        Ok(())
    }

    /// Stops every entity in both namespaces. Idempotent.
    ///
    /// Wakes submitters blocked on a full queue even while a control-plane
    /// writer is waiting for the table.
    pub fn stop(&self) {
        let table = self.table.read_recursive();
        for entity in table.entities() {
            entity.stop();
        }
        tracing::info!("RLC layer stopped");
    }

    /// Discards the queued SDUs of every unicast bearer.
    pub fn empty_queue(&self) {
        let table = self.table.read_recursive();
        for entity in table.bearers.values() {
            entity.empty_queue();
        }
    }

    /// Resets the byte counters of every entity and restarts the sampling interval.
    pub fn reset_metrics(&self) {
        let table = self.table.read();
        for entity in table.entities() {
            entity.reset_metrics();
        }
        self.clock.lock().restart(Instant::now());
    }

    /// Returns true if a unicast bearer exists at `lcid`
    pub fn has_bearer(&self, lcid: u32) -> bool {
        self.table.read().bearers.contains_key(&lcid)
    }

    /// Returns true if a multicast bearer exists at `lcid`
    pub fn has_multicast_bearer(&self, lcid: u32) -> bool {
        self.table.read().mrb.contains_key(&lcid)
    }

    /// Mode of the unicast bearer at `lcid`
    pub fn mode_of(&self, lcid: u32) -> Option<RlcMode> {
        self.table.read().bearers.get(&lcid).map(|entity| entity.mode())
    }

    /// Returns true if the unicast bearer at `lcid` runs in UM.
    ///
    /// An unknown LCID is logged and reported as false.
    pub fn is_unacknowledged_mode(&self, lcid: u32) -> bool {
        match self.mode_of(lcid) {
            Some(mode) => mode == RlcMode::Um,
            None => {
                tracing::warn!(lcid, "RLC LCID {} doesn't exist", lcid);
                false
            }
        }
    }

    /// Sorted unicast and multicast LCIDs
    pub fn active_bearers(&self) -> (Vec<u32>, Vec<u32>) {
        let table = self.table.read();
        let mut bearers: Vec<u32> = table.bearers.keys().copied().collect();
        let mut mrb: Vec<u32> = table.mrb.keys().copied().collect();
        bearers.sort_unstable();
        mrb.sort_unstable();
        (bearers, mrb)
    }

    // ------------------------------------------------------------------
    // Data-plane-in facade (PDCP)
    // ------------------------------------------------------------------

    /// Queues an SDU on a unicast bearer.
    ///
    /// With `blocking` set the call may wait inside the entity until its
    /// queue has room. Rejected SDUs are released back to the pool.
    pub fn submit_sdu(&self, lcid: u32, sdu: ByteBuffer, blocking: bool) -> Result<(), RlcError> {
        self.submit(Namespace::Unicast, lcid, sdu, blocking)
    }

    /// Queues an SDU on a multicast bearer. Never blocks.
    pub fn submit_mch_sdu(&self, lcid: u32, sdu: ByteBuffer) -> Result<(), RlcError> {
        self.submit(Namespace::Multicast, lcid, sdu, false)
    }

    fn submit(
        &self,
        ns: Namespace,
        lcid: u32,
        sdu: ByteBuffer,
        blocking: bool,
    ) -> Result<(), RlcError> {
        let len = sdu.len();
        if len > self.max_sdu_size {
            drop(sdu);
            return self.fail(
                lcid,
                RlcError::OversizedPacket {
                    len,
                    max: self.max_sdu_size,
                },
            );
        }

        let table = self.table.read();
        match table.map(ns).get(&lcid) {
            Some(entity) => {
                entity.write_sdu(sdu, blocking);
                Ok(())
            }
            None => {
                drop(table);
                drop(sdu);
                self.fail(lcid, RlcError::UnknownBearer(lcid))
            }
        }
    }

    // ------------------------------------------------------------------
    // Data-plane-out facade (MAC)
    // ------------------------------------------------------------------

    fn with_entity<T>(
        &self,
        ns: Namespace,
        lcid: u32,
        f: impl FnOnce(&dyn RlcEntity) -> T,
    ) -> Option<T> {
        let table = self.table.read_recursive();
        table.map(ns).get(&lcid).map(|entity| f(&**entity))
    }

    /// Returns true if the unicast bearer has data to transmit. False for unknown LCIDs.
    pub fn has_pending_data(&self, lcid: u32) -> bool {
        self.with_entity(Namespace::Unicast, lcid, |e| e.has_data())
            .unwrap_or(false)
    }

    /// Bytes the unicast bearer needs to transmit everything queued. 0 for unknown LCIDs.
    pub fn pending_bytes(&self, lcid: u32) -> usize {
        self.with_entity(Namespace::Unicast, lcid, |e| e.buffer_state())
            .unwrap_or(0)
    }

    /// Bytes the multicast bearer needs to transmit everything queued. 0 for unknown LCIDs.
    pub fn mch_pending_bytes(&self, lcid: u32) -> usize {
        self.with_entity(Namespace::Multicast, lcid, |e| e.buffer_state())
            .unwrap_or(0)
    }

    /// Writes one PDU of at most `payload.len()` bytes. Returns the bytes written.
    pub fn produce_pdu(&self, lcid: u32, payload: &mut [u8]) -> usize {
        self.with_entity(Namespace::Unicast, lcid, |e| e.read_pdu(payload))
            .unwrap_or_else(|| {
                tracing::warn!(lcid, "LCID {} doesn't exist, no PDU produced", lcid);
                0
            })
    }

    /// Hands one received PDU to the unicast bearer.
    pub fn consume_pdu(&self, lcid: u32, payload: &[u8]) {
        if self
            .with_entity(Namespace::Unicast, lcid, |e| e.write_pdu(payload))
            .is_none()
        {
            tracing::warn!(lcid, len = payload.len(), "LCID {} doesn't exist, dropping PDU", lcid);
        }
    }

    /// Writes one PDU of the multicast bearer.
    pub fn produce_mch_pdu(&self, lcid: u32, payload: &mut [u8]) -> usize {
        self.with_entity(Namespace::Multicast, lcid, |e| e.read_pdu(payload))
            .unwrap_or_else(|| {
                tracing::warn!(lcid, "MCH LCID {} doesn't exist, no PDU produced", lcid);
                0
            })
    }

    /// Hands one received MCH PDU to the multicast bearer.
    pub fn consume_mch_pdu(&self, lcid: u32, payload: &[u8]) {
        if self
            .with_entity(Namespace::Multicast, lcid, |e| e.write_pdu(payload))
            .is_none()
        {
            tracing::warn!(
                lcid,
                len = payload.len(),
                "MCH LCID {} doesn't exist, dropping PDU",
                lcid
            );
        }
    }

    /// Delivers a BCCH message received on the BCH.
    pub fn write_pdu_bcch_bch(&self, payload: &[u8]) -> Result<(), RlcError> {
        let buf = self.copy_broadcast("write_pdu_bcch_bch", "BCCH-BCH", payload)?;
        self.interfaces.pdcp.write_pdu_bcch_bch(buf);
        Ok(())
    }

    /// Delivers a BCCH message received on the DL-SCH.
    pub fn write_pdu_bcch_dlsch(&self, payload: &[u8]) -> Result<(), RlcError> {
        let buf = self.copy_broadcast("write_pdu_bcch_dlsch", "BCCH-DLSCH", payload)?;
        self.interfaces.pdcp.write_pdu_bcch_dlsch(buf);
        Ok(())
    }

    /// Delivers a paging message.
    pub fn write_pdu_pcch(&self, payload: &[u8]) -> Result<(), RlcError> {
        let buf = self.copy_broadcast("write_pdu_pcch", "PCCH", payload)?;
        self.interfaces.pdcp.write_pdu_pcch(buf);
        Ok(())
    }

    fn copy_broadcast(
        &self,
        origin: &'static str,
        channel: &str,
        payload: &[u8],
    ) -> Result<ByteBuffer, RlcError> {
        log_broadcast(channel, payload);
        let Some(mut buf) = self.interfaces.pool.allocate_from(payload) else {
            let err = RlcError::AllocationFailure(origin);
            err.log(channel);
            return Err(err);
        };
        buf.set_timestamp();
        Ok(buf)
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Samples throughput since the previous snapshot and resets the counters.
    pub fn snapshot(&self) -> RlcMetrics {
        self.snapshot_at(Instant::now())
    }

    /// [`snapshot`](Self::snapshot) with an explicit sampling instant.
    pub fn snapshot_at(&self, now: Instant) -> RlcMetrics {
        let table = self.table.read();
        let (interval, uptime) = self.clock.lock().advance(now);
        let secs = interval.as_secs_f64();

        let mut metrics = RlcMetrics {
            interval,
            uptime,
            ..RlcMetrics::default()
        };
        for (&lcid, entity) in &table.bearers {
            let rx_bytes = entity.num_rx_bytes();
            let tx_bytes = entity.num_tx_bytes();
            entity.reset_metrics();
            metrics.bearers.insert(
                lcid,
                BearerMetrics {
                    rx_mbps: throughput_mbps(rx_bytes, secs),
                    tx_mbps: throughput_mbps(tx_bytes, secs),
                    rx_bytes,
                    tx_bytes,
                },
            );
        }
        for (&lcid, entity) in &table.mrb {
            let rx_bytes = entity.num_rx_bytes();
            entity.reset_metrics();
            metrics.mch.insert(
                lcid,
                MchMetrics {
                    rx_mbps: throughput_mbps(rx_bytes, secs),
                    rx_bytes,
                },
            );
        }

        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            rx_mbps = metrics.total_rx_mbps(),
            tx_mbps = metrics.total_tx_mbps(),
            "RLC metrics sampled"
        );
        metrics
    }
}

impl Drop for RlcManager {
    fn drop(&mut self) {
        self.table.get_mut().clear();
        tracing::debug!("RLC layer destroyed");
    }
}
