//! Throughput metrics
//!
//! The manager samples every entity's byte counters, converts them to
//! megabits per second over the wall-clock interval since the previous
//! sample, and resets the counters.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Per-bearer sample for a unicast bearer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BearerMetrics {
    /// Downlink throughput (Mbit/s)
    pub rx_mbps: f64,
    /// Uplink throughput (Mbit/s)
    pub tx_mbps: f64,
    /// Bytes received during the interval
    pub rx_bytes: u64,
    /// Bytes transmitted during the interval
    pub tx_bytes: u64,
}

/// Per-bearer sample for a multicast bearer (downlink only)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MchMetrics {
    /// Downlink throughput (Mbit/s)
    pub rx_mbps: f64,
    /// Bytes received during the interval
    pub rx_bytes: u64,
}

/// One metrics snapshot across both namespaces
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RlcMetrics {
    /// Time covered by this snapshot
    pub interval: Duration,
    /// Time since the manager was created
    pub uptime: Duration,
    /// Unicast bearers keyed by LCID
    pub bearers: BTreeMap<u32, BearerMetrics>,
    /// Multicast bearers keyed by MCH LCID
    pub mch: BTreeMap<u32, MchMetrics>,
}

impl RlcMetrics {
    /// Sum of downlink throughput over all bearers, multicast included
    pub fn total_rx_mbps(&self) -> f64 {
        self.bearers.values().map(|b| b.rx_mbps).sum::<f64>()
            + self.mch.values().map(|m| m.rx_mbps).sum::<f64>()
    }

    /// Sum of uplink throughput over all unicast bearers
    pub fn total_tx_mbps(&self) -> f64 {
        self.bearers.values().map(|b| b.tx_mbps).sum()
    }
}

/// Converts a byte count over `secs` seconds to Mbit/s.
///
/// A non-positive interval (two samples at the same instant) yields zero.
pub fn throughput_mbps(bytes: u64, secs: f64) -> f64 {
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / 1e6 / secs
}

/// Epoch and previous-sample timestamps of the aggregator
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetricsClock {
    epoch: Instant,
    last: Instant,
}

impl MetricsClock {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            epoch: now,
            last: now,
        }
    }

    /// Moves the previous sample to `now`, returning (interval, uptime).
    ///
    /// An instant earlier than the previous sample gives a zero interval.
    pub(crate) fn advance(&mut self, now: Instant) -> (Duration, Duration) {
        let interval = now.saturating_duration_since(self.last);
        if now > self.last {
            self.last = now;
        }
        (interval, now.saturating_duration_since(self.epoch))
    }

    pub(crate) fn restart(&mut self, now: Instant) {
        self.last = now;
    }
}
