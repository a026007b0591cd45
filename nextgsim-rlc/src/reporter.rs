//! Periodic metrics reporter
//!
//! Samples the manager on a fixed period and forwards each snapshot to a
//! channel until shut down or until the receiving side goes away.
//!
//! Sampling takes the bearer table lock, which can wait behind a control-plane
//! writer, so it runs on the blocking pool rather than on a runtime worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::manager::RlcManager;
use crate::metrics::RlcMetrics;

/// Spawns the reporter task.
///
/// The first snapshot is taken one `period` after spawning. Setting the
/// shutdown flag to `true` (or dropping its sender) ends the task.
pub fn spawn_metrics_reporter(
    manager: Arc<RlcManager>,
    period: Duration,
    sink: mpsc::Sender<RlcMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "RLC metrics reporter started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately once
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sampler = Arc::clone(&manager);
                    let sampled = tokio::task::spawn_blocking(move || sampler.snapshot()).await;
                    let metrics = match sampled {
                        Ok(metrics) => metrics,
                        Err(e) => {
                            warn!("Metrics sampling failed: {}", e);
                            break;
                        }
                    };
                    if sink.send(metrics).await.is_err() {
                        debug!("Metrics sink closed");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("RLC metrics reporter stopped");
    })
}
