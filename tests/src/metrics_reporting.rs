//! Metrics integration tests
//!
//! Tests throughput snapshots across both namespaces and the periodic
//! reporter task.

use std::time::{Duration, Instant};

use integration_tests::{
    init_test_logging, wait_for_condition, wait_until, RlcStack, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
use nextgsim_rlc::{spawn_metrics_reporter, RlcConfig, UmConfig};
use tokio::sync::{mpsc, watch};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Known bytes over a known interval give the expected throughput, and an
/// immediate resample reports zero
#[test]
fn test_snapshot_throughput_and_reset() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    stack.rlc.add_multicast_bearer(4).unwrap();
    let t0 = Instant::now();
    stack.rlc.snapshot_at(t0);

    // uplink on the AM bearer: one 250-byte SDU pulled in a single PDU
    stack.rlc.submit_sdu(1, stack.sdu(&[0x11; 250]), false).unwrap();
    let mut payload = [0u8; 512];
    let tx = stack.rlc.produce_pdu(1, &mut payload);
    assert_eq!(tx, 252);
    // downlink on SRB0 and on the multicast bearer
    stack.rlc.consume_pdu(0, &[0x22; 1000]);
    stack.rlc.consume_mch_pdu(4, &[0x00; 500]);

    let metrics = stack.rlc.snapshot_at(t0 + Duration::from_millis(500));
    assert_eq!(metrics.interval, Duration::from_millis(500));

    let srb1 = metrics.bearers[&1];
    assert_eq!(srb1.tx_bytes, 252);
    assert!(close(srb1.tx_mbps, 252.0 * 8.0 / 1e6 / 0.5));
    assert_eq!(srb1.rx_bytes, 0);

    let srb0 = metrics.bearers[&0];
    assert!(close(srb0.rx_mbps, 1000.0 * 8.0 / 1e6 / 0.5));

    let mch = metrics.mch[&4];
    assert_eq!(mch.rx_bytes, 500);
    assert!(close(mch.rx_mbps, 500.0 * 8.0 / 1e6 / 0.5));
    assert!(close(
        metrics.total_rx_mbps(),
        srb0.rx_mbps + mch.rx_mbps + metrics.bearers[&3].rx_mbps + srb1.rx_mbps
    ));

    // no new traffic
    let idle = stack.rlc.snapshot_at(t0 + Duration::from_millis(1500));
    assert!(idle.bearers.values().all(|b| b.rx_mbps == 0.0 && b.tx_mbps == 0.0));
    assert!(idle.mch.values().all(|m| m.rx_mbps == 0.0));

    // same instant twice: zero interval, zero throughput
    stack.rlc.consume_pdu(0, &[0x22; 100]);
    let same = stack.rlc.snapshot_at(t0 + Duration::from_millis(1500));
    assert_eq!(same.interval, Duration::ZERO);
    assert_eq!(same.bearers[&0].rx_bytes, 100);
    assert_eq!(same.bearers[&0].rx_mbps, 0.0);
    assert!(same.uptime >= Duration::from_millis(1500));
}

/// reset_metrics discards counters without producing a sample
#[test]
fn test_reset_metrics() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    stack.rlc.consume_pdu(0, b"discarded");
    stack.rlc.reset_metrics();
    let metrics = stack.rlc.snapshot();
    assert_eq!(metrics.bearers[&0].rx_bytes, 0);
}

/// The reporter forwards snapshots until shut down
#[tokio::test]
async fn test_reporter_task() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = spawn_metrics_reporter(stack.rlc.clone(), Duration::from_millis(20), tx, stop_rx);

    stack.rlc.consume_pdu(0, &[0x01; 64]);
    let mut seen = 0u64;
    let mut samples = 0;
    while seen < 64 {
        let metrics = rx.recv().await.expect("reporter stopped early");
        seen += metrics.bearers[&0].rx_bytes;
        samples += 1;
        assert_eq!(metrics.bearers.len(), 3);
    }
    assert!(samples >= 1);

    stop_tx.send(true).unwrap();
    wait_for_condition(
        || async { handle.is_finished() },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();
}

/// A sample stalled on the table lock does not stall the runtime
#[tokio::test]
async fn test_reporter_does_not_block_runtime() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    for i in 0..8u8 {
        stack.rlc.submit_sdu(3, stack.sdu(&[i; 8]), false).unwrap();
    }

    // blocked submitter holding the shared lock, writer queued behind it
    let (rlc, pool) = (stack.rlc.clone(), stack.pool.clone());
    let submitter = std::thread::spawn(move || {
        let sdu = pool.allocate_from(b"backpressure").expect("pool exhausted");
        rlc.submit_sdu(3, sdu, true)
    });
    wait_until(|| stack.pool.in_use() == 9, Duration::from_secs(5)).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    let rlc = stack.rlc.clone();
    let control = std::thread::spawn(move || rlc.add_bearer(10, RlcConfig::Um(UmConfig::default())));
    std::thread::sleep(Duration::from_millis(20));

    let (tx, mut rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = spawn_metrics_reporter(stack.rlc.clone(), Duration::from_millis(10), tx, stop_rx);

    // the single runtime thread keeps running other work
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    let mut payload = [0u8; 64];
    assert!(stack.rlc.produce_pdu(3, &mut payload) > 0);
    assert!(submitter.join().unwrap().is_ok());
    assert!(control.join().unwrap().is_ok());

    let metrics = tokio::time::timeout(DEFAULT_TEST_TIMEOUT, rx.recv())
        .await
        .unwrap()
        .expect("reporter stopped early");
    assert!(metrics.bearers.contains_key(&3));

    stop_tx.send(true).unwrap();
    drop(rx);
    tokio::time::timeout(DEFAULT_TEST_TIMEOUT, handle).await.unwrap().unwrap();
}
