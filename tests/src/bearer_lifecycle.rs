//! Bearer lifecycle integration tests
//!
//! Tests the control facade: add, delete, rename, reestablish and reset.

use std::sync::Arc;

use integration_tests::{init_test_logging, RlcStack};
use nextgsim_rlc::{AmConfig, RlcConfig, RlcError, RlcMode, UmConfig, N_RADIO_BEARERS};

fn um_config() -> RlcConfig {
    RlcConfig::Um(UmConfig {
        t_reordering_ms: 35,
        sn_field_length: 5,
        is_mrb: false,
    })
}

/// Provisioning from YAML creates the default bearer plus configured ones
#[test]
fn test_provisioned_stack() {
    init_test_logging();

    let stack = RlcStack::provisioned().expect("Failed to build stack");
    assert_eq!(stack.rlc.active_bearers(), (vec![0, 1, 3], vec![]));
    assert_eq!(stack.rlc.mode_of(0), Some(RlcMode::Tm));
    assert_eq!(stack.rlc.mode_of(1), Some(RlcMode::Am));
    assert!(stack.rlc.is_unacknowledged_mode(3));
    // AM: 3 timers, UM: 1 timer
    assert_eq!(stack.timers.live(), 4);
}

/// Control-plane log lines carry bearer names from RRC
#[test]
fn test_bearer_names_requested_from_rrc() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    let before = stack.rrc.lookups();
    stack.rlc.add_bearer(4, um_config()).unwrap();
    assert!(stack.rrc.lookups() > before);
}

/// Multicast bearers have no RRC name; deleting one does not ask RRC for it
#[test]
fn test_multicast_delete_skips_rrc_names() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    stack.rlc.add_multicast_bearer(4).unwrap();
    let before = stack.rrc.lookups();
    stack.rlc.delete_multicast_bearer(4).unwrap();
    assert_eq!(stack.rrc.lookups(), before);
    assert!(!stack.rlc.has_multicast_bearer(4));
}

/// Duplicate add is rejected without touching the existing entity
#[test]
fn test_duplicate_add_keeps_original() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    stack.rlc.add_bearer(5, um_config()).unwrap();
    stack.rlc.submit_sdu(5, stack.sdu(b"keep me"), false).unwrap();

    let result = stack.rlc.add_bearer(5, RlcConfig::Am(AmConfig::default()));
    assert_eq!(result, Err(RlcError::AlreadyExists(5)));
    assert_eq!(stack.rlc.mode_of(5), Some(RlcMode::Um));
    assert!(stack.rlc.has_pending_data(5));
}

/// A failed configuration leaves nothing behind
#[test]
fn test_configuration_failure_is_clean() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    let bad_um = RlcConfig::Um(UmConfig {
        sn_field_length: 12,
        ..UmConfig::default()
    });
    assert_eq!(
        stack.rlc.add_bearer(6, bad_um),
        Err(RlcError::ConfigurationError {
            lcid: 6,
            mode: RlcMode::Um
        })
    );
    assert!(!stack.rlc.has_bearer(6));
    assert_eq!(stack.timers.live(), 0);
    assert_eq!(Arc::strong_count(&stack.pdcp), 3);
}

/// Deleting a bearer destroys its entity and all resources it held
#[test]
fn test_delete_releases_entity() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    let baseline = Arc::strong_count(&stack.pdcp);

    stack.rlc.add_default_bearer(1).unwrap();
    stack.rlc.submit_sdu(1, stack.sdu(b"queued"), false).unwrap();
    assert_eq!(Arc::strong_count(&stack.pdcp), baseline + 1);
    assert_eq!(stack.timers.live(), 3);
    assert_eq!(stack.pool.in_use(), 1);

    stack.rlc.delete_bearer(1).unwrap();
    assert!(!stack.rlc.has_bearer(1));
    assert_eq!(Arc::strong_count(&stack.pdcp), baseline);
    assert_eq!(stack.timers.live(), 0);
    assert_eq!(stack.timers.releases(), 3);
    assert_eq!(stack.pool.in_use(), 0);

    // the data plane treats the LCID as unknown from now on
    assert_eq!(
        stack.rlc.submit_sdu(1, stack.sdu(b"late"), false),
        Err(RlcError::UnknownBearer(1))
    );
    let mut payload = [0u8; 32];
    assert_eq!(stack.rlc.produce_pdu(1, &mut payload), 0);
    assert_eq!(stack.pool.in_use(), 0);

    assert_eq!(stack.rlc.delete_bearer(1), Err(RlcError::NotFound(1)));
}

/// Rename keeps the entity, its mode and its queued data
#[test]
fn test_change_lcid_preserves_identity() {
    init_test_logging();

    let stack = RlcStack::new().unwrap();
    let baseline = Arc::strong_count(&stack.pdcp);
    stack.rlc.add_bearer(3, um_config()).unwrap();
    stack.rlc.submit_sdu(3, stack.sdu(b"first"), false).unwrap();
    stack.rlc.submit_sdu(3, stack.sdu(b"second"), false).unwrap();
    let pending = stack.rlc.pending_bytes(3);
    let live_timers = stack.timers.live();

    stack.rlc.change_lcid(3, 7).unwrap();

    assert!(!stack.rlc.has_bearer(3));
    assert!(stack.rlc.has_bearer(7));
    assert_eq!(stack.rlc.mode_of(7), Some(RlcMode::Um));
    assert_eq!(stack.rlc.pending_bytes(7), pending);
    // same entity: nothing destroyed or rebuilt
    assert_eq!(Arc::strong_count(&stack.pdcp), baseline + 1);
    assert_eq!(stack.timers.live(), live_timers);
    assert_eq!(stack.timers.releases(), 0);

    // queued SDUs come out of the new LCID and are delivered under it
    stack.loopback(7, 64);
    assert_eq!(
        stack.pdcp.sdus_for(7),
        vec![b"first".to_vec(), b"second".to_vec()]
    );
    assert!(stack.pdcp.sdus_for(3).is_empty());
}

#[test]
fn test_change_lcid_failures() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    assert_eq!(stack.rlc.change_lcid(9, 10), Err(RlcError::NotFound(9)));
    assert_eq!(stack.rlc.change_lcid(3, 1), Err(RlcError::AlreadyExists(1)));
    assert_eq!(
        stack.rlc.change_lcid(3, N_RADIO_BEARERS),
        Err(RlcError::InvalidLcid {
            lcid: N_RADIO_BEARERS,
            limit: N_RADIO_BEARERS
        })
    );
    assert_eq!(stack.rlc.active_bearers().0, vec![0, 1, 3]);
}

/// Reestablish clears data but keeps bearers; reset discards bearers
#[test]
fn test_reestablish_versus_reset() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    stack.rlc.add_multicast_bearer(2).unwrap();
    stack.rlc.submit_sdu(3, stack.sdu(b"um data"), false).unwrap();
    stack.rlc.submit_sdu(1, stack.sdu(b"am data"), false).unwrap();

    stack.rlc.reestablish_bearer(3).unwrap();
    assert!(stack.rlc.has_bearer(3));
    assert!(stack.rlc.is_unacknowledged_mode(3));
    assert!(!stack.rlc.has_pending_data(3));
    assert!(stack.rlc.has_pending_data(1));

    stack.rlc.reestablish_all();
    assert!(!stack.rlc.has_pending_data(1));
    assert_eq!(stack.rlc.active_bearers(), (vec![0, 1, 3], vec![2]));

    stack.rlc.reset().unwrap();
    assert_eq!(stack.rlc.active_bearers(), (vec![0], vec![]));
    assert_eq!(stack.rlc.mode_of(0), Some(RlcMode::Tm));
    assert_eq!(stack.timers.live(), 0);
    assert_eq!(stack.pool.in_use(), 0);
}

/// Dropping the last handle to the manager tears everything down
#[test]
fn test_teardown() {
    init_test_logging();

    let stack = RlcStack::provisioned().unwrap();
    stack.rlc.submit_sdu(1, stack.sdu(b"pending"), false).unwrap();
    let RlcStack {
        rlc,
        pdcp,
        timers,
        pool,
        ..
    } = stack;

    rlc.stop();
    drop(rlc);
    assert_eq!(Arc::strong_count(&pdcp), 1);
    assert_eq!(timers.live(), 0);
    assert_eq!(pool.in_use(), 0);
}
