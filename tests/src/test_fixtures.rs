//! Test fixtures
//!
//! [`RlcStack`] wires the mock collaborators into an [`RlcManager`] and keeps
//! handles on them for assertions.

use std::sync::Arc;

use nextgsim_rlc::{
    load_rlc_config_from_str, BufferPool, ByteBuffer, RlcInterfaces, RlcLayerConfig, RlcManager,
};

use crate::mock_layers::{CountingTimers, MockPdcp, MockRrc};
use crate::test_utils::TestResult;

/// Layer configuration used by most scenarios
pub const TEST_CONFIG_YAML: &str = r#"
default_lcid: 0
max_sdu_size: 2047
pool_capacity: 256
buffer_size: 4096
sdu_queue_capacity: 8
bearers:
  - lcid: 1
    mode: am
  - lcid: 3
    mode: um
    um:
      t_reordering_ms: 50
      sn_field_length: 10
"#;

/// A manager plus the mocks it talks to
pub struct RlcStack {
    pub rlc: Arc<RlcManager>,
    pub pdcp: Arc<MockPdcp>,
    pub rrc: Arc<MockRrc>,
    pub timers: Arc<CountingTimers>,
    pub pool: BufferPool,
}

impl RlcStack {
    /// Stack with only the default bearer
    pub fn new() -> TestResult<Self> {
        Self::with_config(&RlcLayerConfig::default())
    }

    /// Stack provisioned from [`TEST_CONFIG_YAML`]
    pub fn provisioned() -> TestResult<Self> {
        let config = load_rlc_config_from_str(TEST_CONFIG_YAML)?;
        config.validate()?;
        Self::with_config(&config)
    }

    pub fn with_config(config: &RlcLayerConfig) -> TestResult<Self> {
        let pdcp = Arc::new(MockPdcp::new());
        let rrc = Arc::new(MockRrc::new());
        let timers = Arc::new(CountingTimers::new());
        let pool = BufferPool::from_config(config);
        let interfaces = RlcInterfaces {
            pdcp: pdcp.clone(),
            rrc: rrc.clone(),
            timers: timers.clone(),
            pool: pool.clone(),
        };
        let rlc = Arc::new(RlcManager::new(interfaces, config)?);
        Ok(Self {
            rlc,
            pdcp,
            rrc,
            timers,
            pool,
        })
    }

    /// Pool buffer holding `payload`
    pub fn sdu(&self, payload: &[u8]) -> ByteBuffer {
        self.pool
            .allocate_from(payload)
            .unwrap_or_else(|| panic!("pool exhausted allocating {} bytes", payload.len()))
    }

    /// Pulls PDUs of at most `grant` bytes from `lcid` until it has nothing
    /// left, looping them back into the same bearer as received PDUs.
    pub fn loopback(&self, lcid: u32, grant: usize) -> usize {
        let mut payload = vec![0u8; grant];
        let mut pdus = 0;
        while self.rlc.has_pending_data(lcid) {
            let n = self.rlc.produce_pdu(lcid, &mut payload);
            if n == 0 {
                break;
            }
            self.rlc.consume_pdu(lcid, &payload[..n]);
            pdus += 1;
        }
        pdus
    }
}
