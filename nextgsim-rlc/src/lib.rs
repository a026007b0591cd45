//! Radio Link Control (RLC) bearer manager
//!
//! This crate owns the set of per-logical-channel RLC entities of a UE
//! protocol stack and exposes them to three independent callers:
//!
//! - the **MAC** layer, which polls buffer occupancy and pulls/pushes PDUs on
//!   every scheduling interval,
//! - the **PDCP/RRC** upper layers, which submit SDUs and receive reassembled
//!   packets and broadcast/paging payloads,
//! - the **control plane**, which adds, deletes, renames, reestablishes and
//!   resets bearers at arbitrary times relative to data traffic.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RlcManager                            │
//! │                                                               │
//! │   control facade      data-plane-in        data-plane-out     │
//! │  (write / read lock)   (read lock)     (read lock, MAC path)  │
//! │          │                  │                   │             │
//! │          └──────────┬───────┴───────────────────┘             │
//! │              ┌──────┴──────────────┐                          │
//! │              │ RwLock<BearerTable> │                          │
//! │              │  bearers: LCID→TM/UM/AM                        │
//! │              │  mrb:     MCH LCID→UM                          │
//! │              └─────────────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//!          │ write_pdu / bcch / pcch            ▲ get_rb_name
//!          ▼                                    │
//!        PDCP                                  RRC
//! ```
//!
//! # Modules
//!
//! - [`manager`]: the bearer table and the three facades
//! - [`entity`]: the entity contract and the TM/UM/AM reference entities
//! - [`buffer`]: bounded byte-buffer pool with scope-based release
//! - [`interfaces`]: PDCP/RRC collaborator traits
//! - [`timers`]: timer service used by the entities
//! - [`config`]: bearer and layer configuration (YAML)
//! - [`metrics`]: throughput snapshots
//! - [`reporter`]: periodic metrics reporting task
//! - [`logging`]: tracing setup and payload dumps
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nextgsim_rlc::{
//!     BufferPool, NullPdcp, RlcInterfaces, RlcLayerConfig, RlcManager, StaticBearerNames,
//!     TimerRegistry,
//! };
//!
//! let config = RlcLayerConfig::default();
//! let pool = BufferPool::from_config(&config);
//! let interfaces = RlcInterfaces {
//!     pdcp: Arc::new(NullPdcp),
//!     rrc: Arc::new(StaticBearerNames),
//!     timers: Arc::new(TimerRegistry::new()),
//!     pool: pool.clone(),
//! };
//! let rlc = RlcManager::new(interfaces, &config).unwrap();
//!
//! // SRB0 is created in transparent mode at initialization
//! assert!(rlc.has_bearer(0));
//!
//! // SRB1 gets the default acknowledged-mode configuration
//! rlc.add_default_bearer(1).unwrap();
//!
//! let mut sdu = pool.allocate().unwrap();
//! sdu.append(b"rrc message");
//! rlc.submit_sdu(1, sdu, false).unwrap();
//! assert!(rlc.has_pending_data(1));
//!
//! let mut payload = [0u8; 64];
//! let written = rlc.produce_pdu(1, &mut payload);
//! assert!(written > 0);
//! ```

pub mod buffer;
pub mod config;
pub mod entity;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod reporter;
pub mod timers;


/// Number of unicast logical channel identifiers (`[0, N_RADIO_BEARERS)`)
pub const N_RADIO_BEARERS: u32 = 32;

/// Number of multicast (MCH) logical channel identifiers (`[0, N_MCH_LCIDS)`)
pub const N_MCH_LCIDS: u32 = 29;

/// Largest SDU accepted from the upper layers, in bytes
pub const MAX_SDU_SIZE: usize = (1 << 11) - 1;

pub use buffer::{BufferPool, ByteBuffer, DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY};
pub use config::{
    load_and_validate_rlc_config, load_rlc_config, load_rlc_config_from_str, AmConfig,
    BearerProfile, RlcConfig, RlcLayerConfig, RlcMode, UmConfig,
};
pub use entity::{create_entity, EntityContext, RlcEntity};
pub use error::{ConfigError, ConfigValidationError, RlcError};
pub use interfaces::{NullPdcp, PdcpInterface, RrcInterface, StaticBearerNames};
pub use logging::{init_logging, init_logging_with_filter, Direction, HexDump, LogLevel};
pub use manager::{RlcInterfaces, RlcManager};
pub use metrics::{BearerMetrics, MchMetrics, RlcMetrics};
pub use reporter::spawn_metrics_reporter;
pub use timers::{TimerId, TimerRegistry, TimerService};
