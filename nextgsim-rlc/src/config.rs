//! RLC configuration
//!
//! Two levels of configuration live here:
//!
//! - [`RlcConfig`]: per-bearer entity configuration, a tagged variant over
//!   the three RLC modes. Transparent mode carries no parameters.
//! - [`RlcLayerConfig`]: layer-wide parameters (default LCID, SDU and pool
//!   sizing) plus bearers to provision at startup, loaded from YAML.
//!
//! # Example
//!
//! ```rust
//! use nextgsim_rlc::config::{load_rlc_config_from_str, RlcConfig, RlcMode};
//!
//! let config = load_rlc_config_from_str(
//!     r#"
//! default_lcid: 0
//! max_sdu_size: 1500
//! bearers:
//!   - lcid: 3
//!     mode: um
//!     um:
//!       t_reordering_ms: 50
//!       sn_field_length: 10
//! "#,
//! )
//! .unwrap();
//! let bearer = RlcConfig::try_from(&config.bearers[0]).unwrap();
//! assert_eq!(bearer.mode(), RlcMode::Um);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::{DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY};
use crate::error::{ConfigError, ConfigValidationError, RlcError};
use crate::{MAX_SDU_SIZE, N_RADIO_BEARERS};

/// Default SDU queue capacity per entity
pub const DEFAULT_SDU_QUEUE_CAPACITY: usize = 128;

/// RLC operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RlcMode {
    /// Transparent Mode
    Tm,
    /// Unacknowledged Mode
    Um,
    /// Acknowledged Mode
    Am,
}

impl fmt::Display for RlcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlcMode::Tm => write!(f, "RLC_TM"),
            RlcMode::Um => write!(f, "RLC_UM"),
            RlcMode::Am => write!(f, "RLC_AM"),
        }
    }
}

impl FromStr for RlcMode {
    type Err = RlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tm" | "rlc_tm" | "transparent" => Ok(RlcMode::Tm),
            "um" | "rlc_um" | "unacknowledged" => Ok(RlcMode::Um),
            "am" | "rlc_am" | "acknowledged" => Ok(RlcMode::Am),
            _ => Err(RlcError::InvalidMode(s.to_string())),
        }
    }
}

/// Unacknowledged Mode parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmConfig {
    /// Reordering timer (ms)
    #[serde(default = "default_um_t_reordering")]
    pub t_reordering_ms: u32,
    /// Sequence number field length in bits (5 or 10)
    #[serde(default = "default_um_sn_field_length")]
    pub sn_field_length: u8,
    /// Multicast radio bearer
    #[serde(default)]
    pub is_mrb: bool,
}

fn default_um_t_reordering() -> u32 {
    50
}

fn default_um_sn_field_length() -> u8 {
    10
}

impl Default for UmConfig {
    fn default() -> Self {
        Self {
            t_reordering_ms: default_um_t_reordering(),
            sn_field_length: default_um_sn_field_length(),
            is_mrb: false,
        }
    }
}

impl UmConfig {
    /// Fixed multicast (MCH) profile: 5-bit SN, no reordering.
    pub fn mch() -> Self {
        Self {
            t_reordering_ms: 0,
            sn_field_length: 5,
            is_mrb: true,
        }
    }
}

/// Acknowledged Mode parameters
///
/// `None` for `poll_pdu` / `poll_byte_kb` means infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmConfig {
    /// Poll retransmit timer (ms)
    pub t_poll_retx_ms: u32,
    /// PDUs between polls
    #[serde(default)]
    pub poll_pdu: Option<u32>,
    /// Kilobytes between polls
    #[serde(default)]
    pub poll_byte_kb: Option<u32>,
    /// Maximum number of retransmissions
    pub max_retx_thresh: u32,
    /// Reordering timer (ms)
    pub t_reordering_ms: u32,
    /// Status prohibit timer (ms)
    pub t_status_prohibit_ms: u32,
}

impl Default for AmConfig {
    /// Default SRB1/SRB2 configuration
    fn default() -> Self {
        Self {
            t_poll_retx_ms: 45,
            poll_pdu: None,
            poll_byte_kb: None,
            max_retx_thresh: 4,
            t_reordering_ms: 35,
            t_status_prohibit_ms: 0,
        }
    }
}

/// Per-bearer entity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RlcConfig {
    /// Transparent Mode, no parameters
    #[default]
    Tm,
    /// Unacknowledged Mode
    Um(UmConfig),
    /// Acknowledged Mode
    Am(AmConfig),
}

impl RlcConfig {
    /// Mode this configuration applies to
    pub fn mode(&self) -> RlcMode {
        match self {
            RlcConfig::Tm => RlcMode::Tm,
            RlcConfig::Um(_) => RlcMode::Um,
            RlcConfig::Am(_) => RlcMode::Am,
        }
    }

    /// Default configuration for the signalling bearers.
    ///
    /// SRB0 (LCID 0) is TM, SRB1 and SRB2 (LCIDs 1-2) are AM. Any other LCID
    /// needs an explicit configuration.
    pub fn srb_default(lcid: u32) -> Result<Self, RlcError> {
        match lcid {
            0 => Ok(RlcConfig::Tm),
            1 | 2 => Ok(RlcConfig::Am(AmConfig::default())),
            _ => Err(RlcError::ConfigurationRequired(lcid)),
        }
    }

    /// Fixed multicast bearer configuration
    pub fn mch() -> Self {
        RlcConfig::Um(UmConfig::mch())
    }
}

/// Bearer provisioned from the layer configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerProfile {
    /// Logical channel identifier
    pub lcid: u32,
    /// Mode name (`tm`, `um`, `am`)
    pub mode: String,
    /// UM parameters, defaults when absent
    #[serde(default)]
    pub um: Option<UmConfig>,
    /// AM parameters, defaults when absent
    #[serde(default)]
    pub am: Option<AmConfig>,
}

impl TryFrom<&BearerProfile> for RlcConfig {
    type Error = RlcError;

    fn try_from(profile: &BearerProfile) -> Result<Self, Self::Error> {
        Ok(match profile.mode.parse::<RlcMode>()? {
            RlcMode::Tm => RlcConfig::Tm,
            RlcMode::Um => RlcConfig::Um(profile.um.unwrap_or_default()),
            RlcMode::Am => RlcConfig::Am(profile.am.unwrap_or_default()),
        })
    }
}

/// Layer-wide RLC configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RlcLayerConfig {
    /// LCID of the default control-channel bearer (SRB0)
    #[serde(default)]
    pub default_lcid: u32,
    /// Largest SDU accepted from the upper layers
    #[serde(default = "default_max_sdu_size")]
    pub max_sdu_size: usize,
    /// Outstanding buffers allowed in the pool
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    /// Size of each pool buffer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// SDU queue capacity per entity
    #[serde(default = "default_sdu_queue_capacity")]
    pub sdu_queue_capacity: usize,
    /// Bearers added at startup
    #[serde(default)]
    pub bearers: Vec<BearerProfile>,
}

fn default_max_sdu_size() -> usize {
    MAX_SDU_SIZE
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_sdu_queue_capacity() -> usize {
    DEFAULT_SDU_QUEUE_CAPACITY
}

impl Default for RlcLayerConfig {
    fn default() -> Self {
        Self {
            default_lcid: 0,
            max_sdu_size: default_max_sdu_size(),
            pool_capacity: default_pool_capacity(),
            buffer_size: default_buffer_size(),
            sdu_queue_capacity: default_sdu_queue_capacity(),
            bearers: Vec::new(),
        }
    }
}

impl RlcLayerConfig {
    /// Validates ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_lcid >= N_RADIO_BEARERS {
            return Err(ConfigValidationError::InvalidLcid(format!(
                "default_lcid {} must be in [0:{})",
                self.default_lcid, N_RADIO_BEARERS
            )));
        }
        if self.max_sdu_size == 0 || self.max_sdu_size > self.buffer_size {
            return Err(ConfigValidationError::InvalidSize(format!(
                "max_sdu_size {} must be in [1:{}]",
                self.max_sdu_size, self.buffer_size
            )));
        }
        if self.pool_capacity == 0 {
            return Err(ConfigValidationError::InvalidSize(
                "pool_capacity must be non-zero".to_string(),
            ));
        }
        if self.sdu_queue_capacity == 0 {
            return Err(ConfigValidationError::InvalidSize(
                "sdu_queue_capacity must be non-zero".to_string(),
            ));
        }

        let mut seen = HashSet::from([self.default_lcid]);
        for bearer in &self.bearers {
            if bearer.lcid >= N_RADIO_BEARERS {
                return Err(ConfigValidationError::InvalidLcid(format!(
                    "bearer LCID {} must be in [0:{})",
                    bearer.lcid, N_RADIO_BEARERS
                )));
            }
            if !seen.insert(bearer.lcid) {
                return Err(ConfigValidationError::DuplicateLcid(bearer.lcid));
            }
            if bearer.mode.parse::<RlcMode>().is_err() {
                return Err(ConfigValidationError::InvalidMode(bearer.mode.clone()));
            }
        }
        Ok(())
    }
}

/// Loads the layer configuration from a YAML file.
pub fn load_rlc_config<P: AsRef<Path>>(path: P) -> Result<RlcLayerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_rlc_config_from_str(&contents)
}

/// Loads the layer configuration from a YAML string.
pub fn load_rlc_config_from_str(yaml: &str) -> Result<RlcLayerConfig, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Loads and validates the layer configuration from a YAML file.
pub fn load_and_validate_rlc_config<P: AsRef<Path>>(
    path: P,
) -> Result<RlcLayerConfig, ConfigError> {
    let config = load_rlc_config(path)?;
    config.validate()?;
    Ok(config)
}
