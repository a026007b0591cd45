//! Error types for the RLC layer

use thiserror::Error;
use tracing::Level;

use crate::config::RlcMode;

/// Errors returned by the bearer manager.
///
/// None of these are fatal for the layer itself. Each variant carries a
/// severity so callers and the manager log it consistently: pool exhaustion is
/// a resource failure elsewhere in the system and is reported at `ERROR`,
/// everything else is an expected-but-notable condition reported at `WARN`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlcError {
    /// Mode tag does not name TM, UM or AM
    #[error("invalid RLC mode: {0}")]
    InvalidMode(String),

    /// LCID already present in its namespace
    #[error("bearer LCID {0} already exists")]
    AlreadyExists(u32),

    /// LCID not present in its namespace
    #[error("bearer LCID {0} does not exist")]
    NotFound(u32),

    /// LCID outside the namespace range
    #[error("LCID {lcid} out of range [0:{limit})")]
    InvalidLcid {
        /// Requested identifier
        lcid: u32,
        /// Exclusive upper bound of the namespace
        limit: u32,
    },

    /// Entity rejected its configuration
    #[error("error configuring {mode} entity for LCID {lcid}")]
    ConfigurationError {
        /// Target identifier
        lcid: u32,
        /// Requested mode
        mode: RlcMode,
    },

    /// No default configuration exists for this LCID
    #[error("bearer LCID {0} does not support default RLC configuration")]
    ConfigurationRequired(u32),

    /// SDU exceeds the maximum SDU size
    #[error("dropping too long SDU of size {len} B (max. size {max} B)")]
    OversizedPacket {
        /// Packet size in bytes
        len: usize,
        /// Maximum accepted size in bytes
        max: usize,
    },

    /// Data-plane submission for an LCID without a bearer
    #[error("RLC LCID {0} doesn't exist, deallocating SDU")]
    UnknownBearer(u32),

    /// Byte-buffer pool exhausted
    #[error("out of buffers from the pool in {0}")]
    AllocationFailure(&'static str),

    /// Layer configuration failed validation
    #[error("invalid RLC layer configuration: {0}")]
    InvalidConfiguration(#[from] ConfigValidationError),
}

impl RlcError {
    /// Severity at which this error is reported.
    pub fn severity(&self) -> Level {
        match self {
            RlcError::AllocationFailure(_) => Level::ERROR,
            _ => Level::WARN,
        }
    }

    /// Returns true if this error reflects resource exhaustion.
    pub fn is_resource_failure(&self) -> bool {
        self.severity() == Level::ERROR
    }

    /// Emits this error through `tracing` at its severity.
    pub fn log(&self, bearer: &str) {
        if self.severity() == Level::ERROR {
            tracing::error!(bearer, "{self}");
        } else {
            tracing::warn!(bearer, "{self}");
        }
    }
}

/// Errors that can occur while loading the layer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ConfigValidationError),
}

/// Errors that can occur while validating the layer configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// LCID outside its namespace
    #[error("Invalid LCID: {0}")]
    InvalidLcid(String),

    /// Two provisioned bearers share an LCID
    #[error("Duplicate bearer LCID: {0}")]
    DuplicateLcid(u32),

    /// Size or capacity parameter out of range
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Bearer profile names an unknown mode
    #[error("Invalid bearer mode: {0}")]
    InvalidMode(String),
}
