//! Error types for the preparation pipeline.

use thiserror::Error;

/// Opaque error surfaced by a hardware manager port.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct HardwareError(pub String);

impl HardwareError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint decode: {0}")]
    Decode(String),

    #[error("checkpoint schema version {found} is newer than supported {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Pipeline errors. Every step wraps its failure with the step name and,
/// where one exists, the device it was working on.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Request fails the entry validation.
    #[error("validate: {0}")]
    InvalidRequest(String),

    /// A step's precondition does not hold (missing attribute, missing
    /// manager port, wrong device type).
    #[error("{step}: device {device:?}: {message}")]
    Precondition {
        step: &'static str,
        device: String,
        message: String,
    },

    /// A manager port failed.
    #[error("{step}: device {device:?}: {source}")]
    Hardware {
        step: &'static str,
        device: String,
        #[source]
        source: HardwareError,
    },

    /// Two devices of one MPS sharing group carry different control IDs.
    #[error("mps prepare: conflicting control ids {first:?} and {second:?} in one sharing group")]
    ControlIdConflict { first: String, second: String },

    /// The CDI writer produced no IDs for a prepared device.
    #[error("cdi write: no device IDs returned for device {device:?}")]
    MissingCdiIds { device: String },

    /// Checkpoint load/save failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl PrepareError {
    pub(crate) fn precondition(step: &'static str, device: &str, message: impl Into<String>) -> Self {
        Self::Precondition {
            step,
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn hardware(step: &'static str, device: &str, source: HardwareError) -> Self {
        Self::Hardware {
            step,
            device: device.to_string(),
            source,
        }
    }
}
