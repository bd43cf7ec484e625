//! Error types for module-configuration handling.

use gpuplane_api::SelectorError;
use thiserror::Error;

/// Errors raised while parsing or validating the module configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document failed to parse (includes unknown enum values).
    #[error("malformed module config: {0}")]
    Parse(String),

    /// Device-approval selector failed validation.
    #[error("deviceApproval.selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    /// Selector mode chosen but no selector supplied.
    #[error("deviceApproval.mode is Selector but no selector is set")]
    SelectorRequired,

    /// Resync period does not match `^[0-9]+(s|m|h)$`.
    #[error("inventory.resyncPeriod {0:?} must match ^[0-9]+(s|m|h)$")]
    InvalidResyncPeriod(String),

    /// `CustomCertificate` mode without a secret name.
    #[error("https.customCertificate.secretName must not be empty in CustomCertificate mode")]
    MissingSecretName,
}
