//! The module configuration document.
//!
//! Unknown top-level keys pass through untouched (they belong to neighboring
//! module layers); unknown enum values are a parse error.

use crate::error::ConfigError;
use gpuplane_api::labels::MANAGED_NODE_LABEL;
use gpuplane_api::{LabelSelector, SchedulingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How discovered devices get approved for pool membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalMode {
    /// Devices wait for an operator.
    #[default]
    Manual,
    /// Every discovered device is approved.
    Automatic,
    /// Devices matching a label selector are approved.
    Selector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedNodes {
    /// Node label consulted for the managed decision.
    pub label_key: String,
    /// Fallback when the label is absent.
    pub enabled_by_default: bool,
}

impl Default for ManagedNodes {
    fn default() -> Self {
        Self {
            label_key: MANAGED_NODE_LABEL.to_string(),
            enabled_by_default: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceApproval {
    pub mode: ApprovalMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingDefaults {
    pub default_strategy: SchedulingStrategy,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub topology_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Placement {
    /// Taint keys workloads should tolerate with `Exists` regardless of pool.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_toleration_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Monitoring {
    pub service_monitor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryOptions {
    /// Full republish interval, `^[0-9]+(s|m|h)$`.
    pub resync_period: String,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            resync_period: "10m".to_string(),
        }
    }
}

/// Verbosity of the module's structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// How the webhook endpoints are exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpsMode {
    Disabled,
    #[default]
    CertManager,
    CustomCertificate,
    OnlyInURI,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertManagerOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_issuer_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomCertificateOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpsOptions {
    pub mode: HttpsMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_manager: Option<CertManagerOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_certificate: Option<CustomCertificateOptions>,
}

/// The root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleConfig {
    pub managed_nodes: ManagedNodes,
    pub device_approval: DeviceApproval,
    pub scheduling: SchedulingDefaults,
    pub placement: Placement,
    pub monitoring: Monitoring,
    pub inventory: InventoryOptions,
    pub log_level: LogLevel,
    pub https: HttpsOptions,
    /// Unknown top-level keys, preserved verbatim.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ModuleConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(doc: &str) -> Result<Self, ConfigError> {
        let config: ModuleConfig =
            serde_yaml::from_str(doc).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.device_approval.mode, &self.device_approval.selector) {
            (ApprovalMode::Selector, None) => return Err(ConfigError::SelectorRequired),
            (_, Some(selector)) => selector.validate()?,
            _ => {}
        }
        self.resync_period()?;
        if self.https.mode == HttpsMode::CustomCertificate
            && self
                .https
                .custom_certificate
                .as_ref()
                .map(|c| c.secret_name.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(ConfigError::MissingSecretName);
        }
        Ok(())
    }

    /// The inventory resync period as a duration.
    pub fn resync_period(&self) -> Result<Duration, ConfigError> {
        parse_resync_period(&self.inventory.resync_period)
    }
}

/// Parse `^[0-9]+(s|m|h)$` into a duration.
fn parse_resync_period(s: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidResyncPeriod(s.to_string());
    if s.len() < 2 {
        return Err(invalid());
    }
    let (digits, suffix) = s.split_at(s.len() - 1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let n: u64 = digits.parse().map_err(|_| invalid())?;
    match suffix {
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        _ => Err(invalid()),
    }
}
