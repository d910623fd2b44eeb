//! Error and warning types.
//!
//! Failures are split by when they can happen:
//! - [`ComposeError`]: definition-load time, fatal to that one definition
//! - [`ConfigureWarning`]: endpoint resolution and planning problems, non-fatal
//! - [`CommandError`]: a single radio command failed, non-fatal
//! - [`ConvertError`]: a runtime set/get request could not be encoded
//! - [`BridgeError`]: service-level failures of the binaries

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Composition failure, raised while a device definition is loaded.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error(
        "Feature '{name}'{} declared by both '{first}' and '{second}'",
        endpoint_suffix(.endpoint)
    )]
    DuplicateFeature {
        name: String,
        endpoint: Option<String>,
        first: String,
        second: String,
    },

    #[error("Capability '{capability}' has an invalid inbound converter '{converter}': {reason}")]
    InvalidInbound {
        capability: String,
        converter: String,
        reason: String,
    },

    #[error("Capability '{capability}' has an invalid outbound converter '{converter}': {reason}")]
    InvalidOutbound {
        capability: String,
        converter: String,
        reason: String,
    },

    #[error("Capability '{capability}' has an invalid configure step: {reason}")]
    InvalidStep { capability: String, reason: String },

    #[error("Definition '{0}' has no capabilities")]
    EmptyDefinition(String),
}

fn endpoint_suffix(endpoint: &Option<String>) -> String {
    match endpoint {
        Some(name) => format!(" on endpoint '{name}'"),
        None => String::new(),
    }
}

/// A single radio command failed.
#[derive(ThisError, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum CommandError {
    #[error("No response within {0} ms")]
    Timeout(u64),

    #[error("Device rejected the request with status {0}")]
    Rejected(String),

    #[error("Unsupported cluster: {0}")]
    UnsupportedCluster(String),

    #[error("Unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Non-fatal problem found while resolving or planning a configuration run.
///
/// The steps concerned are skipped, the rest of the run carries on.
#[derive(ThisError, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ConfigureWarning {
    #[error("Endpoint mapping '{name}' -> {endpoint} references an endpoint the device does not have")]
    MissingEndpoint { name: String, endpoint: u8 },

    #[error("Logical endpoint '{name}' is not mapped for this device")]
    UnresolvedEndpoint { name: String },

    #[error("Endpoint {endpoint} is not present on the device")]
    AbsentEndpoint { endpoint: u8 },

    #[error("Device reports no endpoints, {cluster} steps skipped")]
    NoEndpoints { cluster: String },
}

/// Runtime conversion failure for a feature set/get request.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("No converter handles '{0}'")]
    UnknownKey(String),

    #[error("'{key}' is read-only")]
    NotWritable { key: String },

    #[error("'{key}' cannot be read back")]
    NotReadable { key: String },

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue {
        key: String,
        value: serde_json::Value,
    },
}

/// Service-level errors of the bridge binaries.
#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Unknown device model: {0}")]
    UnknownModel(String),

    #[error("Invalid device inventory: {0}")]
    InvalidInventory(String),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_feature_message() {
        let err = ComposeError::DuplicateFeature {
            name: "state".to_string(),
            endpoint: Some("l1".to_string()),
            first: "on_off".to_string(),
            second: "light".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Feature 'state' on endpoint 'l1' declared by both 'on_off' and 'light'"
        );

        let err = ComposeError::DuplicateFeature {
            name: "battery".to_string(),
            endpoint: None,
            first: "battery".to_string(),
            second: "battery_quirk".to_string(),
        };
        assert!(!err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_command_error_serializes_with_tag() {
        let json = serde_json::to_value(CommandError::Timeout(500)).unwrap();
        assert_eq!(json["error"], "timeout");
        assert_eq!(json["detail"], 500);
    }
}
