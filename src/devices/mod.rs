//! Device definitions and the registry that composes them.
//!
//! A definition lists the capabilities of one device model in composition
//! order. The registry composes every definition once at load time and shares
//! the resulting descriptor between all devices of that model.

mod catalog;

pub use catalog::builtin;

use crate::capability::CapabilityDescriptor;
use crate::compose::{UnifiedDescriptor, compose};
use crate::endpoint::EndpointSpec;
use crate::error::ComposeError;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Match on the basic-cluster identity a device reports during interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub model_id: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
}

impl Fingerprint {
    pub fn new(model_id: &str, manufacturer: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            manufacturer: Some(manufacturer.to_string()),
        }
    }

    /// One fingerprint per manufacturer name sharing a model id.
    pub fn many(model_id: &str, manufacturers: &[&str]) -> Vec<Self> {
        manufacturers.iter().map(|m| Self::new(model_id, m)).collect()
    }

    pub fn matches(&self, model_id: &str, manufacturer: Option<&str>) -> bool {
        if self.model_id != model_id {
            return false;
        }
        match (&self.manufacturer, manufacturer) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        }
    }
}

/// One supported device model.
#[derive(Debug, Clone, Default)]
pub struct DeviceDefinition {
    pub model: String,
    pub vendor: String,
    pub description: String,
    pub zigbee_models: Vec<String>,
    pub fingerprints: Vec<Fingerprint>,
    pub capabilities: Vec<CapabilityDescriptor>,
    pub endpoints: EndpointSpec,
    pub multi_endpoint: bool,
}

impl DeviceDefinition {
    pub fn new(model: &str, vendor: &str, description: &str) -> Self {
        Self {
            model: model.to_string(),
            vendor: vendor.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn zigbee_models<S: Into<String>>(mut self, models: impl IntoIterator<Item = S>) -> Self {
        self.zigbee_models.extend(models.into_iter().map(Into::into));
        self
    }

    pub fn fingerprints(mut self, fingerprints: impl IntoIterator<Item = Fingerprint>) -> Self {
        self.fingerprints.extend(fingerprints);
        self
    }

    pub fn capability(mut self, capability: CapabilityDescriptor) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointSpec) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn multi_endpoint(mut self) -> Self {
        self.multi_endpoint = true;
        self
    }

    pub fn compose(&self) -> Result<UnifiedDescriptor, ComposeError> {
        if self.capabilities.is_empty() {
            return Err(ComposeError::EmptyDefinition(self.model.clone()));
        }
        Ok(compose(&self.capabilities)?
            .with_endpoints(self.endpoints.clone())
            .with_multi_endpoint(self.multi_endpoint))
    }

    fn identifies(&self, model_id: &str, manufacturer: Option<&str>) -> bool {
        self.fingerprints.iter().any(|f| f.matches(model_id, manufacturer))
    }
}

/// A successfully composed definition.
#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    pub definition: Arc<DeviceDefinition>,
    pub descriptor: Arc<UnifiedDescriptor>,
}

/// Composed definitions, looked up by what a device reports about itself.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    entries: Vec<RegisteredDevice>,
    errors: Vec<(String, ComposeError)>,
}

impl DefinitionRegistry {
    /// Compose every definition. Definitions that fail to compose are left
    /// out and kept in [`errors`](Self::errors).
    pub fn load(definitions: impl IntoIterator<Item = DeviceDefinition>) -> Self {
        let mut registry = Self::default();
        for definition in definitions {
            match definition.compose() {
                Ok(descriptor) => {
                    debug!(
                        "[Registry] {} composed from {} capabilities",
                        definition.model,
                        descriptor.capabilities.len()
                    );
                    registry.entries.push(RegisteredDevice {
                        definition: Arc::new(definition),
                        descriptor: Arc::new(descriptor),
                    });
                }
                Err(e) => {
                    error!("[Registry] Definition {} rejected: {}", definition.model, e);
                    registry.errors.push((definition.model, e));
                }
            }
        }
        info!(
            "[Registry] {} definitions loaded, {} rejected",
            registry.entries.len(),
            registry.errors.len()
        );
        registry
    }

    /// Registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self::load(builtin())
    }

    /// Definition for a device. Fingerprints take precedence over plain
    /// zigbee model ids.
    pub fn find(&self, model_id: &str, manufacturer: Option<&str>) -> Option<&RegisteredDevice> {
        self.entries
            .iter()
            .find(|e| e.definition.identifies(model_id, manufacturer))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.definition.zigbee_models.iter().any(|m| m == model_id))
            })
    }

    /// Definition by its catalog model name.
    pub fn by_model(&self, model: &str) -> Option<&RegisteredDevice> {
        self.entries.iter().find(|e| e.definition.model == model)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredDevice> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn errors(&self) -> &[(String, ComposeError)] {
        &self.errors
    }
}
