//! Composition of capability descriptors into one unified descriptor.
//!
//! Merge rules:
//! - features are concatenated; a `(name, endpoint)` collision is an error
//!   unless the later feature is override-eligible, in which case it replaces
//!   the earlier one in place
//! - inbound converters are concatenated and matched first-wins at runtime;
//!   a converter identical to one seen before is skipped
//! - outbound converters are indexed by feature key, last-wins
//! - configure steps are concatenated in contribution order and never
//!   reordered here; grouping happens in the planner

use crate::capability::{
    CapabilityDescriptor, ConfigureStep, Feature, InboundConverter, Message, OutboundConverter,
};
use crate::endpoint::EndpointSpec;
use crate::error::ComposeError;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// A configure step together with the capability that contributed it.
#[derive(Debug, Clone)]
pub struct TaggedStep {
    pub capability: String,
    pub step: ConfigureStep,
}

/// Composer output for one device definition.
///
/// Immutable once built and shared by every device matching the definition.
#[derive(Debug, Clone, Default)]
pub struct UnifiedDescriptor {
    pub capabilities: Vec<String>,
    pub exposes: Vec<Feature>,
    pub inbound: Vec<InboundConverter>,
    pub outbound: Vec<OutboundConverter>,
    outbound_index: BTreeMap<String, usize>,
    pub configure: Vec<TaggedStep>,
    pub endpoints: EndpointSpec,
    /// Feature keys carry the logical endpoint name (`state_l1`)
    pub multi_endpoint: bool,
}

/// Merge `descriptors` in contribution order.
pub fn compose(descriptors: &[CapabilityDescriptor]) -> Result<UnifiedDescriptor, ComposeError> {
    let mut unified = UnifiedDescriptor::default();
    let mut feature_owners: Vec<String> = Vec::new();

    for descriptor in descriptors {
        validate(descriptor)?;
        unified.capabilities.push(descriptor.name.clone());

        for feature in &descriptor.exposes {
            let existing = unified.exposes.iter().position(|f| f.key() == feature.key());
            match existing {
                Some(index) if feature.override_eligible => {
                    debug!(
                        "[Compose] '{}' overrides feature '{}' of '{}'",
                        descriptor.name,
                        feature.property(),
                        feature_owners[index]
                    );
                    unified.exposes[index] = feature.clone();
                    feature_owners[index] = descriptor.name.clone();
                }
                Some(index) => {
                    return Err(ComposeError::DuplicateFeature {
                        name: feature.name.clone(),
                        endpoint: feature.endpoint.clone(),
                        first: feature_owners[index].clone(),
                        second: descriptor.name.clone(),
                    });
                }
                None => {
                    unified.exposes.push(feature.clone());
                    feature_owners.push(descriptor.name.clone());
                }
            }
        }

        for converter in &descriptor.inbound {
            if unified.inbound.iter().any(|c| c.same_as(converter)) {
                continue;
            }
            if unified.inbound.iter().any(|c| c.name == converter.name) {
                debug!(
                    "[Compose] '{}' adds a second inbound converter named '{}'",
                    descriptor.name, converter.name
                );
            }
            unified.inbound.push(converter.clone());
        }

        for converter in &descriptor.outbound {
            let index = unified.outbound.len();
            for key in &converter.keys {
                if let Some(previous) = unified.outbound_index.insert(key.clone(), index) {
                    debug!(
                        "[Compose] '{}' takes over key '{}' from converter '{}'",
                        descriptor.name, key, unified.outbound[previous].name
                    );
                }
            }
            unified.outbound.push(converter.clone());
        }

        unified.configure.extend(descriptor.configure.iter().map(|step| TaggedStep {
            capability: descriptor.name.clone(),
            step: step.clone(),
        }));
    }

    Ok(unified)
}

fn validate(descriptor: &CapabilityDescriptor) -> Result<(), ComposeError> {
    for converter in &descriptor.inbound {
        converter.validate().map_err(|reason| ComposeError::InvalidInbound {
            capability: descriptor.name.clone(),
            converter: converter.name.clone(),
            reason,
        })?;
    }
    for converter in &descriptor.outbound {
        converter.validate().map_err(|reason| ComposeError::InvalidOutbound {
            capability: descriptor.name.clone(),
            converter: converter.name.clone(),
            reason,
        })?;
    }
    for step in &descriptor.configure {
        step.validate().map_err(|reason| ComposeError::InvalidStep {
            capability: descriptor.name.clone(),
            reason,
        })?;
    }
    Ok(())
}

impl UnifiedDescriptor {
    pub fn with_endpoints(mut self, endpoints: EndpointSpec) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_multi_endpoint(mut self, multi_endpoint: bool) -> Self {
        self.multi_endpoint = multi_endpoint;
        self
    }

    /// First inbound converter that accepts `msg`.
    pub fn inbound_for(&self, msg: &Message) -> Option<&InboundConverter> {
        self.inbound.iter().find(|c| c.matches(msg))
    }

    /// Converter registered last for `key`.
    pub fn outbound_for(&self, key: &str) -> Option<&OutboundConverter> {
        self.outbound_index.get(key).map(|&index| &self.outbound[index])
    }

    pub fn feature(&self, name: &str, endpoint: Option<&str>) -> Option<&Feature> {
        self.exposes.iter().find(|f| f.key() == (name, endpoint))
    }

    /// Structural summary, stable across runs.
    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            capabilities: self.capabilities.clone(),
            exposes: self.exposes.iter().map(Feature::signature).collect(),
            inbound: self
                .inbound
                .iter()
                .map(|c| format!("{}@{}", c.name, c.cluster))
                .collect(),
            outbound: self
                .outbound_index
                .iter()
                .map(|(key, &index)| (key.clone(), self.outbound[index].name.clone()))
                .collect(),
            configure: self
                .configure
                .iter()
                .map(|tagged| describe_step(&tagged.capability, &tagged.step))
                .collect(),
        }
    }
}

fn describe_step(capability: &str, step: &ConfigureStep) -> String {
    let detail = match step {
        ConfigureStep::Bind { cluster, .. } => cluster.clone(),
        ConfigureStep::Read { cluster, attributes, .. } => format!("{}[{}]", cluster, attributes.join(",")),
        ConfigureStep::ConfigureReporting {
            cluster,
            attribute,
            config,
            ..
        } => match config {
            Some(c) => format!("{}.{} {{{}, {}, {}}}", cluster, attribute, c.min, c.max, c.change),
            None => format!("{cluster}.{attribute} default"),
        },
        ConfigureStep::Custom { name, .. } => name.clone(),
    };
    format!("{}: {} {} @ {}", capability, step.kind(), detail, step.endpoint())
}

/// Serializable view of a [`UnifiedDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSummary {
    pub capabilities: Vec<String>,
    pub exposes: Vec<String>,
    pub inbound: Vec<String>,
    /// Feature key to the converter handling it
    pub outbound: BTreeMap<String, String>,
    pub configure: Vec<String>,
}
