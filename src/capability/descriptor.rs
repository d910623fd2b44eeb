use super::converter::{InboundConverter, OutboundConverter};
use super::feature::Feature;
use super::step::ConfigureStep;

/// Everything one capability contributes to a device definition.
///
/// Built once when definitions are loaded, never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub exposes: Vec<Feature>,
    pub inbound: Vec<InboundConverter>,
    pub outbound: Vec<OutboundConverter>,
    pub configure: Vec<ConfigureStep>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn expose(mut self, feature: Feature) -> Self {
        self.exposes.push(feature);
        self
    }

    pub fn inbound(mut self, converter: InboundConverter) -> Self {
        self.inbound.push(converter);
        self
    }

    pub fn outbound(mut self, converter: OutboundConverter) -> Self {
        self.outbound.push(converter);
        self
    }

    pub fn step(mut self, step: ConfigureStep) -> Self {
        self.configure.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = ConfigureStep>) -> Self {
        self.configure.extend(steps);
        self
    }
}
