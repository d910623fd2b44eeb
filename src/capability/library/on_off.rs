use super::{endpoint_names, qualify, target_of};
use crate::capability::{
    Access, AttributeMapping, CapabilityDescriptor, Category, ConfigureStep, Encode, Feature,
    InboundConverter, OutboundConverter, Transform,
};
use crate::zcl::cluster::GEN_ON_OFF;

/// Arguments of [`on_off`].
#[derive(Debug, Clone)]
pub struct OnOffArgs {
    /// Logical endpoints to expose a switch on; empty for a single switch
    pub endpoint_names: Vec<String>,
    pub power_on_behavior: bool,
    pub configure_reporting: bool,
    pub description: Option<String>,
}

impl Default for OnOffArgs {
    fn default() -> Self {
        Self {
            endpoint_names: Vec::new(),
            power_on_behavior: true,
            configure_reporting: true,
            description: None,
        }
    }
}

impl OnOffArgs {
    pub fn endpoints<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            endpoint_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn without_power_on_behavior(mut self) -> Self {
        self.power_on_behavior = false;
        self
    }

    pub fn without_reporting(mut self) -> Self {
        self.configure_reporting = false;
        self
    }
}

pub(crate) fn power_on_behavior_lookup() -> Transform {
    Transform::lookup([("off", 0), ("on", 1), ("toggle", 2), ("previous", 255)])
}

pub(crate) fn state_feature() -> Feature {
    Feature::binary("state", Access::All, "ON", "OFF").with_description("On/off state of the switch")
}

pub(crate) fn on_off_inbound() -> InboundConverter {
    InboundConverter::attributes(
        "on_off",
        GEN_ON_OFF,
        vec![AttributeMapping::new("onOff", "state", Transform::on_off())],
    )
}

pub(crate) fn on_off_outbound() -> OutboundConverter {
    OutboundConverter::new(
        "on_off",
        ["state"],
        Encode::Command {
            cluster: GEN_ON_OFF.to_string(),
            commands: vec![
                ("ON".to_string(), "on".to_string()),
                ("OFF".to_string(), "off".to_string()),
                ("TOGGLE".to_string(), "toggle".to_string()),
            ],
        },
    )
    .with_read_back(GEN_ON_OFF, ["onOff"])
}

pub(crate) fn power_on_behavior_feature(name: Option<&str>) -> Feature {
    qualify(
        Feature::enumeration("power_on_behavior", Access::All, ["off", "on", "toggle", "previous"])
            .with_category(Category::Config)
            .with_description("Controls the behavior when the device is powered on after power loss"),
        name,
    )
}

pub(crate) fn power_on_behavior_converters() -> (InboundConverter, OutboundConverter) {
    let inbound = InboundConverter::attributes(
        "power_on_behavior",
        GEN_ON_OFF,
        vec![AttributeMapping::new(
            "startUpOnOff",
            "power_on_behavior",
            power_on_behavior_lookup(),
        )],
    );
    let outbound = OutboundConverter::new(
        "power_on_behavior",
        ["power_on_behavior"],
        Encode::WriteAttribute {
            cluster: GEN_ON_OFF.to_string(),
            attribute: "startUpOnOff".to_string(),
            transform: power_on_behavior_lookup(),
            manufacturer_code: None,
        },
    )
    .with_read_back(GEN_ON_OFF, ["startUpOnOff"]);
    (inbound, outbound)
}

/// Relay or socket switching `genOnOff`, one switch per logical endpoint.
pub fn on_off(args: OnOffArgs) -> CapabilityDescriptor {
    let mut descriptor = CapabilityDescriptor::new("on_off")
        .inbound(on_off_inbound())
        .outbound(on_off_outbound());

    for name in endpoint_names(&args.endpoint_names) {
        let mut state = state_feature();
        if let Some(description) = &args.description {
            state = state.with_description(description.clone());
        }
        descriptor = descriptor.expose(qualify(Feature::composite("switch", vec![state]), name));
        if args.power_on_behavior {
            descriptor = descriptor.expose(power_on_behavior_feature(name));
        }

        if args.configure_reporting {
            let target = target_of(name);
            descriptor = descriptor.steps([
                ConfigureStep::bind(GEN_ON_OFF).on_opt(target.as_ref()),
                ConfigureStep::read(GEN_ON_OFF, ["onOff"]).on_opt(target.as_ref()),
                ConfigureStep::report(GEN_ON_OFF, "onOff", None).on_opt(target.as_ref()),
            ]);
        }
    }

    if args.power_on_behavior {
        let (inbound, outbound) = power_on_behavior_converters();
        descriptor = descriptor.inbound(inbound).outbound(outbound);
    }
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StepKind;
    use crate::endpoint::EndpointTarget;

    #[test]
    fn test_single_switch() {
        let descriptor = on_off(OnOffArgs::default());
        let signatures: Vec<String> = descriptor.exposes.iter().map(Feature::signature).collect();
        assert_eq!(signatures, vec!["switch(state)", "power_on_behavior"]);
        assert_eq!(descriptor.inbound.len(), 2);
        assert_eq!(descriptor.outbound[0].keys, vec!["state".to_string()]);

        let kinds: Vec<StepKind> = descriptor.configure.iter().map(ConfigureStep::kind).collect();
        assert_eq!(kinds, vec![StepKind::Bind, StepKind::Read, StepKind::ConfigureReporting]);
        assert!(descriptor
            .configure
            .iter()
            .all(|s| s.endpoint() == &EndpointTarget::Supporting));
    }

    #[test]
    fn test_multi_endpoint_switch() {
        let descriptor = on_off(OnOffArgs::endpoints(["top", "bottom"]).without_power_on_behavior());
        let signatures: Vec<String> = descriptor.exposes.iter().map(Feature::signature).collect();
        assert_eq!(signatures, vec!["switch_top(state)", "switch_bottom(state)"]);
        assert_eq!(descriptor.inbound.len(), 1);
        assert_eq!(descriptor.configure.len(), 6);
        assert_eq!(descriptor.configure[3].endpoint(), &EndpointTarget::named("bottom"));
    }

    #[test]
    fn test_without_reporting() {
        let descriptor = on_off(OnOffArgs::default().without_reporting());
        assert!(descriptor.configure.is_empty());
    }
}
