use super::on_off::{on_off_inbound, on_off_outbound, power_on_behavior_converters, power_on_behavior_feature, state_feature};
use super::{endpoint_names, qualify, target_of};
use crate::capability::{
    Access, AttributeMapping, CapabilityDescriptor, ConfigureStep, Encode, Feature, InboundConverter,
    OutboundConverter, Payload, Transform,
};
use crate::zcl::MessageKind;
use crate::zcl::cluster::{GEN_BASIC, GEN_IDENTIFY, GEN_LEVEL_CTRL, GEN_ON_OFF, LIGHTING_COLOR_CTRL};
use serde_json::Value;

/// Arguments of [`light`].
#[derive(Debug, Clone)]
pub struct LightArgs {
    pub endpoint_names: Vec<String>,
    /// Color temperature range in mired, `None` for dimmable-only lights
    pub color_temp: Option<(u16, u16)>,
    pub effect: bool,
    pub power_on_behavior: bool,
    pub configure_reporting: bool,
}

impl Default for LightArgs {
    fn default() -> Self {
        Self {
            endpoint_names: Vec::new(),
            color_temp: None,
            effect: true,
            power_on_behavior: true,
            configure_reporting: false,
        }
    }
}

impl LightArgs {
    pub fn with_color_temp(mut self, min: u16, max: u16) -> Self {
        self.color_temp = Some((min, max));
        self
    }

    pub fn with_reporting(mut self) -> Self {
        self.configure_reporting = true;
        self
    }
}

fn transition_payload(field: &str) -> Payload {
    let mut extra = Payload::new();
    extra.insert(field.to_string(), Value::from(0));
    extra
}

/// Dimmable light, optionally with color temperature.
pub fn light(args: LightArgs) -> CapabilityDescriptor {
    let mut descriptor = CapabilityDescriptor::new("light")
        .inbound(on_off_inbound())
        .inbound(InboundConverter::attributes(
            "brightness",
            GEN_LEVEL_CTRL,
            vec![AttributeMapping::new("currentLevel", "brightness", Transform::Identity)],
        ))
        .inbound(InboundConverter::ignore(
            "ignore_basic_report",
            GEN_BASIC,
            vec![MessageKind::AttributeReport],
        ))
        .outbound(on_off_outbound())
        .outbound(
            OutboundConverter::new(
                "brightness",
                ["brightness"],
                Encode::CommandWithValue {
                    cluster: GEN_LEVEL_CTRL.to_string(),
                    command: "moveToLevelWithOnOff".to_string(),
                    field: "level".to_string(),
                    transform: Transform::Identity,
                    extra: transition_payload("transtime"),
                },
            )
            .with_read_back(GEN_LEVEL_CTRL, ["currentLevel"]),
        );

    if args.color_temp.is_some() {
        descriptor = descriptor
            .inbound(InboundConverter::attributes(
                "color_colortemp",
                LIGHTING_COLOR_CTRL,
                vec![
                    AttributeMapping::new("colorTemperature", "color_temp", Transform::Identity),
                    AttributeMapping::new(
                        "colorMode",
                        "color_mode",
                        Transform::lookup([("hs", 0), ("xy", 1), ("color_temp", 2)]),
                    ),
                ],
            ))
            .outbound(
                OutboundConverter::new(
                    "color_temp",
                    ["color_temp"],
                    Encode::CommandWithValue {
                        cluster: LIGHTING_COLOR_CTRL.to_string(),
                        command: "moveToColorTemp".to_string(),
                        field: "colortemp".to_string(),
                        transform: Transform::Identity,
                        extra: transition_payload("transtime"),
                    },
                )
                .with_read_back(LIGHTING_COLOR_CTRL, ["colorTemperature"]),
            );
    }

    if args.effect {
        descriptor = descriptor
            .expose(Feature::enumeration(
                "effect",
                Access::Set,
                ["blink", "breathe", "okay", "channel_change", "finish_effect", "stop_effect"],
            ))
            .outbound(OutboundConverter::new(
                "effect",
                ["effect"],
                Encode::CommandWithValue {
                    cluster: GEN_IDENTIFY.to_string(),
                    command: "triggerEffect".to_string(),
                    field: "effectid".to_string(),
                    transform: Transform::lookup([
                        ("blink", 0),
                        ("breathe", 1),
                        ("okay", 2),
                        ("channel_change", 11),
                        ("finish_effect", 254),
                        ("stop_effect", 255),
                    ]),
                    extra: transition_payload("effectvariant"),
                },
            ));
    }

    for name in endpoint_names(&args.endpoint_names) {
        let mut members = vec![
            state_feature(),
            Feature::numeric("brightness", Access::All)
                .with_range(0.0, 254.0, None)
                .with_description("Brightness of this light"),
        ];
        if let Some((min, max)) = args.color_temp {
            members.push(
                Feature::numeric("color_temp", Access::All)
                    .with_range(min as f64, max as f64, None)
                    .with_unit("mired")
                    .with_description("Color temperature of this light"),
            );
        }
        descriptor = descriptor.expose(qualify(Feature::composite("light", members), name));
        if args.power_on_behavior {
            descriptor = descriptor.expose(power_on_behavior_feature(name));
        }

        let target = target_of(name);
        if args.color_temp.is_some() {
            descriptor = descriptor.step(
                ConfigureStep::read(
                    LIGHTING_COLOR_CTRL,
                    ["colorCapabilities", "colorTempPhysicalMin", "colorTempPhysicalMax"],
                )
                .on_opt(target.as_ref()),
            );
        }
        if args.configure_reporting {
            descriptor = descriptor.steps([
                ConfigureStep::bind(GEN_ON_OFF).on_opt(target.as_ref()),
                ConfigureStep::bind(GEN_LEVEL_CTRL).on_opt(target.as_ref()),
                ConfigureStep::read(GEN_ON_OFF, ["onOff"]).on_opt(target.as_ref()),
                ConfigureStep::read(GEN_LEVEL_CTRL, ["currentLevel"]).on_opt(target.as_ref()),
                ConfigureStep::report(GEN_ON_OFF, "onOff", None).on_opt(target.as_ref()),
                ConfigureStep::report(GEN_LEVEL_CTRL, "currentLevel", None).on_opt(target.as_ref()),
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
    use serde_json::json;

    #[test]
    fn test_dimmable_light_has_no_steps() {
        let descriptor = light(LightArgs::default());
        let signatures: Vec<String> = descriptor.exposes.iter().map(Feature::signature).collect();
        assert_eq!(signatures, vec!["effect", "light(state,brightness)", "power_on_behavior"]);
        assert!(descriptor.configure.is_empty());
    }

    #[test]
    fn test_color_temp_light() {
        let descriptor = light(LightArgs::default().with_color_temp(153, 500));
        let signatures: Vec<String> = descriptor.exposes.iter().map(Feature::signature).collect();
        assert!(signatures.contains(&"light(state,brightness,color_temp)".to_string()));
        assert_eq!(descriptor.configure.len(), 1);

        let converter = descriptor
            .outbound
            .iter()
            .find(|c| c.handles("color_temp"))
            .unwrap();
        match converter.encode("color_temp", &json!(370)).unwrap() {
            crate::capability::WireRequest::Command { command, payload, .. } => {
                assert_eq!(command, "moveToColorTemp");
                assert_eq!(payload["colortemp"], json!(370));
                assert_eq!(payload["transtime"], json!(0));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_reporting_light_per_endpoint() {
        let descriptor = light(LightArgs {
            endpoint_names: vec!["l1".to_string(), "l2".to_string()],
            ..LightArgs::default()
        }
        .with_reporting());
        assert_eq!(descriptor.configure.len(), 12);
        assert!(descriptor.exposes.iter().any(|f| f.signature() == "light_l2(state,brightness)"));
    }
}
