use super::{endpoint_names, qualify, target_of};
use crate::capability::{
    Access, AttributeMapping, CapabilityDescriptor, ConfigureStep, Encode, Feature, InboundConverter,
    OutboundConverter, Transform, reporting_steps,
};
use crate::endpoint::EndpointTarget;
use crate::zcl::cluster::{CLOSURES_WINDOW_COVERING, HVAC_THERMOSTAT};
use crate::zcl::manufacturer::UBISYS_TECHNOLOGIES_GMBH;
use crate::zcl::{ReportConfig, ReportingInterval};

/// Arguments of [`thermostat`].
#[derive(Debug, Clone)]
pub struct ThermostatArgs {
    pub endpoint: Option<EndpointTarget>,
    /// Heating setpoint range and step in °C
    pub setpoint_range: (f64, f64, f64),
    pub system_modes: Vec<(String, i64)>,
    pub pi_heating_demand: bool,
}

impl Default for ThermostatArgs {
    fn default() -> Self {
        Self {
            endpoint: None,
            setpoint_range: (7.0, 30.0, 0.5),
            system_modes: vec![("off".to_string(), 0), ("auto".to_string(), 1), ("heat".to_string(), 4)],
            pi_heating_demand: true,
        }
    }
}

fn setpoint_transform() -> Transform {
    Transform::Scale {
        multiplier: 1.0,
        divisor: 100.0,
        precision: Some(2),
    }
}

/// Heating thermostat: local temperature, heating setpoint and system mode.
pub fn thermostat(args: ThermostatArgs) -> CapabilityDescriptor {
    let (min, max, step) = args.setpoint_range;
    let modes = Transform::Lookup(args.system_modes.clone());
    let mode_names: Vec<&str> = args.system_modes.iter().map(|(k, _)| k.as_str()).collect();

    let mut members = vec![
        Feature::numeric("local_temperature", Access::StateGet)
            .with_unit("°C")
            .with_description("Current temperature measured on the device"),
        Feature::numeric("occupied_heating_setpoint", Access::All)
            .with_range(min, max, Some(step))
            .with_unit("°C")
            .with_description("Temperature setpoint"),
        Feature::enumeration("system_mode", Access::All, mode_names).with_description("Mode of this device"),
    ];
    let mut mappings = vec![
        AttributeMapping::new("localTemperature", "local_temperature", setpoint_transform()),
        AttributeMapping::new("occupiedHeatingSetpoint", "occupied_heating_setpoint", setpoint_transform()),
        AttributeMapping::new("systemMode", "system_mode", modes.clone()),
    ];
    let mut reported = vec!["localTemperature", "occupiedHeatingSetpoint", "systemMode"];
    if args.pi_heating_demand {
        members.push(
            Feature::numeric("pi_heating_demand", Access::StateGet)
                .with_range(0.0, 100.0, None)
                .with_unit("%")
                .with_description("Position of the valve (= demanded heat) where 0% is fully closed and 100% is fully open"),
        );
        mappings.push(AttributeMapping::new("pIHeatingDemand", "pi_heating_demand", Transform::Identity));
        reported.push("pIHeatingDemand");
    }

    let mut descriptor = CapabilityDescriptor::new("thermostat")
        .expose(Feature::composite("climate", members))
        .inbound(InboundConverter::attributes("thermostat", HVAC_THERMOSTAT, mappings))
        .outbound(
            OutboundConverter::new(
                "occupied_heating_setpoint",
                ["occupied_heating_setpoint"],
                Encode::WriteAttribute {
                    cluster: HVAC_THERMOSTAT.to_string(),
                    attribute: "occupiedHeatingSetpoint".to_string(),
                    transform: setpoint_transform(),
                    manufacturer_code: None,
                },
            )
            .with_read_back(HVAC_THERMOSTAT, ["occupiedHeatingSetpoint"]),
        )
        .outbound(
            OutboundConverter::new(
                "system_mode",
                ["system_mode"],
                Encode::WriteAttribute {
                    cluster: HVAC_THERMOSTAT.to_string(),
                    attribute: "systemMode".to_string(),
                    transform: modes,
                    manufacturer_code: None,
                },
            )
            .with_read_back(HVAC_THERMOSTAT, ["systemMode"]),
        )
        .outbound(
            OutboundConverter::new("local_temperature", ["local_temperature", "pi_heating_demand"], Encode::ReadOnly)
                .with_read_back(HVAC_THERMOSTAT, ["localTemperature", "pIHeatingDemand"]),
        );

    let target = args.endpoint.as_ref();
    descriptor = descriptor.step(ConfigureStep::bind(HVAC_THERMOSTAT).on_opt(target));
    for attribute in &reported {
        descriptor = descriptor.step(ConfigureStep::report(HVAC_THERMOSTAT, *attribute, None).on_opt(target));
    }
    descriptor.step(ConfigureStep::read(HVAC_THERMOSTAT, reported).on_opt(target))
}

/// Ubisys H1 vacation mode.
///
/// Written through a manufacturer-specific attribute, read back through
/// `occupancy` (0 while on vacation, any other value otherwise).
pub fn vacation_mode() -> CapabilityDescriptor {
    let access = Access::All;
    CapabilityDescriptor::new("vacation_mode")
        .expose(Feature::binary("vacation_mode", access, true, false).with_description(
            "When Vacation Mode is active the schedule is disabled and unoccupied_heating_setpoint is used.",
        ))
        .inbound(InboundConverter::attributes(
            "vacation_mode",
            HVAC_THERMOSTAT,
            vec![AttributeMapping::new(
                "occupancy",
                "vacation_mode",
                Transform::equals(0, true, false),
            )],
        ))
        .outbound(
            OutboundConverter::new(
                "vacation_mode",
                ["vacation_mode"],
                Encode::WriteAttribute {
                    cluster: HVAC_THERMOSTAT.to_string(),
                    attribute: "ubisysVacationMode".to_string(),
                    transform: Transform::binary(1, 0, true, false),
                    manufacturer_code: Some(UBISYS_TECHNOLOGIES_GMBH),
                },
            )
            .with_read_back(HVAC_THERMOSTAT, ["occupancy"]),
        )
        .steps(reporting_steps(
            None,
            HVAC_THERMOSTAT,
            "occupancy",
            Some(ReportConfig::new(ReportingInterval::Min, ReportingInterval::OneHour, 0)),
            access,
        ))
}

/// Arguments of [`window_covering`].
#[derive(Debug, Clone, Default)]
pub struct CoverArgs {
    pub endpoint_names: Vec<String>,
    pub tilt: bool,
}

/// Cover with lift (and optionally tilt) position in percent.
pub fn window_covering(args: CoverArgs) -> CapabilityDescriptor {
    let mut mappings = vec![AttributeMapping::new(
        "currentPositionLiftPercentage",
        "position",
        Transform::Identity,
    )];
    if args.tilt {
        mappings.push(AttributeMapping::new(
            "currentPositionTiltPercentage",
            "tilt",
            Transform::Identity,
        ));
    }

    let mut descriptor = CapabilityDescriptor::new("window_covering")
        .inbound(InboundConverter::attributes("cover_position_tilt", CLOSURES_WINDOW_COVERING, mappings))
        .outbound(OutboundConverter::new(
            "cover_state",
            ["state"],
            Encode::Command {
                cluster: CLOSURES_WINDOW_COVERING.to_string(),
                commands: vec![
                    ("OPEN".to_string(), "upOpen".to_string()),
                    ("CLOSE".to_string(), "downClose".to_string()),
                    ("STOP".to_string(), "stop".to_string()),
                ],
            },
        ))
        .outbound(
            OutboundConverter::new(
                "cover_position",
                ["position"],
                Encode::CommandWithValue {
                    cluster: CLOSURES_WINDOW_COVERING.to_string(),
                    command: "goToLiftPercentage".to_string(),
                    field: "percentageliftvalue".to_string(),
                    transform: Transform::Identity,
                    extra: Default::default(),
                },
            )
            .with_read_back(CLOSURES_WINDOW_COVERING, ["currentPositionLiftPercentage"]),
        );
    if args.tilt {
        descriptor = descriptor.outbound(
            OutboundConverter::new(
                "cover_tilt",
                ["tilt"],
                Encode::CommandWithValue {
                    cluster: CLOSURES_WINDOW_COVERING.to_string(),
                    command: "goToTiltPercentage".to_string(),
                    field: "percentagetiltvalue".to_string(),
                    transform: Transform::Identity,
                    extra: Default::default(),
                },
            )
            .with_read_back(CLOSURES_WINDOW_COVERING, ["currentPositionTiltPercentage"]),
        );
    }

    for name in endpoint_names(&args.endpoint_names) {
        let mut members = vec![
            Feature::enumeration("state", Access::Set, ["OPEN", "CLOSE", "STOP"]),
            Feature::numeric("position", Access::All)
                .with_range(0.0, 100.0, None)
                .with_unit("%")
                .with_description("Position of this cover"),
        ];
        if args.tilt {
            members.push(
                Feature::numeric("tilt", Access::All)
                    .with_range(0.0, 100.0, None)
                    .with_unit("%")
                    .with_description("Tilt of this cover"),
            );
        }
        descriptor = descriptor.expose(qualify(Feature::composite("cover", members), name));

        let target = target_of(name);
        descriptor = descriptor.steps([
            ConfigureStep::bind(CLOSURES_WINDOW_COVERING).on_opt(target.as_ref()),
            ConfigureStep::report(CLOSURES_WINDOW_COVERING, "currentPositionLiftPercentage", None).on_opt(target.as_ref()),
        ]);
        if args.tilt {
            descriptor = descriptor.step(
                ConfigureStep::report(CLOSURES_WINDOW_COVERING, "currentPositionTiltPercentage", None)
                    .on_opt(target.as_ref()),
            );
        }
    }
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ConvertContext, Message, Payload, StepKind, WireRequest};
    use crate::zcl::MessageKind;
    use serde_json::json;

    #[test]
    fn test_thermostat_setpoint_roundtrip() {
        let descriptor = thermostat(ThermostatArgs::default());
        assert_eq!(
            descriptor.exposes[0].signature(),
            "climate(local_temperature,occupied_heating_setpoint,system_mode,pi_heating_demand)"
        );

        let converter = descriptor
            .outbound
            .iter()
            .find(|c| c.handles("occupied_heating_setpoint"))
            .unwrap();
        match converter.encode("occupied_heating_setpoint", &json!(21.5)).unwrap() {
            WireRequest::Write { attributes, .. } => {
                assert_eq!(attributes["occupiedHeatingSetpoint"], json!(2150));
            }
            other => panic!("unexpected request {other:?}"),
        }

        let mut data = Payload::new();
        data.insert("systemMode".to_string(), json!(4));
        data.insert("localTemperature".to_string(), json!(1985));
        let msg = Message::new(HVAC_THERMOSTAT, MessageKind::ReadResponse, 1, data);
        let payload = descriptor.inbound[0].convert(&msg, &ConvertContext::default()).unwrap();
        assert_eq!(payload["system_mode"], json!("heat"));
        assert_eq!(payload["local_temperature"], json!(19.85));
    }

    #[test]
    fn test_vacation_mode() {
        let descriptor = vacation_mode();
        let mut data = Payload::new();
        data.insert("occupancy".to_string(), json!(0));
        let msg = Message::new(HVAC_THERMOSTAT, MessageKind::AttributeReport, 1, data);
        let payload = descriptor.inbound[0].convert(&msg, &ConvertContext::default()).unwrap();
        assert_eq!(payload["vacation_mode"], json!(true));

        for occupancy in [1, 2, 255] {
            let mut data = Payload::new();
            data.insert("occupancy".to_string(), json!(occupancy));
            let msg = Message::new(HVAC_THERMOSTAT, MessageKind::AttributeReport, 1, data);
            let payload = descriptor.inbound[0].convert(&msg, &ConvertContext::default()).unwrap();
            assert_eq!(payload["vacation_mode"], json!(false));
        }

        match descriptor.outbound[0].encode("vacation_mode", &json!(true)).unwrap() {
            WireRequest::Write {
                attributes,
                manufacturer_code,
                ..
            } => {
                assert_eq!(attributes["ubisysVacationMode"], json!(1));
                assert_eq!(manufacturer_code, Some(UBISYS_TECHNOLOGIES_GMBH));
            }
            other => panic!("unexpected request {other:?}"),
        }

        let kinds: Vec<StepKind> = descriptor.configure.iter().map(ConfigureStep::kind).collect();
        assert_eq!(kinds, vec![StepKind::Bind, StepKind::ConfigureReporting, StepKind::Read]);
    }

    #[test]
    fn test_cover_with_tilt() {
        let descriptor = window_covering(CoverArgs {
            tilt: true,
            ..CoverArgs::default()
        });
        assert_eq!(descriptor.exposes[0].signature(), "cover(state,position,tilt)");
        assert_eq!(descriptor.outbound.len(), 3);
        assert_eq!(descriptor.configure.len(), 3);
    }
}
