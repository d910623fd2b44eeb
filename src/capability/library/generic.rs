//! Single-attribute capabilities: one attribute, one feature.

use super::{endpoint_names, qualify, target_of};
use crate::capability::{
    Access, ActionSource, AttributeMapping, CapabilityDescriptor, Category, Encode, Feature, InboundConverter,
    OutboundConverter, Payload, Transform, WireRequest, reporting_steps,
};
use crate::error::ConvertError;
use crate::zcl::cluster::GEN_IDENTIFY;
use crate::zcl::{MessageKind, ReportConfig};
use serde_json::Value;

/// Parts shared by every single-attribute capability.
struct AttributeCapability<'a> {
    name: &'a str,
    cluster: &'a str,
    attribute: &'a str,
    transform: Transform,
    access: Access,
    reporting: Option<ReportConfig>,
    endpoint_names: &'a [String],
    manufacturer_code: Option<u16>,
}

impl AttributeCapability<'_> {
    fn build(self, feature: Feature) -> CapabilityDescriptor {
        let mut descriptor = CapabilityDescriptor::new(self.name);

        if self.access.is_readable() {
            descriptor = descriptor.inbound(InboundConverter::attributes(
                self.name,
                self.cluster,
                vec![AttributeMapping::new(self.attribute, self.name, self.transform.clone())],
            ));
        }

        if self.access.is_writable() || self.access.is_gettable() {
            let encode = if self.access.is_writable() {
                Encode::WriteAttribute {
                    cluster: self.cluster.to_string(),
                    attribute: self.attribute.to_string(),
                    transform: self.transform.clone(),
                    manufacturer_code: self.manufacturer_code,
                }
            } else {
                Encode::ReadOnly
            };
            let mut converter = OutboundConverter::new(self.name, [self.name], encode);
            if self.access.is_gettable() {
                converter = converter.with_read_back(self.cluster, [self.attribute]);
            }
            descriptor = descriptor.outbound(converter);
        }

        for name in endpoint_names(self.endpoint_names) {
            descriptor = descriptor.expose(qualify(feature.clone(), name));
            let target = target_of(name);
            descriptor = descriptor.steps(reporting_steps(
                target.as_ref(),
                self.cluster,
                self.attribute,
                self.reporting,
                self.access,
            ));
        }
        descriptor
    }
}

fn decorate(mut feature: Feature, description: &Option<String>, category: Option<Category>) -> Feature {
    if let Some(description) = description {
        feature = feature.with_description(description.clone());
    }
    if let Some(category) = category {
        feature = feature.with_category(category);
    }
    feature
}

/// Arguments of [`binary`]. Values are `(exposed, raw)` pairs.
#[derive(Debug, Clone)]
pub struct BinaryArgs {
    pub name: String,
    pub cluster: String,
    pub attribute: String,
    pub value_on: (Value, Value),
    pub value_off: (Value, Value),
    pub access: Access,
    pub reporting: Option<ReportConfig>,
    pub endpoint_names: Vec<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub manufacturer_code: Option<u16>,
}

impl BinaryArgs {
    pub fn new(name: &str, cluster: &str, attribute: &str) -> Self {
        Self {
            name: name.to_string(),
            cluster: cluster.to_string(),
            attribute: attribute.to_string(),
            value_on: (Value::from("ON"), Value::from(1)),
            value_off: (Value::from("OFF"), Value::from(0)),
            access: Access::All,
            reporting: None,
            endpoint_names: Vec::new(),
            description: None,
            category: None,
            manufacturer_code: None,
        }
    }
}

pub fn binary(args: BinaryArgs) -> CapabilityDescriptor {
    let feature = decorate(
        Feature::binary(&args.name, args.access, args.value_on.0.clone(), args.value_off.0.clone()),
        &args.description,
        args.category,
    );
    AttributeCapability {
        name: &args.name,
        cluster: &args.cluster,
        attribute: &args.attribute,
        transform: Transform::binary(
            args.value_on.1.clone(),
            args.value_off.1.clone(),
            args.value_on.0.clone(),
            args.value_off.0.clone(),
        ),
        access: args.access,
        reporting: args.reporting,
        endpoint_names: &args.endpoint_names,
        manufacturer_code: args.manufacturer_code,
    }
    .build(feature)
}

/// Arguments of [`numeric`]. Raw values are scaled by `multiplier / divisor`.
#[derive(Debug, Clone)]
pub struct NumericArgs {
    pub name: String,
    pub cluster: String,
    pub attribute: String,
    pub access: Access,
    pub multiplier: f64,
    pub divisor: f64,
    pub precision: Option<u32>,
    pub unit: Option<String>,
    pub range: Option<(f64, f64)>,
    pub step: Option<f64>,
    pub reporting: Option<ReportConfig>,
    pub endpoint_names: Vec<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub manufacturer_code: Option<u16>,
}

impl NumericArgs {
    pub fn new(name: &str, cluster: &str, attribute: &str) -> Self {
        Self {
            name: name.to_string(),
            cluster: cluster.to_string(),
            attribute: attribute.to_string(),
            access: Access::All,
            multiplier: 1.0,
            divisor: 1.0,
            precision: None,
            unit: None,
            range: None,
            step: None,
            reporting: None,
            endpoint_names: Vec::new(),
            description: None,
            category: None,
            manufacturer_code: None,
        }
    }
}

pub fn numeric(args: NumericArgs) -> CapabilityDescriptor {
    let mut feature = Feature::numeric(&args.name, args.access);
    if let Some((min, max)) = args.range {
        feature = feature.with_range(min, max, args.step);
    }
    if let Some(unit) = &args.unit {
        feature = feature.with_unit(unit.clone());
    }
    let feature = decorate(feature, &args.description, args.category);

    AttributeCapability {
        name: &args.name,
        cluster: &args.cluster,
        attribute: &args.attribute,
        transform: Transform::Scale {
            multiplier: args.multiplier,
            divisor: args.divisor,
            precision: args.precision,
        },
        access: args.access,
        reporting: args.reporting,
        endpoint_names: &args.endpoint_names,
        manufacturer_code: args.manufacturer_code,
    }
    .build(feature)
}

/// Arguments of [`enum_lookup`].
#[derive(Debug, Clone)]
pub struct EnumLookupArgs {
    pub name: String,
    pub cluster: String,
    pub attribute: String,
    pub lookup: Vec<(String, i64)>,
    pub access: Access,
    pub reporting: Option<ReportConfig>,
    pub endpoint_names: Vec<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub manufacturer_code: Option<u16>,
}

impl EnumLookupArgs {
    pub fn new<S: Into<String>>(
        name: &str,
        cluster: &str,
        attribute: &str,
        lookup: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        Self {
            name: name.to_string(),
            cluster: cluster.to_string(),
            attribute: attribute.to_string(),
            lookup: lookup.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            access: Access::All,
            reporting: None,
            endpoint_names: Vec::new(),
            description: None,
            category: None,
            manufacturer_code: None,
        }
    }
}

pub fn enum_lookup(args: EnumLookupArgs) -> CapabilityDescriptor {
    let values: Vec<&str> = args.lookup.iter().map(|(k, _)| k.as_str()).collect();
    let feature = decorate(
        Feature::enumeration(&args.name, args.access, values),
        &args.description,
        args.category,
    );
    AttributeCapability {
        name: &args.name,
        cluster: &args.cluster,
        attribute: &args.attribute,
        transform: Transform::Lookup(args.lookup.clone()),
        access: args.access,
        reporting: args.reporting,
        endpoint_names: &args.endpoint_names,
        manufacturer_code: args.manufacturer_code,
    }
    .build(feature)
}

/// Arguments of [`action_enum_lookup`]: a command whose payload attribute
/// names the action.
#[derive(Debug, Clone)]
pub struct ActionArgs {
    pub cluster: String,
    pub commands: Vec<String>,
    pub attribute: String,
    pub actions: Vec<(String, i64)>,
}

impl ActionArgs {
    pub fn new<S: Into<String>>(
        cluster: &str,
        command: &str,
        attribute: &str,
        actions: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        Self {
            cluster: cluster.to_string(),
            commands: vec![command.to_string()],
            attribute: attribute.to_string(),
            actions: actions.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// `action` events decoded from cluster commands.
pub fn action_enum_lookup(args: ActionArgs) -> CapabilityDescriptor {
    let values: Vec<&str> = args.actions.iter().map(|(k, _)| k.as_str()).collect();
    CapabilityDescriptor::new("action")
        .expose(Feature::enumeration("action", Access::State, values).with_description("Triggered action"))
        .inbound(InboundConverter::action(
            format!("action_{}", args.attribute),
            &args.cluster,
            args.commands.iter().map(MessageKind::command).collect(),
            ActionSource::Lookup {
                attribute: args.attribute.clone(),
                lookup: args.actions.clone(),
            },
        ))
}

fn encode_identify(key: &str, value: &Value) -> Result<WireRequest, ConvertError> {
    let seconds = match value {
        Value::String(s) if s == "identify" => 3,
        Value::Number(n) => n.as_u64().ok_or_else(|| ConvertError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        })?,
        _ => {
            return Err(ConvertError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            });
        }
    };
    let mut payload = Payload::new();
    payload.insert("identifytime".to_string(), Value::from(seconds));
    Ok(WireRequest::Command {
        cluster: GEN_IDENTIFY.to_string(),
        command: "identify".to_string(),
        payload,
    })
}

/// Make the device blink or beep for a few seconds.
pub fn identify() -> CapabilityDescriptor {
    CapabilityDescriptor::new("identify")
        .expose(
            Feature::enumeration("identify", Access::Set, ["identify"])
                .with_category(Category::Config)
                .with_description("Initiate device identification"),
        )
        .outbound(OutboundConverter::new("identify", ["identify"], Encode::Custom(encode_identify)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ConfigureStep, ConvertContext, Message, StepKind};
    use serde_json::json;

    #[test]
    fn test_binary_with_manufacturer_code() {
        let descriptor = binary(BinaryArgs {
            value_on: (json!(true), json!(1)),
            value_off: (json!(false), json!(0)),
            category: Some(Category::Config),
            manufacturer_code: Some(0x10f2),
            ..BinaryArgs::new("open_window_detect", "hvacThermostat", "ubisysDetectOpenWindow")
        });
        assert_eq!(descriptor.exposes[0].category, Some(Category::Config));
        match descriptor.outbound[0].encode("open_window_detect", &json!(false)).unwrap() {
            WireRequest::Write {
                attributes,
                manufacturer_code,
                ..
            } => {
                assert_eq!(attributes["ubisysDetectOpenWindow"], json!(0));
                assert_eq!(manufacturer_code, Some(0x10f2));
            }
            other => panic!("unexpected request {other:?}"),
        }
        // no reporting config and gettable: a single read
        let kinds: Vec<StepKind> = descriptor.configure.iter().map(ConfigureStep::kind).collect();
        assert_eq!(kinds, vec![StepKind::Read]);
    }

    #[test]
    fn test_state_only_numeric_has_no_outbound() {
        let descriptor = numeric(NumericArgs {
            access: Access::State,
            ..NumericArgs::new("co2", "msCO2", "measuredValue")
        });
        assert!(descriptor.outbound.is_empty());
        assert!(descriptor.configure.is_empty());
        assert_eq!(descriptor.inbound.len(), 1);
    }

    #[test]
    fn test_enum_lookup_per_endpoint() {
        let descriptor = enum_lookup(EnumLookupArgs {
            endpoint_names: vec!["l1".to_string(), "l2".to_string()],
            reporting: Some(ReportConfig::new(0u16, 3600u16, 0)),
            ..EnumLookupArgs::new(
                "indicator_mode",
                "genOnOff",
                "moesStartUpOnOff",
                [("off", 0), ("on", 1), ("previous", 2)],
            )
        });
        assert_eq!(descriptor.exposes.len(), 2);
        assert_eq!(descriptor.exposes[1].property(), "indicator_mode_l2");
        assert_eq!(descriptor.configure.len(), 6);
    }

    #[test]
    fn test_action_lookup() {
        let descriptor = action_enum_lookup(ActionArgs::new(
            "genOnOff",
            "tuyaAction",
            "value",
            [("single", 0), ("double", 1), ("hold", 2)],
        ));
        let mut data = Payload::new();
        data.insert("value".to_string(), json!(2));
        let msg = Message::new("genOnOff", MessageKind::command("tuyaAction"), 1, data);
        let converter = &descriptor.inbound[0];
        assert!(converter.matches(&msg));
        assert_eq!(
            converter.convert(&msg, &ConvertContext::default()).unwrap()["action"],
            json!("hold")
        );
    }

    #[test]
    fn test_identify_encoding() {
        let descriptor = identify();
        let request = descriptor.outbound[0].encode("identify", &json!("identify")).unwrap();
        match request {
            WireRequest::Command { command, payload, .. } => {
                assert_eq!(command, "identify");
                assert_eq!(payload["identifytime"], json!(3));
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert!(descriptor.outbound[0].encode("identify", &json!("x")).is_err());
    }
}
