//! Inbound and outbound value converters.
//!
//! Converters are a closed set of tagged variants. Matching is structural
//! (cluster, message kind and, for attribute converters, the presence of one
//! of the mapped attributes), so a descriptor can be validated when it is
//! composed rather than when the first message arrives.

use crate::error::ConvertError;
use crate::radio::RadioCommand;
use crate::zcl::MessageKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value payload: attribute data of a message, or feature updates.
pub type Payload = Map<String, Value>;

/// An inbound ZCL message after frame decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub cluster: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub endpoint: u8,
    #[serde(default)]
    pub data: Payload,
}

impl Message {
    pub fn new(cluster: impl Into<String>, kind: MessageKind, endpoint: u8, data: Payload) -> Self {
        Self {
            cluster: cluster.into(),
            kind,
            endpoint,
            data,
        }
    }
}

/// Per-message context handed to decoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertContext<'a> {
    /// Logical name of the endpoint the message came from, if mapped
    pub endpoint_name: Option<&'a str>,
}

/// Value transform between a raw attribute value and a feature value.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Identity,
    Binary {
        raw_on: Value,
        raw_off: Value,
        value_on: Value,
        value_off: Value,
    },
    Scale {
        multiplier: f64,
        divisor: f64,
        precision: Option<u32>,
    },
    /// Named values for raw integers.
    Lookup(Vec<(String, i64)>),
    /// `value_match` when the raw value equals `raw`, `value_other` for anything else
    Equals {
        raw: Value,
        value_match: Value,
        value_other: Value,
    },
}

impl Transform {
    /// `1`/`0` as `"ON"`/`"OFF"`.
    pub fn on_off() -> Self {
        Self::binary(1, 0, "ON", "OFF")
    }

    pub fn binary(
        raw_on: impl Into<Value>,
        raw_off: impl Into<Value>,
        value_on: impl Into<Value>,
        value_off: impl Into<Value>,
    ) -> Self {
        Transform::Binary {
            raw_on: raw_on.into(),
            raw_off: raw_off.into(),
            value_on: value_on.into(),
            value_off: value_off.into(),
        }
    }

    pub fn equals(raw: impl Into<Value>, value_match: impl Into<Value>, value_other: impl Into<Value>) -> Self {
        Transform::Equals {
            raw: raw.into(),
            value_match: value_match.into(),
            value_other: value_other.into(),
        }
    }

    pub fn divide(divisor: f64) -> Self {
        Transform::Scale {
            multiplier: 1.0,
            divisor,
            precision: None,
        }
    }

    pub fn scale(multiplier: f64, divisor: f64) -> Self {
        Transform::Scale {
            multiplier,
            divisor,
            precision: None,
        }
    }

    pub fn lookup<S: Into<String>>(entries: impl IntoIterator<Item = (S, i64)>) -> Self {
        Transform::Lookup(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Raw attribute value to feature value.
    pub fn decode(&self, raw: &Value) -> Option<Value> {
        match self {
            Transform::Identity => Some(raw.clone()),
            Transform::Binary {
                raw_on,
                raw_off,
                value_on,
                value_off,
            } => {
                if loosely_equal(raw, raw_on) {
                    Some(value_on.clone())
                } else if loosely_equal(raw, raw_off) {
                    Some(value_off.clone())
                } else {
                    None
                }
            }
            Transform::Scale {
                multiplier,
                divisor,
                precision,
            } => {
                let value = as_number(raw)? * multiplier / divisor;
                Some(number_value(round_to(value, *precision)))
            }
            Transform::Lookup(entries) => {
                let raw = as_number(raw)? as i64;
                entries
                    .iter()
                    .find(|(_, v)| *v == raw)
                    .map(|(name, _)| Value::String(name.clone()))
            }
            Transform::Equals {
                raw: expected,
                value_match,
                value_other,
            } => {
                if raw.is_null() {
                    None
                } else if loosely_equal(raw, expected) {
                    Some(value_match.clone())
                } else {
                    Some(value_other.clone())
                }
            }
        }
    }

    /// Feature value to raw attribute value.
    pub fn encode(&self, value: &Value) -> Option<Value> {
        match self {
            Transform::Identity => Some(value.clone()),
            Transform::Binary {
                raw_on,
                raw_off,
                value_on,
                value_off,
            } => {
                if loosely_equal(value, value_on) {
                    Some(raw_on.clone())
                } else if loosely_equal(value, value_off) {
                    Some(raw_off.clone())
                } else {
                    None
                }
            }
            Transform::Scale {
                multiplier,
                divisor,
                ..
            } => {
                let raw = (as_number(value)? * divisor / multiplier).round();
                Some(Value::from(raw as i64))
            }
            Transform::Lookup(entries) => {
                let name = value.as_str()?;
                entries
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| Value::from(*v))
            }
            Transform::Equals { raw, value_match, .. } => {
                loosely_equal(value, value_match).then(|| raw.clone())
            }
        }
    }
}

/// Compare values treating booleans as 0/1 and strings case-insensitively.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn round_to(value: f64, precision: Option<u32>) -> f64 {
    match precision {
        Some(digits) => {
            let factor = 10f64.powi(digits as i32);
            (value * factor).round() / factor
        }
        None => value,
    }
}

/// Integral results stay integers on the wire.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// One attribute of an inbound message mapped onto one feature property.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    pub attribute: String,
    pub property: String,
    pub transform: Transform,
}

impl AttributeMapping {
    pub fn new(attribute: impl Into<String>, property: impl Into<String>, transform: Transform) -> Self {
        Self {
            attribute: attribute.into(),
            property: property.into(),
            transform,
        }
    }
}

/// Where the `action` value of a command converter comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSource {
    /// The command name itself (`toggle`)
    Command,
    Fixed(String),
    /// An attribute of the command payload looked up by value
    Lookup {
        attribute: String,
        lookup: Vec<(String, i64)>,
    },
}

pub type CustomDecode = fn(&Message, &ConvertContext<'_>) -> Option<Payload>;

/// Decoding behaviour of an inbound converter.
#[derive(Debug, Clone)]
pub enum Decode {
    Attributes(Vec<AttributeMapping>),
    Action(ActionSource),
    /// Match and swallow the message
    Ignore,
    Custom(CustomDecode),
}

impl Decode {
    fn same_as(&self, other: &Decode) -> bool {
        match (self, other) {
            (Decode::Attributes(a), Decode::Attributes(b)) => a == b,
            (Decode::Action(a), Decode::Action(b)) => a == b,
            (Decode::Ignore, Decode::Ignore) => true,
            (Decode::Custom(a), Decode::Custom(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }
}

/// Converts matching inbound messages into feature updates.
#[derive(Debug, Clone)]
pub struct InboundConverter {
    pub name: String,
    pub cluster: String,
    pub kinds: Vec<MessageKind>,
    pub decode: Decode,
}

impl InboundConverter {
    /// Attribute converter listening to reports and read responses.
    pub fn attributes(
        name: impl Into<String>,
        cluster: impl Into<String>,
        mappings: Vec<AttributeMapping>,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            kinds: MessageKind::attribute_updates(),
            decode: Decode::Attributes(mappings),
        }
    }

    pub fn action(
        name: impl Into<String>,
        cluster: impl Into<String>,
        kinds: Vec<MessageKind>,
        source: ActionSource,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            kinds,
            decode: Decode::Action(source),
        }
    }

    pub fn ignore(name: impl Into<String>, cluster: impl Into<String>, kinds: Vec<MessageKind>) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            kinds,
            decode: Decode::Ignore,
        }
    }

    pub fn custom(
        name: impl Into<String>,
        cluster: impl Into<String>,
        kinds: Vec<MessageKind>,
        decode: CustomDecode,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            kinds,
            decode: Decode::Custom(decode),
        }
    }

    /// Whether this converter accepts the message.
    pub fn matches(&self, msg: &Message) -> bool {
        if self.cluster != msg.cluster || !self.kinds.contains(&msg.kind) {
            return false;
        }
        match &self.decode {
            Decode::Attributes(mappings) => mappings.iter().any(|m| msg.data.contains_key(&m.attribute)),
            Decode::Action(ActionSource::Lookup { attribute, .. }) => msg.data.contains_key(attribute),
            _ => true,
        }
    }

    /// Decode a message this converter matched.
    pub fn convert(&self, msg: &Message, ctx: &ConvertContext<'_>) -> Option<Payload> {
        match &self.decode {
            Decode::Attributes(mappings) => {
                let mut payload = Payload::new();
                for mapping in mappings {
                    if let Some(raw) = msg.data.get(&mapping.attribute)
                        && let Some(value) = mapping.transform.decode(raw)
                    {
                        payload.insert(mapping.property.clone(), value);
                    }
                }
                (!payload.is_empty()).then_some(payload)
            }
            Decode::Action(source) => {
                let action = match source {
                    ActionSource::Command => match &msg.kind {
                        MessageKind::Command(name) => name.clone(),
                        _ => return None,
                    },
                    ActionSource::Fixed(value) => value.clone(),
                    ActionSource::Lookup { attribute, lookup } => {
                        let raw = msg.data.get(attribute).and_then(as_number)? as i64;
                        lookup.iter().find(|(_, v)| *v == raw)?.0.clone()
                    }
                };
                let mut payload = Payload::new();
                payload.insert("action".to_string(), Value::String(action));
                Some(payload)
            }
            Decode::Ignore => Some(Payload::new()),
            Decode::Custom(decode) => decode(msg, ctx),
        }
    }

    /// Same name, cluster, kinds and decoding.
    pub fn same_as(&self, other: &InboundConverter) -> bool {
        self.name == other.name
            && self.cluster == other.cluster
            && self.kinds == other.kinds
            && self.decode.same_as(&other.decode)
    }

    /// Shape problems that make the converter unusable.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("converter has no name".to_string());
        }
        if self.cluster.is_empty() {
            return Err("no cluster".to_string());
        }
        if self.kinds.is_empty() {
            return Err("no message kinds".to_string());
        }
        if let Decode::Attributes(mappings) = &self.decode
            && mappings.is_empty()
        {
            return Err("no attribute mappings".to_string());
        }
        Ok(())
    }
}

/// Request produced by an outbound converter, before an endpoint is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRequest {
    Write {
        cluster: String,
        attributes: Payload,
        manufacturer_code: Option<u16>,
    },
    Command {
        cluster: String,
        command: String,
        payload: Payload,
    },
}

impl WireRequest {
    /// Address the request to a physical endpoint.
    pub fn at(self, endpoint: u8) -> RadioCommand {
        match self {
            WireRequest::Write {
                cluster,
                attributes,
                manufacturer_code,
            } => RadioCommand::Write {
                endpoint,
                cluster,
                attributes,
                manufacturer_code,
            },
            WireRequest::Command {
                cluster,
                command,
                payload,
            } => RadioCommand::Command {
                endpoint,
                cluster,
                command,
                payload,
            },
        }
    }
}

pub type CustomEncode = fn(&str, &Value) -> Result<WireRequest, ConvertError>;

/// Encoding behaviour of an outbound converter.
#[derive(Debug, Clone)]
pub enum Encode {
    /// Feature can only be read back
    ReadOnly,
    WriteAttribute {
        cluster: String,
        attribute: String,
        transform: Transform,
        manufacturer_code: Option<u16>,
    },
    /// Feature values mapped onto payload-less cluster commands (`ON` -> `on`)
    Command {
        cluster: String,
        commands: Vec<(String, String)>,
    },
    /// One cluster command carrying the transformed value in `field`
    CommandWithValue {
        cluster: String,
        command: String,
        field: String,
        transform: Transform,
        extra: Payload,
    },
    Custom(CustomEncode),
}

/// Attributes read to refresh a feature on request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBack {
    pub cluster: String,
    pub attributes: Vec<String>,
}

/// Converts feature set/get requests into radio requests.
#[derive(Debug, Clone)]
pub struct OutboundConverter {
    pub name: String,
    pub keys: Vec<String>,
    pub encode: Encode,
    pub read_back: Option<ReadBack>,
}

impl OutboundConverter {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        keys: impl IntoIterator<Item = S>,
        encode: Encode,
    ) -> Self {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            encode,
            read_back: None,
        }
    }

    pub fn with_read_back<S: Into<String>>(
        mut self,
        cluster: impl Into<String>,
        attributes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.read_back = Some(ReadBack {
            cluster: cluster.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn handles(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Encode a set request for `key`.
    pub fn encode(&self, key: &str, value: &Value) -> Result<WireRequest, ConvertError> {
        let invalid = || ConvertError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        };
        match &self.encode {
            Encode::ReadOnly => Err(ConvertError::NotWritable {
                key: key.to_string(),
            }),
            Encode::WriteAttribute {
                cluster,
                attribute,
                transform,
                manufacturer_code,
            } => {
                let raw = transform.encode(value).ok_or_else(invalid)?;
                let mut attributes = Payload::new();
                attributes.insert(attribute.clone(), raw);
                Ok(WireRequest::Write {
                    cluster: cluster.clone(),
                    attributes,
                    manufacturer_code: *manufacturer_code,
                })
            }
            Encode::Command { cluster, commands } => {
                let requested = value.as_str().ok_or_else(invalid)?;
                let (_, command) = commands
                    .iter()
                    .find(|(v, _)| v.eq_ignore_ascii_case(requested))
                    .ok_or_else(invalid)?;
                Ok(WireRequest::Command {
                    cluster: cluster.clone(),
                    command: command.clone(),
                    payload: Payload::new(),
                })
            }
            Encode::CommandWithValue {
                cluster,
                command,
                field,
                transform,
                extra,
            } => {
                let raw = transform.encode(value).ok_or_else(invalid)?;
                let mut payload = extra.clone();
                payload.insert(field.clone(), raw);
                Ok(WireRequest::Command {
                    cluster: cluster.clone(),
                    command: command.clone(),
                    payload,
                })
            }
            Encode::Custom(encode) => encode(key, value),
        }
    }

    /// Read-back request for `key`.
    pub fn read(&self, key: &str) -> Result<&ReadBack, ConvertError> {
        self.read_back.as_ref().ok_or_else(|| ConvertError::NotReadable {
            key: key.to_string(),
        })
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("converter has no name".to_string());
        }
        if self.keys.is_empty() || self.keys.iter().any(|k| k.is_empty()) {
            return Err("empty feature key".to_string());
        }
        if let Some(read_back) = &self.read_back
            && read_back.attributes.is_empty()
        {
            return Err("read-back without attributes".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(cluster: &str, data: Value) -> Message {
        let data = data.as_object().cloned().unwrap_or_default();
        Message::new(cluster, MessageKind::AttributeReport, 1, data)
    }

    #[test]
    fn test_binary_transform() {
        let transform = Transform::on_off();
        assert_eq!(transform.decode(&json!(1)), Some(json!("ON")));
        assert_eq!(transform.decode(&json!(true)), Some(json!("ON")));
        assert_eq!(transform.decode(&json!(0)), Some(json!("OFF")));
        assert_eq!(transform.decode(&json!(7)), None);
        assert_eq!(transform.encode(&json!("off")), Some(json!(0)));
    }

    #[test]
    fn test_scale_transform() {
        let transform = Transform::divide(100.0);
        assert_eq!(transform.decode(&json!(2150)), Some(json!(21.5)));
        assert_eq!(transform.decode(&json!(2100)), Some(json!(21)));
        assert_eq!(transform.encode(&json!(21.5)), Some(json!(2150)));
        assert_eq!(transform.decode(&json!("x")), None);
    }

    #[test]
    fn test_equals_transform() {
        let transform = Transform::equals(0, true, false);
        assert_eq!(transform.decode(&json!(0)), Some(json!(true)));
        assert_eq!(transform.decode(&json!(1)), Some(json!(false)));
        assert_eq!(transform.decode(&json!(3)), Some(json!(false)));
        assert_eq!(transform.decode(&Value::Null), None);
        assert_eq!(transform.encode(&json!(true)), Some(json!(0)));
        assert_eq!(transform.encode(&json!(false)), None);
    }

    #[test]
    fn test_lookup_transform() {
        let transform = Transform::lookup([("off", 0), ("heat", 4)]);
        assert_eq!(transform.decode(&json!(4)), Some(json!("heat")));
        assert_eq!(transform.encode(&json!("HEAT")), Some(json!(4)));
        assert_eq!(transform.encode(&json!("cool")), None);
    }

    #[test]
    fn test_attribute_converter_requires_mapped_attribute() {
        let converter = InboundConverter::attributes(
            "temperature",
            "msTemperatureMeasurement",
            vec![AttributeMapping::new("measuredValue", "temperature", Transform::divide(100.0))],
        );

        let msg = report("msTemperatureMeasurement", json!({"measuredValue": 2150}));
        assert!(converter.matches(&msg));
        let payload = converter.convert(&msg, &ConvertContext::default()).unwrap();
        assert_eq!(payload["temperature"], json!(21.5));

        let other = report("msTemperatureMeasurement", json!({"tolerance": 10}));
        assert!(!converter.matches(&other));
        let wrong_cluster = report("msRelativeHumidity", json!({"measuredValue": 2150}));
        assert!(!converter.matches(&wrong_cluster));
    }

    #[test]
    fn test_action_converter() {
        let converter = InboundConverter::action(
            "command_toggle",
            "genOnOff",
            vec![MessageKind::command("toggle")],
            ActionSource::Command,
        );
        let msg = Message::new("genOnOff", MessageKind::command("toggle"), 1, Payload::new());
        let payload = converter.convert(&msg, &ConvertContext::default()).unwrap();
        assert_eq!(payload["action"], json!("toggle"));

        let lookup = InboundConverter::action(
            "action_lookup",
            "genOnOff",
            vec![MessageKind::command("tuyaAction")],
            ActionSource::Lookup {
                attribute: "value".to_string(),
                lookup: vec![("single".to_string(), 0), ("double".to_string(), 1)],
            },
        );
        let mut data = Payload::new();
        data.insert("value".to_string(), json!(1));
        let msg = Message::new("genOnOff", MessageKind::command("tuyaAction"), 1, data);
        assert!(lookup.matches(&msg));
        assert_eq!(
            lookup.convert(&msg, &ConvertContext::default()).unwrap()["action"],
            json!("double")
        );
    }

    #[test]
    fn test_command_encoding() {
        let converter = OutboundConverter::new(
            "on_off",
            ["state"],
            Encode::Command {
                cluster: "genOnOff".to_string(),
                commands: vec![
                    ("ON".to_string(), "on".to_string()),
                    ("OFF".to_string(), "off".to_string()),
                ],
            },
        );
        let request = converter.encode("state", &json!("on")).unwrap();
        assert_eq!(
            request.at(2),
            RadioCommand::Command {
                endpoint: 2,
                cluster: "genOnOff".to_string(),
                command: "on".to_string(),
                payload: Payload::new(),
            }
        );
        assert!(matches!(
            converter.encode("state", &json!("blink")),
            Err(ConvertError::InvalidValue { .. })
        ));
        assert!(matches!(converter.read("state"), Err(ConvertError::NotReadable { .. })));
    }

    #[test]
    fn test_write_attribute_with_manufacturer_code() {
        let converter = OutboundConverter::new(
            "vacation_mode",
            ["vacation_mode"],
            Encode::WriteAttribute {
                cluster: "hvacThermostat".to_string(),
                attribute: "ubisysVacationMode".to_string(),
                transform: Transform::binary(1, 0, true, false),
                manufacturer_code: Some(0x10f2),
            },
        );
        match converter.encode("vacation_mode", &json!(true)).unwrap() {
            WireRequest::Write {
                attributes,
                manufacturer_code,
                ..
            } => {
                assert_eq!(attributes["ubisysVacationMode"], json!(1));
                assert_eq!(manufacturer_code, Some(0x10f2));
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert!(converter.encode("vacation_mode", &json!("maybe")).is_err());
    }

    #[test]
    fn test_same_as_compares_structure() {
        let temperature = InboundConverter::attributes(
            "measurement",
            "msTemperatureMeasurement",
            vec![AttributeMapping::new("measuredValue", "temperature", Transform::divide(100.0))],
        );
        assert!(temperature.same_as(&temperature.clone()));

        let humidity = InboundConverter::attributes(
            "measurement",
            "msRelativeHumidity",
            vec![AttributeMapping::new("measuredValue", "humidity", Transform::divide(100.0))],
        );
        assert!(!temperature.same_as(&humidity));

        let mut rescaled = temperature.clone();
        rescaled.decode = Decode::Attributes(vec![AttributeMapping::new(
            "measuredValue",
            "temperature",
            Transform::divide(10.0),
        )]);
        assert!(!temperature.same_as(&rescaled));
    }

    #[test]
    fn test_validation() {
        let empty = InboundConverter::attributes("bad", "genOnOff", vec![]);
        assert!(empty.validate().is_err());
        let keyless = OutboundConverter::new("bad", Vec::<String>::new(), Encode::ReadOnly);
        assert!(keyless.validate().is_err());
    }
}
