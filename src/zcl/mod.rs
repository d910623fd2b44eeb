//! Zigbee Cluster Library vocabulary shared by capabilities, the planner and
//! the runtime dispatcher.
//!
//! Clusters and attributes are addressed by their ZCL names (`genOnOff`,
//! `currentLevel`), the same names the coordinator stack uses on the wire.

pub mod reporting;

pub use reporting::{ReportConfig, ReportingDefaults, ReportingInterval, ReportingItem};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cluster names used by the capability library.
pub mod cluster {
    pub const GEN_BASIC: &str = "genBasic";
    pub const GEN_POWER_CFG: &str = "genPowerCfg";
    pub const GEN_IDENTIFY: &str = "genIdentify";
    pub const GEN_ON_OFF: &str = "genOnOff";
    pub const GEN_LEVEL_CTRL: &str = "genLevelCtrl";
    pub const GEN_ANALOG_INPUT: &str = "genAnalogInput";
    pub const GEN_MULTISTATE_INPUT: &str = "genMultistateInput";
    pub const LIGHTING_COLOR_CTRL: &str = "lightingColorCtrl";
    pub const MS_TEMPERATURE_MEASUREMENT: &str = "msTemperatureMeasurement";
    pub const MS_RELATIVE_HUMIDITY: &str = "msRelativeHumidity";
    pub const MS_OCCUPANCY_SENSING: &str = "msOccupancySensing";
    pub const HVAC_THERMOSTAT: &str = "hvacThermostat";
    pub const CLOSURES_WINDOW_COVERING: &str = "closuresWindowCovering";
    pub const HA_ELECTRICAL_MEASUREMENT: &str = "haElectricalMeasurement";
    pub const SE_METERING: &str = "seMetering";
}

/// Manufacturer codes for manufacturer-specific attributes.
pub mod manufacturer {
    pub const UBISYS_TECHNOLOGIES_GMBH: u16 = 0x10f2;
}

/// Kind of an inbound ZCL message.
///
/// Serialized the way the coordinator names them: `attributeReport`,
/// `readResponse`, and `command<Name>` for cluster commands
/// (`commandToggle` is `Command("toggle")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageKind {
    AttributeReport,
    ReadResponse,
    Command(String),
}

impl MessageKind {
    /// Shorthand for `[AttributeReport, ReadResponse]`, the pair attribute
    /// converters listen to.
    pub fn attribute_updates() -> Vec<MessageKind> {
        vec![MessageKind::AttributeReport, MessageKind::ReadResponse]
    }

    pub fn command(name: impl Into<String>) -> Self {
        MessageKind::Command(name.into())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::AttributeReport => write!(f, "attributeReport"),
            MessageKind::ReadResponse => write!(f, "readResponse"),
            MessageKind::Command(name) => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => write!(f, "command{}{}", first.to_ascii_uppercase(), chars.as_str()),
                    None => write!(f, "command"),
                }
            }
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attributeReport" => Ok(MessageKind::AttributeReport),
            "readResponse" => Ok(MessageKind::ReadResponse),
            other => {
                let name = other
                    .strip_prefix("command")
                    .filter(|rest| !rest.is_empty())
                    .ok_or_else(|| format!("unknown message kind '{other}'"))?;
                let mut chars = name.chars();
                let first = chars.next().map(|c| c.to_ascii_lowercase()).unwrap_or_default();
                Ok(MessageKind::Command(format!("{first}{}", chars.as_str())))
            }
        }
    }
}

impl TryFrom<String> for MessageKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_names() {
        assert_eq!(MessageKind::AttributeReport.to_string(), "attributeReport");
        assert_eq!(MessageKind::command("toggle").to_string(), "commandToggle");
        assert_eq!(
            "commandTuyaAction".parse::<MessageKind>().unwrap(),
            MessageKind::command("tuyaAction")
        );
        assert!("command".parse::<MessageKind>().is_err());
        assert!("bogus".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_message_kind_serde() {
        let kind: MessageKind = serde_json::from_str("\"readResponse\"").unwrap();
        assert_eq!(kind, MessageKind::ReadResponse);
        let json = serde_json::to_string(&MessageKind::command("on")).unwrap();
        assert_eq!(json, "\"commandOn\"");
    }
}
