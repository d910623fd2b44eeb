use super::generic::{BinaryArgs, NumericArgs, binary, numeric};
use crate::capability::{Access, CapabilityDescriptor, Category};
use crate::zcl::cluster::{GEN_POWER_CFG, MS_OCCUPANCY_SENSING, MS_RELATIVE_HUMIDITY, MS_TEMPERATURE_MEASUREMENT};
use crate::zcl::{ReportConfig, ReportingInterval};
use serde_json::json;

/// Arguments of [`battery`].
#[derive(Debug, Clone)]
pub struct BatteryArgs {
    pub percentage: bool,
    pub voltage: bool,
}

impl Default for BatteryArgs {
    fn default() -> Self {
        Self {
            percentage: true,
            voltage: false,
        }
    }
}

/// Battery percentage and voltage from `genPowerCfg`.
pub fn battery(args: BatteryArgs) -> CapabilityDescriptor {
    let report = ReportConfig::new(ReportingInterval::OneHour, ReportingInterval::Max, 0);
    let mut parts = Vec::new();
    if args.percentage {
        parts.push(numeric(NumericArgs {
            unit: Some("%".to_string()),
            divisor: 2.0,
            range: Some((0.0, 100.0)),
            access: Access::StateGet,
            reporting: Some(report),
            category: Some(Category::Diagnostic),
            description: Some("Remaining battery in %".to_string()),
            ..NumericArgs::new("battery", GEN_POWER_CFG, "batteryPercentageRemaining")
        }));
    }
    if args.voltage {
        parts.push(numeric(NumericArgs {
            unit: Some("mV".to_string()),
            multiplier: 100.0,
            access: Access::StateGet,
            reporting: Some(report),
            category: Some(Category::Diagnostic),
            description: Some("Voltage of the battery in millivolts".to_string()),
            ..NumericArgs::new("voltage", GEN_POWER_CFG, "batteryVoltage")
        }));
    }
    merge("battery", parts)
}

pub fn temperature() -> CapabilityDescriptor {
    numeric(NumericArgs {
        unit: Some("°C".to_string()),
        divisor: 100.0,
        precision: Some(2),
        access: Access::StateGet,
        reporting: Some(ReportConfig::new(10u16, ReportingInterval::OneHour, 100)),
        description: Some("Measured temperature value".to_string()),
        ..NumericArgs::new("temperature", MS_TEMPERATURE_MEASUREMENT, "measuredValue")
    })
}

pub fn humidity() -> CapabilityDescriptor {
    numeric(NumericArgs {
        unit: Some("%".to_string()),
        divisor: 100.0,
        precision: Some(2),
        access: Access::StateGet,
        reporting: Some(ReportConfig::new(10u16, ReportingInterval::OneHour, 100)),
        description: Some("Measured relative humidity".to_string()),
        ..NumericArgs::new("humidity", MS_RELATIVE_HUMIDITY, "measuredValue")
    })
}

pub fn occupancy() -> CapabilityDescriptor {
    binary(BinaryArgs {
        value_on: (json!(true), json!(1)),
        value_off: (json!(false), json!(0)),
        access: Access::StateGet,
        reporting: Some(ReportConfig::new(ReportingInterval::Min, ReportingInterval::OneHour, 0)),
        description: Some("Indicates whether the device detected occupancy".to_string()),
        ..BinaryArgs::new("occupancy", MS_OCCUPANCY_SENSING, "occupancy")
    })
}

/// Fold several single-attribute descriptors into one capability.
fn merge(name: &str, parts: Vec<CapabilityDescriptor>) -> CapabilityDescriptor {
    parts
        .into_iter()
        .fold(CapabilityDescriptor::new(name), |mut acc, part| {
            acc.exposes.extend(part.exposes);
            acc.inbound.extend(part.inbound);
            acc.outbound.extend(part.outbound);
            acc.configure.extend(part.configure);
            acc
        })
}
