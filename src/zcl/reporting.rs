//! Attribute reporting configuration.
//!
//! A reporting config is the `(min, max, change)` triple that tells a device
//! when to report an attribute on its own. Capabilities may leave it out, in
//! which case the planner takes the default for that `(cluster, attribute)`
//! from [`ReportingDefaults`].

use super::cluster;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use strum::{Display, EnumString};

/// Largest maximum interval accepted by the firmware we target, in seconds.
pub const MAX_REPORT_INTERVAL: u16 = 62000;

/// Named reporting intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ReportingInterval {
    #[strum(serialize = "MIN")]
    Min,
    #[strum(serialize = "MAX")]
    Max,
    #[strum(serialize = "5_SECONDS")]
    FiveSeconds,
    #[strum(serialize = "10_SECONDS")]
    TenSeconds,
    #[strum(serialize = "1_MINUTE")]
    OneMinute,
    #[strum(serialize = "5_MINUTES")]
    FiveMinutes,
    #[strum(serialize = "10_MINUTES")]
    TenMinutes,
    #[strum(serialize = "15_MINUTES")]
    FifteenMinutes,
    #[strum(serialize = "30_MINUTES")]
    ThirtyMinutes,
    #[strum(serialize = "1_HOUR")]
    OneHour,
}

impl ReportingInterval {
    pub fn seconds(self) -> u16 {
        match self {
            ReportingInterval::Min => 0,
            ReportingInterval::Max => MAX_REPORT_INTERVAL,
            ReportingInterval::FiveSeconds => 5,
            ReportingInterval::TenSeconds => 10,
            ReportingInterval::OneMinute => 60,
            ReportingInterval::FiveMinutes => 300,
            ReportingInterval::TenMinutes => 600,
            ReportingInterval::FifteenMinutes => 900,
            ReportingInterval::ThirtyMinutes => 1800,
            ReportingInterval::OneHour => 3600,
        }
    }
}

impl From<ReportingInterval> for u16 {
    fn from(interval: ReportingInterval) -> Self {
        interval.seconds()
    }
}

/// Reporting configuration for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Minimum interval between reports, in seconds
    pub min: u16,
    /// Maximum interval between reports, in seconds
    pub max: u16,
    /// Minimum change of the raw value that triggers a report
    pub change: u32,
}

impl ReportConfig {
    /// Generic config used when neither the capability nor the defaults table
    /// knows better.
    pub const FALLBACK: ReportConfig = ReportConfig {
        min: 10,
        max: 3600,
        change: 1,
    };

    /// Create a config from seconds or named intervals.
    ///
    /// ```ignore
    /// ReportConfig::new(ReportingInterval::Min, ReportingInterval::Max, 1);
    /// ReportConfig::new(10, 65000, 5);
    /// ```
    pub fn new(min: impl Into<u16>, max: impl Into<u16>, change: u32) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            change,
        }
    }

    /// Turn the config into the wire item for `attribute`.
    pub fn item(&self, attribute: &str) -> ReportingItem {
        ReportingItem {
            attribute: attribute.to_string(),
            minimum_report_interval: self.min,
            maximum_report_interval: self.max,
            reportable_change: self.change,
        }
    }
}

/// One attribute entry of a configure-reporting command, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingItem {
    pub attribute: String,
    pub minimum_report_interval: u16,
    pub maximum_report_interval: u16,
    pub reportable_change: u32,
}

static STANDARD: LazyLock<ReportingDefaults> = LazyLock::new(ReportingDefaults::build_standard);

/// Read-only lookup of default reporting configs keyed by `(cluster, attribute)`.
///
/// Built once at startup and handed to the planner by reference.
#[derive(Debug, Clone, Default)]
pub struct ReportingDefaults {
    entries: HashMap<(String, String), ReportConfig>,
    fallback: Option<ReportConfig>,
}

impl ReportingDefaults {
    /// The process-wide standard table.
    pub fn standard() -> &'static ReportingDefaults {
        &STANDARD
    }

    /// An empty table; every lookup yields [`ReportConfig::FALLBACK`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace the default for one attribute.
    pub fn with(mut self, cluster: &str, attribute: &str, config: ReportConfig) -> Self {
        self.entries
            .insert((cluster.to_string(), attribute.to_string()), config);
        self
    }

    /// Replace the config returned for attributes without an entry.
    pub fn with_fallback(mut self, config: ReportConfig) -> Self {
        self.fallback = Some(config);
        self
    }

    /// Look up the default config for an attribute.
    pub fn lookup(&self, cluster: &str, attribute: &str) -> ReportConfig {
        self.entries
            .get(&(cluster.to_string(), attribute.to_string()))
            .copied()
            .or(self.fallback)
            .unwrap_or(ReportConfig::FALLBACK)
    }

    /// Whether the table has an explicit entry for this attribute.
    pub fn contains(&self, cluster: &str, attribute: &str) -> bool {
        self.entries
            .contains_key(&(cluster.to_string(), attribute.to_string()))
    }

    fn build_standard() -> Self {
        use ReportingInterval::{Max, Min, OneHour};

        let measurement = |change| ReportConfig::new(10u16, 65000u16, change);
        let environment = |change| ReportConfig::new(10u16, OneHour, change);

        Self::empty()
            .with(cluster::GEN_ON_OFF, "onOff", ReportConfig::new(Min, Max, 1))
            .with(cluster::GEN_LEVEL_CTRL, "currentLevel", ReportConfig::new(5u16, 65000u16, 1))
            .with(cluster::LIGHTING_COLOR_CTRL, "colorTemperature", ReportConfig::new(5u16, 65000u16, 1))
            .with(cluster::GEN_POWER_CFG, "batteryVoltage", ReportConfig::new(OneHour, Max, 0))
            .with(cluster::GEN_POWER_CFG, "batteryPercentageRemaining", ReportConfig::new(OneHour, Max, 0))
            .with(cluster::GEN_ANALOG_INPUT, "presentValue", environment(5))
            .with(cluster::MS_TEMPERATURE_MEASUREMENT, "measuredValue", environment(100))
            .with(cluster::MS_RELATIVE_HUMIDITY, "measuredValue", environment(100))
            .with(cluster::MS_OCCUPANCY_SENSING, "occupancy", ReportConfig::new(Min, OneHour, 0))
            .with(cluster::HVAC_THERMOSTAT, "localTemperature", ReportConfig::new(Min, OneHour, 10))
            .with(cluster::HVAC_THERMOSTAT, "occupiedHeatingSetpoint", ReportConfig::new(Min, OneHour, 10))
            .with(cluster::HVAC_THERMOSTAT, "pIHeatingDemand", ReportConfig::new(Min, OneHour, 10))
            .with(cluster::HVAC_THERMOSTAT, "systemMode", ReportConfig::new(Min, OneHour, 0))
            .with(cluster::CLOSURES_WINDOW_COVERING, "currentPositionLiftPercentage", ReportConfig::new(1u16, Max, 1))
            .with(cluster::CLOSURES_WINDOW_COVERING, "currentPositionTiltPercentage", ReportConfig::new(1u16, Max, 1))
            .with(cluster::HA_ELECTRICAL_MEASUREMENT, "activePower", measurement(5))
            .with(cluster::HA_ELECTRICAL_MEASUREMENT, "rmsCurrent", measurement(50))
            .with(cluster::HA_ELECTRICAL_MEASUREMENT, "rmsVoltage", measurement(5))
            .with(cluster::HA_ELECTRICAL_MEASUREMENT, "acFrequency", measurement(10))
            .with(cluster::HA_ELECTRICAL_MEASUREMENT, "powerFactor", measurement(1))
            .with(cluster::SE_METERING, "instantaneousDemand", measurement(5))
            .with(cluster::SE_METERING, "currentSummDelivered", measurement(10))
            .with(cluster::SE_METERING, "currentSummReceived", measurement(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_intervals() {
        assert_eq!("1_HOUR".parse::<ReportingInterval>().unwrap().seconds(), 3600);
        assert_eq!("MAX".parse::<ReportingInterval>().unwrap().seconds(), MAX_REPORT_INTERVAL);
        assert_eq!(ReportingInterval::TenSeconds.to_string(), "10_SECONDS");
        assert!("2_HOURS".parse::<ReportingInterval>().is_err());
    }

    #[test]
    fn test_on_off_default() {
        let config = ReportingDefaults::standard().lookup(cluster::GEN_ON_OFF, "onOff");
        assert_eq!(config, ReportConfig::new(0u16, MAX_REPORT_INTERVAL, 1));
    }

    #[test]
    fn test_unknown_attribute_uses_fallback() {
        let defaults = ReportingDefaults::standard();
        assert!(!defaults.contains("manuSpecificLumi", "airQuality"));
        assert_eq!(
            defaults.lookup("manuSpecificLumi", "airQuality"),
            ReportConfig::FALLBACK
        );

        let custom = ReportingDefaults::empty().with_fallback(ReportConfig::new(1u16, 60u16, 2));
        assert_eq!(custom.lookup("genOnOff", "onOff"), ReportConfig::new(1u16, 60u16, 2));
    }

    #[test]
    fn test_item_wire_names() {
        let item = ReportConfig::new(10u16, 65000u16, 5).item("activePower");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["attribute"], "activePower");
        assert_eq!(json["minimumReportInterval"], 10);
        assert_eq!(json["maximumReportInterval"], 65000);
        assert_eq!(json["reportableChange"], 5);
    }
}
