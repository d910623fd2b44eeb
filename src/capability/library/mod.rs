//! Reusable capability constructors.
//!
//! Each constructor takes an args struct with sensible defaults and returns a
//! finished [`CapabilityDescriptor`](super::CapabilityDescriptor). Device
//! definitions list them in the order they should be composed.

mod climate;
mod generic;
mod light;
mod metering;
mod on_off;
mod sensors;
mod tuya;

pub use climate::{CoverArgs, ThermostatArgs, thermostat, vacation_mode, window_covering};
pub use generic::{
    ActionArgs, BinaryArgs, EnumLookupArgs, NumericArgs, action_enum_lookup, binary, enum_lookup, identify,
    numeric,
};
pub use light::{LightArgs, light};
pub use metering::{ElectricityMeterArgs, Measurement, electricity_meter};
pub use on_off::{OnOffArgs, on_off};
pub use sensors::{BatteryArgs, battery, humidity, occupancy, temperature};
pub use tuya::{TuyaMagicPacket, tuya_magic_packet};

use crate::endpoint::EndpointTarget;

/// One entry per logical endpoint, or a single unqualified entry.
pub(crate) fn endpoint_names(names: &[String]) -> Vec<Option<&str>> {
    if names.is_empty() {
        vec![None]
    } else {
        names.iter().map(|n| Some(n.as_str())).collect()
    }
}

pub(crate) fn target_of(name: Option<&str>) -> Option<EndpointTarget> {
    name.map(EndpointTarget::named)
}

/// Qualify a feature with an optional endpoint name.
pub(crate) fn qualify(feature: crate::capability::Feature, name: Option<&str>) -> crate::capability::Feature {
    match name {
        Some(name) => feature.with_endpoint(name),
        None => feature,
    }
}
