//! Built-in device definitions.

use super::{DeviceDefinition, Fingerprint};
use crate::capability::library::{
    BatteryArgs, CoverArgs, ElectricityMeterArgs, LightArgs, OnOffArgs, ThermostatArgs, battery,
    electricity_meter, humidity, identify, light, on_off, temperature, thermostat, tuya_magic_packet,
    vacation_mode, window_covering,
};
use crate::endpoint::{EndpointInventory, EndpointMap, EndpointSpec};

/// Second socket sits on endpoint 7 on older firmware.
fn dual_usb_endpoints(inventory: &EndpointInventory) -> EndpointMap {
    let l2 = if inventory.has_endpoint(2) { 2 } else { 7 };
    EndpointMap::from([("l1".to_string(), 1), ("l2".to_string(), l2)])
}

fn two_gang() -> EndpointSpec {
    EndpointSpec::fixed([("l1", 1), ("l2", 2)])
}

pub fn builtin() -> Vec<DeviceDefinition> {
    vec![
        DeviceDefinition::new("ZK-EU-2U", "Moes", "Zigbee 3.0 dual USB wireless socket plug")
            .zigbee_models(["TS0112"])
            .capability(on_off(OnOffArgs::endpoints(["l1", "l2"])))
            .endpoints(EndpointSpec::Dynamic(dual_usb_endpoints))
            .multi_endpoint(),
        DeviceDefinition::new("ZP-LZ-FR2U", "Moes", "Zigbee 3.0 dual USB wireless socket plug")
            .fingerprints(Fingerprint::many(
                "TS011F",
                &["_TZ3000_cymsnfvf", "_TZ3000_2xlvlnez", "_TZ3210_2uk4z8ce"],
            ))
            .capability(tuya_magic_packet())
            .capability(on_off(OnOffArgs::endpoints(["l1", "l2"])))
            .endpoints(two_gang())
            .multi_endpoint(),
        DeviceDefinition::new("MS-104BZ", "Moes", "Smart light switch module (2 gang)")
            .fingerprints(Fingerprint::many("TS011F", &["_TZ3000_pmz6mjyu", "_TZ3000_iv6ph5tr"]))
            .capability(tuya_magic_packet())
            .capability(on_off(OnOffArgs::endpoints(["l1", "l2"])))
            .endpoints(two_gang())
            .multi_endpoint(),
        DeviceDefinition::new("MS-104Z", "Moes", "Smart light switch module (1 gang)")
            .fingerprints(Fingerprint::many("TS0121", &["_TYZB01_iuepbmpv"]))
            .fingerprints(Fingerprint::many("TS011F", &["_TZ3000_zmy1waw6", "_TZ3000_bkfe0bab"]))
            .capability(on_off(OnOffArgs::default())),
        DeviceDefinition::new("SP 120", "Innr", "Smart plug")
            .zigbee_models(["SP 120"])
            .capability(on_off(OnOffArgs::default().without_power_on_behavior()))
            .capability(electricity_meter(ElectricityMeterArgs::default())),
        DeviceDefinition::new("H1", "Ubisys", "Radiator thermostat")
            .zigbee_models(["H1"])
            .capability(thermostat(ThermostatArgs::default()))
            .capability(vacation_mode())
            .capability(battery(BatteryArgs::default())),
        DeviceDefinition::new("J1", "Ubisys", "Shutter control J1")
            .zigbee_models(["J1 (5502)", "J1-R (5602)"])
            .capability(window_covering(CoverArgs {
                tilt: true,
                ..CoverArgs::default()
            }))
            .capability(identify()),
        DeviceDefinition::new("SNZB-02", "SONOFF", "Temperature and humidity sensor")
            .zigbee_models(["TH01"])
            .capability(temperature())
            .capability(humidity())
            .capability(battery(BatteryArgs {
                voltage: true,
                ..BatteryArgs::default()
            })),
        DeviceDefinition::new("LED1545G12", "IKEA", "TRADFRI bulb E26/E27, white spectrum, globe, opal, 980 lm")
            .zigbee_models(["TRADFRI bulb E27 WS opal 980lm", "TRADFRI bulb E26 WS opal 980lm"])
            .capability(light(LightArgs::default().with_color_temp(250, 454)))
            .capability(identify()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dual_usb_endpoint_fallback() {
        let with_two = EndpointInventory::from_ids([1, 2]);
        assert_eq!(dual_usb_endpoints(&with_two)["l2"], 2);

        let legacy = EndpointInventory::from_ids([1, 7]);
        assert_eq!(dual_usb_endpoints(&legacy)["l2"], 7);
    }

    #[test]
    fn test_models_unique() {
        let definitions = builtin();
        let mut models: Vec<&str> = definitions.iter().map(|d| d.model.as_str()).collect();
        models.sort();
        models.dedup();
        assert_eq!(models.len(), definitions.len());
    }

    #[test]
    fn test_every_definition_is_identifiable() {
        for definition in builtin() {
            assert!(
                !definition.zigbee_models.is_empty() || !definition.fingerprints.is_empty(),
                "{} cannot be matched",
                definition.model
            );
        }
    }
}
