use crate::capability::{
    Access, AttributeMapping, CapabilityDescriptor, ConfigureStep, Encode, Feature, InboundConverter,
    OutboundConverter, Transform,
};
use crate::endpoint::EndpointTarget;
use crate::zcl::ReportConfig;
use crate::zcl::cluster::{HA_ELECTRICAL_MEASUREMENT, SE_METERING};

/// One measured quantity of an electricity meter.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub cluster: String,
    pub attribute: String,
    pub multiplier: f64,
    pub divisor: f64,
    /// Explicit reporting config, `None` takes the default
    pub reporting: Option<ReportConfig>,
}

impl Measurement {
    pub fn new(cluster: &str, attribute: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            attribute: attribute.to_string(),
            multiplier: 1.0,
            divisor: 1.0,
            reporting: None,
        }
    }

    pub fn divisor(mut self, divisor: f64) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn reporting(mut self, config: ReportConfig) -> Self {
        self.reporting = Some(config);
        self
    }
}

/// Arguments of [`electricity_meter`]. `None` disables a quantity.
#[derive(Debug, Clone)]
pub struct ElectricityMeterArgs {
    pub endpoint: Option<EndpointTarget>,
    pub power: Option<Measurement>,
    pub voltage: Option<Measurement>,
    pub current: Option<Measurement>,
    pub energy: Option<Measurement>,
    pub produced_energy: Option<Measurement>,
    pub ac_frequency: Option<Measurement>,
    pub power_factor: Option<Measurement>,
    pub configure_reporting: bool,
}

impl Default for ElectricityMeterArgs {
    fn default() -> Self {
        Self {
            endpoint: None,
            power: Some(Measurement::new(HA_ELECTRICAL_MEASUREMENT, "activePower")),
            voltage: Some(Measurement::new(HA_ELECTRICAL_MEASUREMENT, "rmsVoltage")),
            current: Some(Measurement::new(HA_ELECTRICAL_MEASUREMENT, "rmsCurrent").divisor(1000.0)),
            energy: Some(Measurement::new(SE_METERING, "currentSummDelivered").divisor(100.0)),
            produced_energy: None,
            ac_frequency: None,
            power_factor: None,
            configure_reporting: true,
        }
    }
}

impl ElectricityMeterArgs {
    pub fn with_produced_energy(mut self) -> Self {
        self.produced_energy = Some(Measurement::new(SE_METERING, "currentSummReceived").divisor(100.0));
        self
    }

    pub fn with_ac_frequency(mut self) -> Self {
        self.ac_frequency = Some(Measurement::new(HA_ELECTRICAL_MEASUREMENT, "acFrequency").divisor(100.0));
        self
    }

    pub fn with_power_factor(mut self) -> Self {
        self.power_factor = Some(Measurement::new(HA_ELECTRICAL_MEASUREMENT, "powerFactor"));
        self
    }

    /// Meters that carry every quantity on a single cluster.
    pub fn on_cluster(mut self, cluster: &str) -> Self {
        for measurement in self.measurements_mut().into_iter().flatten() {
            measurement.cluster = cluster.to_string();
        }
        self
    }

    pub fn on(mut self, endpoint: EndpointTarget) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn measurements_mut(&mut self) -> [Option<&mut Measurement>; 7] {
        [
            self.power.as_mut(),
            self.voltage.as_mut(),
            self.current.as_mut(),
            self.energy.as_mut(),
            self.produced_energy.as_mut(),
            self.ac_frequency.as_mut(),
            self.power_factor.as_mut(),
        ]
    }

    /// Enabled quantities with their feature name and unit, in reporting order.
    fn measurements(&self) -> Vec<(&'static str, &'static str, &Measurement)> {
        [
            ("power", "W", &self.power),
            ("voltage", "V", &self.voltage),
            ("current", "A", &self.current),
            ("energy", "kWh", &self.energy),
            ("produced_energy", "kWh", &self.produced_energy),
            ("ac_frequency", "Hz", &self.ac_frequency),
            ("power_factor", "", &self.power_factor),
        ]
        .into_iter()
        .filter_map(|(name, unit, m)| m.as_ref().map(|m| (name, unit, m)))
        .collect()
    }
}

fn converter_name(cluster: &str) -> String {
    match cluster {
        HA_ELECTRICAL_MEASUREMENT => "electrical_measurement".to_string(),
        SE_METERING => "metering".to_string(),
        other => other.to_string(),
    }
}

/// Power, voltage, current and energy metering.
pub fn electricity_meter(args: ElectricityMeterArgs) -> CapabilityDescriptor {
    let measurements = args.measurements();
    let mut descriptor = CapabilityDescriptor::new("electricity_meter");

    // clusters in first-appearance order
    let mut clusters: Vec<&str> = Vec::new();
    for (_, _, m) in &measurements {
        if !clusters.contains(&m.cluster.as_str()) {
            clusters.push(&m.cluster);
        }
    }

    for cluster in &clusters {
        let mappings = measurements
            .iter()
            .filter(|(_, _, m)| m.cluster == *cluster)
            .map(|(name, _, m)| {
                AttributeMapping::new(&m.attribute, *name, Transform::scale(m.multiplier, m.divisor))
            })
            .collect();
        descriptor = descriptor.inbound(InboundConverter::attributes(converter_name(cluster), *cluster, mappings));
    }

    for (name, unit, m) in &measurements {
        let mut feature = Feature::numeric(*name, Access::StateGet);
        if !unit.is_empty() {
            feature = feature.with_unit(*unit);
        }
        descriptor = descriptor.expose(feature).outbound(
            OutboundConverter::new(*name, [*name], Encode::ReadOnly).with_read_back(&m.cluster, [&m.attribute]),
        );
    }

    if args.configure_reporting {
        let target = args.endpoint.as_ref();
        for cluster in &clusters {
            descriptor = descriptor.step(ConfigureStep::bind(*cluster).on_opt(target));
        }
        for (_, _, m) in &measurements {
            descriptor = descriptor.steps([
                ConfigureStep::read(&m.cluster, [&m.attribute]).on_opt(target),
                ConfigureStep::report(&m.cluster, &m.attribute, m.reporting).on_opt(target),
            ]);
        }
    }
    descriptor
}
