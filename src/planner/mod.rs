//! Attribute report planner.
//!
//! Turns the plain configure steps of one physical endpoint into radio
//! commands: all binds, then all reads, then all reporting configurations.
//! Reads and reporting configurations are coalesced per cluster, in the order
//! clusters first appear, and split into commands of at most
//! [`MAX_ATTRIBUTES_PER_COMMAND`] attributes.

use crate::capability::ConfigureStep;
use crate::radio::{BindTarget, RadioCommand};
use crate::zcl::{ReportConfig, ReportingDefaults, ReportingItem};
use log::{debug, warn};

/// Payload ceiling of read and configure-reporting commands.
pub const MAX_ATTRIBUTES_PER_COMMAND: usize = 4;

/// Per-cluster accumulator that keeps first-appearance order.
struct Batches<T> {
    clusters: Vec<(String, Vec<T>)>,
}

impl<T> Batches<T> {
    fn new() -> Self {
        Self { clusters: Vec::new() }
    }

    fn entry(&mut self, cluster: &str) -> &mut Vec<T> {
        let index = match self.clusters.iter().position(|(c, _)| c == cluster) {
            Some(index) => index,
            None => {
                self.clusters.push((cluster.to_string(), Vec::new()));
                self.clusters.len() - 1
            }
        };
        &mut self.clusters[index].1
    }
}

/// Plans the commands for one endpoint.
pub struct Planner<'a> {
    defaults: &'a ReportingDefaults,
    bind_target: BindTarget,
}

impl<'a> Planner<'a> {
    pub fn new(defaults: &'a ReportingDefaults, bind_target: BindTarget) -> Self {
        Self { defaults, bind_target }
    }

    /// Commands for the plain steps addressed to `endpoint`.
    ///
    /// Custom steps are not the planner's business and are ignored; the
    /// executor runs them between planned segments.
    pub fn plan<'s>(&self, endpoint: u8, steps: impl IntoIterator<Item = &'s ConfigureStep>) -> Vec<RadioCommand> {
        let mut binds: Vec<String> = Vec::new();
        let mut reads: Batches<String> = Batches::new();
        let mut reports: Batches<(String, Option<ReportConfig>)> = Batches::new();

        for step in steps {
            match step {
                ConfigureStep::Bind { cluster, .. } => {
                    if !binds.contains(cluster) {
                        binds.push(cluster.clone());
                    }
                }
                ConfigureStep::Read { cluster, attributes, .. } => {
                    let pending = reads.entry(cluster);
                    for attribute in attributes {
                        if !pending.contains(attribute) {
                            pending.push(attribute.clone());
                        }
                    }
                }
                ConfigureStep::ConfigureReporting {
                    cluster,
                    attribute,
                    config,
                    ..
                } => {
                    let pending = reports.entry(cluster);
                    match pending.iter().find(|(a, _)| a == attribute) {
                        Some((_, first)) => {
                            if first != config {
                                warn!(
                                    "[Planner] Conflicting reporting configs for {}.{} on endpoint {}, keeping the first",
                                    cluster, attribute, endpoint
                                );
                            }
                        }
                        None => pending.push((attribute.clone(), *config)),
                    }
                }
                ConfigureStep::Custom { .. } => {}
            }
        }

        let mut commands: Vec<RadioCommand> = binds
            .into_iter()
            .map(|cluster| RadioCommand::Bind {
                endpoint,
                cluster,
                target: self.bind_target,
            })
            .collect();

        for (cluster, attributes) in reads.clusters {
            for chunk in attributes.chunks(MAX_ATTRIBUTES_PER_COMMAND) {
                commands.push(RadioCommand::Read {
                    endpoint,
                    cluster: cluster.clone(),
                    attributes: chunk.to_vec(),
                });
            }
        }

        for (cluster, entries) in reports.clusters {
            let items: Vec<ReportingItem> = entries
                .iter()
                .map(|(attribute, config)| {
                    config
                        .unwrap_or_else(|| self.defaults.lookup(&cluster, attribute))
                        .item(attribute)
                })
                .collect();
            for chunk in items.chunks(MAX_ATTRIBUTES_PER_COMMAND) {
                commands.push(RadioCommand::ConfigureReporting {
                    endpoint,
                    cluster: cluster.clone(),
                    items: chunk.to_vec(),
                });
            }
        }

        debug!("[Planner] Endpoint {}: {} commands planned", endpoint, commands.len());
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StepKind;
    use crate::zcl::reporting::MAX_REPORT_INTERVAL;

    fn planner() -> Planner<'static> {
        Planner::new(ReportingDefaults::standard(), BindTarget::default())
    }

    fn sizes(commands: &[RadioCommand]) -> Vec<usize> {
        commands.iter().map(|c| c.attributes().len()).collect()
    }

    #[test]
    fn test_six_reads_become_four_and_two() {
        let attributes = ["1", "2", "3", "4", "5", "6"];
        let steps = vec![ConfigureStep::read("haElectricalMeasurement", attributes)];
        let commands = planner().plan(1, &steps);

        assert_eq!(sizes(&commands), vec![4, 2]);
        let flattened: Vec<String> = commands.iter().flat_map(|c| c.attributes()).collect();
        assert_eq!(flattened, attributes);
    }

    #[test]
    fn test_batch_count_is_ceiling() {
        for n in 0..=13usize {
            let attributes: Vec<String> = (0..n).map(|i| format!("attr{i}")).collect();
            let steps: Vec<ConfigureStep> = attributes
                .iter()
                .map(|a| ConfigureStep::report("genAnalogInput", a, None))
                .collect();
            let commands = planner().plan(1, &steps);

            assert_eq!(commands.len(), n.div_ceil(MAX_ATTRIBUTES_PER_COMMAND));
            assert!(commands.iter().all(|c| c.attributes().len() <= MAX_ATTRIBUTES_PER_COMMAND));
            let flattened: Vec<String> = commands.iter().flat_map(|c| c.attributes()).collect();
            assert_eq!(flattened, attributes);
        }
    }

    #[test]
    fn test_kind_order_and_dedup() {
        let steps = vec![
            ConfigureStep::report("genOnOff", "onOff", None),
            ConfigureStep::read("genOnOff", ["onOff"]),
            ConfigureStep::bind("genOnOff"),
            ConfigureStep::bind("genLevelCtrl"),
            ConfigureStep::bind("genOnOff"),
            ConfigureStep::read("genOnOff", ["onOff"]),
        ];
        let commands = planner().plan(2, &steps);
        let kinds: Vec<StepKind> = commands.iter().map(RadioCommand::kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Bind, StepKind::Bind, StepKind::Read, StepKind::ConfigureReporting]
        );
        assert!(commands.iter().all(|c| c.endpoint() == 2));
        assert_eq!(commands[0].cluster(), "genOnOff");
        assert_eq!(commands[1].cluster(), "genLevelCtrl");
    }

    #[test]
    fn test_clusters_never_mixed() {
        let steps = vec![
            ConfigureStep::read("seMetering", ["a", "b"]),
            ConfigureStep::read("genOnOff", ["onOff"]),
            ConfigureStep::read("seMetering", ["c", "d", "e"]),
        ];
        let commands = planner().plan(1, &steps);
        let shape: Vec<(&str, usize)> = commands.iter().map(|c| (c.cluster(), c.attributes().len())).collect();
        assert_eq!(shape, vec![("seMetering", 4), ("seMetering", 1), ("genOnOff", 1)]);
    }

    #[test]
    fn test_defaults_and_explicit_configs() {
        let explicit = ReportConfig::new(0u16, 10u16, 1);
        let steps = vec![
            ConfigureStep::report("genOnOff", "onOff", None),
            ConfigureStep::report("haElectricalMeasurement", "rmsCurrent", None),
            ConfigureStep::report("haElectricalMeasurement", "activePower", Some(explicit)),
            // conflicting duplicate, first one wins
            ConfigureStep::report("haElectricalMeasurement", "activePower", None),
        ];
        let commands = planner().plan(1, &steps);
        assert_eq!(commands.len(), 2);

        match &commands[0] {
            RadioCommand::ConfigureReporting { items, .. } => {
                assert_eq!(items, &vec![ReportConfig::new(0u16, MAX_REPORT_INTERVAL, 1).item("onOff")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match &commands[1] {
            RadioCommand::ConfigureReporting { items, .. } => {
                assert_eq!(
                    items,
                    &vec![
                        ReportConfig::new(10u16, 65000u16, 50).item("rmsCurrent"),
                        explicit.item("activePower"),
                    ]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_no_steps_no_commands() {
        assert!(planner().plan(1, &Vec::<ConfigureStep>::new()).is_empty());
        let binds_only = vec![ConfigureStep::bind("genOnOff")];
        assert_eq!(planner().plan(1, &binds_only).len(), 1);
    }

    #[test]
    fn test_custom_defaults_table() {
        let defaults = ReportingDefaults::empty().with("genOnOff", "onOff", ReportConfig::new(1u16, 300u16, 1));
        let planner = Planner::new(&defaults, BindTarget::Group { id: 5 });
        let commands = planner.plan(
            1,
            &vec![ConfigureStep::bind("genOnOff"), ConfigureStep::report("genOnOff", "onOff", None)],
        );
        assert_eq!(
            commands[0],
            RadioCommand::Bind {
                endpoint: 1,
                cluster: "genOnOff".to_string(),
                target: BindTarget::Group { id: 5 },
            }
        );
        assert_eq!(commands[1].attributes(), vec!["onOff".to_string()]);
    }
}
