//! Configuration executor.
//!
//! Runs a unified descriptor's configure steps against one live device. The
//! flattened step list is cut into segments at every custom step; each
//! generated segment is partitioned by resolved physical endpoint and planned,
//! custom steps run where they were declared. Exactly one command is in
//! flight per device. A failed command is recorded and the run carries on.

mod outcome;

pub use outcome::{CommandFailure, CommandRecord, ConfigureOutcome, ExecutorState};

use crate::capability::{ActionContext, ConfigureStep, StepKind};
use crate::compose::{TaggedStep, UnifiedDescriptor};
use crate::endpoint::{EndpointInventory, Resolution};
use crate::error::CommandError;
use crate::planner::Planner;
use crate::radio::{BindTarget, Radio, RadioCommand};
use crate::zcl::ReportingDefaults;
use futures_util::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A physical device as announced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub ieee: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointInventory,
}

impl Device {
    pub fn new(ieee: impl Into<String>, endpoints: EndpointInventory) -> Self {
        Self {
            ieee: ieee.into(),
            model: None,
            manufacturer: None,
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Coordinator endpoint binds point at
    pub coordinator_endpoint: u8,
    /// Give up on a command after this long, `None` waits for the radio
    pub command_timeout: Option<Duration>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            coordinator_endpoint: 1,
            command_timeout: None,
        }
    }
}

/// Stretch of the flattened step list between custom steps.
enum Segment<'a> {
    Generated(Vec<&'a ConfigureStep>),
    Custom(&'a TaggedStep),
}

fn segments(steps: &[TaggedStep]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut generated = Vec::new();
    for tagged in steps {
        if tagged.step.is_custom() {
            if !generated.is_empty() {
                segments.push(Segment::Generated(std::mem::take(&mut generated)));
            }
            segments.push(Segment::Custom(tagged));
        } else {
            generated.push(&tagged.step);
        }
    }
    if !generated.is_empty() {
        segments.push(Segment::Generated(generated));
    }
    segments
}

/// Drives configuration runs through a [`Radio`].
#[derive(Clone)]
pub struct ConfigurationExecutor {
    radio: Arc<dyn Radio>,
    defaults: Arc<ReportingDefaults>,
    options: ExecutorOptions,
}

impl ConfigurationExecutor {
    pub fn new(radio: Arc<dyn Radio>) -> Self {
        Self {
            radio,
            defaults: Arc::new(ReportingDefaults::standard().clone()),
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: Arc<ReportingDefaults>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Commands a run would issue, without sending anything.
    ///
    /// Custom steps are left out since their commands are only known when
    /// they run.
    pub fn plan(&self, device: &Device, descriptor: &UnifiedDescriptor) -> (Vec<RadioCommand>, Resolution) {
        let mut resolution = descriptor.endpoints.resolve(&device.endpoints);
        let planner = self.planner();
        let mut commands = Vec::new();
        for segment in segments(&descriptor.configure) {
            if let Segment::Generated(steps) = segment {
                for (endpoint, steps) in partition(&steps, &mut resolution, &device.endpoints) {
                    commands.extend(planner.plan(endpoint, steps));
                }
            }
        }
        (commands, resolution)
    }

    /// Configure one device. Never fails as a whole; see the outcome.
    pub async fn execute(
        &self,
        device: &Device,
        descriptor: &UnifiedDescriptor,
        cancel: &CancellationToken,
    ) -> ConfigureOutcome {
        let mut outcome = ConfigureOutcome::start(&device.ieee);
        info!(
            "[Configure] Run {} for {} ({} steps)",
            outcome.run_id,
            device.ieee,
            descriptor.configure.len()
        );

        let mut resolution = descriptor.endpoints.resolve(&device.endpoints);
        let planner = self.planner();
        let mut state = ExecutorState::Idle;

        'run: for segment in segments(&descriptor.configure) {
            match segment {
                Segment::Generated(steps) => {
                    for (endpoint, steps) in partition(&steps, &mut resolution, &device.endpoints) {
                        for command in planner.plan(endpoint, steps) {
                            if cancel.is_cancelled() {
                                state = ExecutorState::Cancelled;
                                break 'run;
                            }
                            transition(&device.ieee, &mut state, ExecutorState::for_kind(command.kind()));
                            let result = self
                                .with_timeout(self.radio.send(&device.ieee, &command))
                                .await
                                .map(|_| ());
                            record(
                                &mut outcome,
                                command.endpoint(),
                                command.cluster(),
                                command.attributes(),
                                command.kind(),
                                result,
                            );
                        }
                    }
                }
                Segment::Custom(tagged) => {
                    let ConfigureStep::Custom { name, endpoint, action } = &tagged.step else {
                        continue;
                    };
                    let endpoints = match resolution.targets(endpoint, action.cluster(), &device.endpoints) {
                        Ok(endpoints) => endpoints,
                        Err(warning) => {
                            warn!("[Configure] {}: custom step '{}' skipped: {}", device.ieee, name, warning);
                            outcome.warn(warning);
                            continue;
                        }
                    };
                    for endpoint in endpoints {
                        if cancel.is_cancelled() {
                            state = ExecutorState::Cancelled;
                            break 'run;
                        }
                        transition(&device.ieee, &mut state, ExecutorState::Custom);
                        debug!(
                            "[Configure] {}: running '{}' from '{}' on endpoint {}",
                            device.ieee, name, tagged.capability, endpoint
                        );
                        let ctx = ActionContext {
                            device: &device.ieee,
                            endpoint,
                            inventory: &device.endpoints,
                            radio: self.radio.as_ref(),
                            coordinator_endpoint: self.options.coordinator_endpoint,
                        };
                        let result = self.with_timeout(action.run(&ctx)).await;
                        record(
                            &mut outcome,
                            endpoint,
                            action.cluster().unwrap_or(name),
                            vec![name.clone()],
                            StepKind::Custom,
                            result,
                        );
                    }
                }
            }
        }

        for warning in std::mem::take(&mut resolution.warnings) {
            outcome.warn(warning);
        }

        if state != ExecutorState::Cancelled {
            state = ExecutorState::Done;
        }
        outcome.finish(state);

        if outcome.cancelled() {
            warn!("[Configure] {}: {}", device.ieee, outcome);
        } else if outcome.failure_count() > 0 || !outcome.warnings.is_empty() {
            warn!(
                "[Configure] {}: {} ({} warnings)",
                device.ieee,
                outcome,
                outcome.warnings.len()
            );
        } else {
            info!("[Configure] {}: {}", device.ieee, outcome);
        }
        outcome
    }

    /// Configure several devices concurrently, each one sequentially.
    pub async fn configure_many<'a>(
        &self,
        jobs: impl IntoIterator<Item = (&'a Device, &'a UnifiedDescriptor)>,
        cancel: &CancellationToken,
    ) -> Vec<ConfigureOutcome> {
        join_all(
            jobs.into_iter()
                .map(|(device, descriptor)| self.execute(device, descriptor, cancel)),
        )
        .await
    }

    fn planner(&self) -> Planner<'_> {
        Planner::new(
            &self.defaults,
            BindTarget::Coordinator {
                endpoint: self.options.coordinator_endpoint,
            },
        )
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, CommandError>>,
    ) -> Result<T, CommandError> {
        match self.options.command_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| CommandError::Timeout(limit.as_millis() as u64))?,
            None => fut.await,
        }
    }
}

/// Group generated steps by physical endpoint, in first-appearance order.
///
/// Steps whose target cannot be resolved are dropped with a warning.
fn partition<'s>(
    steps: &[&'s ConfigureStep],
    resolution: &mut Resolution,
    inventory: &EndpointInventory,
) -> Vec<(u8, Vec<&'s ConfigureStep>)> {
    let mut partitions: Vec<(u8, Vec<&'s ConfigureStep>)> = Vec::new();
    for &step in steps {
        match resolution.targets(step.endpoint(), step.cluster(), inventory) {
            Ok(endpoints) => {
                for endpoint in endpoints {
                    match partitions.iter_mut().find(|(e, _)| *e == endpoint) {
                        Some((_, group)) => group.push(step),
                        None => partitions.push((endpoint, vec![step])),
                    }
                }
            }
            Err(warning) => {
                if !resolution.warnings.contains(&warning) {
                    warn!("[Configure] {:?} step skipped: {}", step.kind(), warning);
                    resolution.warnings.push(warning);
                }
            }
        }
    }
    partitions
}

fn transition(device: &str, state: &mut ExecutorState, next: ExecutorState) {
    if *state != next {
        debug!("[Configure] {}: {} -> {}", device, state, next);
        *state = next;
    }
}

fn record(
    outcome: &mut ConfigureOutcome,
    endpoint: u8,
    cluster: &str,
    attributes: Vec<String>,
    kind: StepKind,
    result: Result<(), CommandError>,
) {
    match result {
        Ok(()) => outcome.succeeded.push(CommandRecord {
            endpoint,
            cluster: cluster.to_string(),
            attributes,
            kind,
        }),
        Err(error) => {
            let failure = CommandFailure {
                device: outcome.device.clone(),
                endpoint,
                cluster: cluster.to_string(),
                attributes,
                kind,
                error,
            };
            warn!("[Configure] Command failed: {}", failure);
            outcome.failures.push(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::library::{OnOffArgs, on_off};
    use crate::capability::{CapabilityDescriptor, ConfigureAction, Payload};
    use crate::compose::compose;
    use crate::endpoint::{EndpointSpec, EndpointTarget};
    use crate::error::ConfigureWarning;
    use crate::radio::DryRunRadio;
    use async_trait::async_trait;

    struct Marker;

    #[async_trait]
    impl ConfigureAction for Marker {
        async fn run(&self, ctx: &ActionContext<'_>) -> Result<(), CommandError> {
            ctx.radio
                .command(ctx.device, ctx.endpoint, "genBasic", "marker", Payload::new())
                .await
                .map(|_| ())
        }
    }

    fn executor(radio: Arc<DryRunRadio>) -> ConfigurationExecutor {
        ConfigurationExecutor::new(radio)
    }

    #[tokio::test]
    async fn test_custom_step_runs_at_declared_position() {
        let descriptor = compose(&[
            CapabilityDescriptor::new("first").step(ConfigureStep::bind("genOnOff")),
            CapabilityDescriptor::new("marker").step(ConfigureStep::custom("marker", Marker)),
            CapabilityDescriptor::new("last").step(ConfigureStep::bind("genLevelCtrl")),
        ])
        .unwrap();
        let radio = Arc::new(DryRunRadio::new());
        let device = Device::new("0x01", EndpointInventory::default().with(1, ["genOnOff", "genLevelCtrl"]));

        let outcome = executor(radio.clone())
            .execute(&device, &descriptor, &CancellationToken::new())
            .await;

        let sent: Vec<String> = radio.sent().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            sent,
            vec![
                "bind genOnOff on endpoint 1",
                "command genBasic [marker] on endpoint 1",
                "bind genLevelCtrl on endpoint 1",
            ]
        );
        assert!(outcome.is_complete());
        assert_eq!(outcome.succeeded.len(), 3);
    }

    #[tokio::test]
    async fn test_partitions_by_endpoint() {
        let descriptor = compose(&[on_off(OnOffArgs::endpoints(["l1", "l2"]).without_power_on_behavior())])
            .unwrap()
            .with_endpoints(EndpointSpec::fixed([("l1", 1), ("l2", 2)]));
        let radio = Arc::new(DryRunRadio::new());
        let device = Device::new("0x02", EndpointInventory::from_ids([1, 2]));

        let outcome = executor(radio.clone())
            .execute(&device, &descriptor, &CancellationToken::new())
            .await;

        let endpoints: Vec<u8> = radio.sent().iter().map(RadioCommand::endpoint).collect();
        assert_eq!(endpoints, vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(outcome.state, ExecutorState::Done);
    }

    #[tokio::test]
    async fn test_missing_static_endpoint_is_a_warning() {
        let descriptor = compose(&[on_off(OnOffArgs::endpoints(["l1", "l2"]).without_power_on_behavior())])
            .unwrap()
            .with_endpoints(EndpointSpec::fixed([("l1", 1), ("l2", 2)]));
        let radio = Arc::new(DryRunRadio::new());
        let device = Device::new("0x03", EndpointInventory::from_ids([1]));

        let outcome = executor(radio.clone())
            .execute(&device, &descriptor, &CancellationToken::new())
            .await;

        assert_eq!(radio.sent().len(), 3);
        assert!(outcome.failures.is_empty());
        assert!(outcome.warnings.contains(&ConfigureWarning::MissingEndpoint {
            name: "l2".to_string(),
            endpoint: 2
        }));
        assert!(outcome.warnings.contains(&ConfigureWarning::UnresolvedEndpoint {
            name: "l2".to_string()
        }));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let descriptor = compose(&[CapabilityDescriptor::new("slow").steps([
            ConfigureStep::bind("genOnOff"),
            ConfigureStep::read("genOnOff", ["onOff"]),
        ])])
        .unwrap();
        let radio = Arc::new(DryRunRadio::new().with_delay(Duration::from_millis(200)));
        let device = Device::new("0x04", EndpointInventory::from_ids([1]));

        let outcome = executor(radio)
            .with_options(ExecutorOptions {
                command_timeout: Some(Duration::from_millis(10)),
                ..ExecutorOptions::default()
            })
            .execute(&device, &descriptor, &CancellationToken::new())
            .await;

        assert_eq!(outcome.failure_count(), 2);
        assert_eq!(outcome.failures[0].error, CommandError::Timeout(10));
        assert_eq!(outcome.to_string(), "completed with 2 failures");
    }

    #[tokio::test]
    async fn test_already_cancelled_sends_nothing() {
        let descriptor = compose(&[on_off(OnOffArgs::default())]).unwrap();
        let radio = Arc::new(DryRunRadio::new());
        let device = Device::new("0x05", EndpointInventory::from_ids([1]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = executor(radio.clone()).execute(&device, &descriptor, &cancel).await;
        assert!(radio.sent().is_empty());
        assert!(outcome.cancelled());
    }

    #[test]
    fn test_plan_without_sending() {
        let descriptor = compose(&[
            on_off(OnOffArgs::default()),
            CapabilityDescriptor::new("marker").step(ConfigureStep::custom("marker", Marker).on(EndpointTarget::Physical(1))),
        ])
        .unwrap();
        let radio = Arc::new(DryRunRadio::new());
        let device = Device::new("0x06", EndpointInventory::default().with(1, ["genOnOff"]));

        let (commands, resolution) = executor(radio.clone()).plan(&device, &descriptor);
        assert_eq!(commands.len(), 3);
        assert!(resolution.warnings.is_empty());
        assert!(radio.sent().is_empty());
    }
}
