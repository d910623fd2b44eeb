//! Configure steps contributed by capabilities.
//!
//! Plain steps (bind, read, configure reporting) are data and get batched by
//! the planner. Anything that does not fit that shape is a
//! [`ConfigureStep::Custom`] step carrying an async [`ConfigureAction`], run at
//! the position it was declared.

use crate::capability::feature::Access;
use crate::endpoint::{EndpointInventory, EndpointTarget};
use crate::error::CommandError;
use crate::radio::Radio;
use crate::zcl::ReportConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use strum::{Display, EnumString};

/// Kind of a configure step or radio command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    Bind,
    Read,
    ConfigureReporting,
    Write,
    Command,
    Custom,
}

/// Everything a custom action may touch.
pub struct ActionContext<'a> {
    /// IEEE address of the device being configured
    pub device: &'a str,
    /// Physical endpoint the step resolved to
    pub endpoint: u8,
    pub inventory: &'a EndpointInventory,
    pub radio: &'a dyn Radio,
    pub coordinator_endpoint: u8,
}

/// A configure action that is not a plain bind/read/report step.
#[async_trait]
pub trait ConfigureAction: Send + Sync {
    async fn run(&self, ctx: &ActionContext<'_>) -> Result<(), CommandError>;

    /// Cluster the action talks to, used to pick a `Supporting` endpoint.
    fn cluster(&self) -> Option<&str> {
        None
    }
}

/// One ordered configuration action.
#[derive(Clone)]
pub enum ConfigureStep {
    Bind {
        endpoint: EndpointTarget,
        cluster: String,
    },
    Read {
        endpoint: EndpointTarget,
        cluster: String,
        attributes: Vec<String>,
    },
    ConfigureReporting {
        endpoint: EndpointTarget,
        cluster: String,
        attribute: String,
        /// `None` takes the default for the attribute
        config: Option<ReportConfig>,
    },
    Custom {
        name: String,
        endpoint: EndpointTarget,
        action: Arc<dyn ConfigureAction>,
    },
}

impl ConfigureStep {
    pub fn bind(cluster: impl Into<String>) -> Self {
        ConfigureStep::Bind {
            endpoint: EndpointTarget::Supporting,
            cluster: cluster.into(),
        }
    }

    pub fn read<S: Into<String>>(cluster: impl Into<String>, attributes: impl IntoIterator<Item = S>) -> Self {
        ConfigureStep::Read {
            endpoint: EndpointTarget::Supporting,
            cluster: cluster.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn report(cluster: impl Into<String>, attribute: impl Into<String>, config: Option<ReportConfig>) -> Self {
        ConfigureStep::ConfigureReporting {
            endpoint: EndpointTarget::Supporting,
            cluster: cluster.into(),
            attribute: attribute.into(),
            config,
        }
    }

    pub fn custom(name: impl Into<String>, action: impl ConfigureAction + 'static) -> Self {
        ConfigureStep::Custom {
            name: name.into(),
            endpoint: EndpointTarget::Supporting,
            action: Arc::new(action),
        }
    }

    /// Address the step to `target`.
    pub fn on(mut self, target: EndpointTarget) -> Self {
        match &mut self {
            ConfigureStep::Bind { endpoint, .. }
            | ConfigureStep::Read { endpoint, .. }
            | ConfigureStep::ConfigureReporting { endpoint, .. }
            | ConfigureStep::Custom { endpoint, .. } => *endpoint = target,
        }
        self
    }

    /// Address to `target` only when it is given.
    pub fn on_opt(self, target: Option<&EndpointTarget>) -> Self {
        match target {
            Some(target) => self.on(target.clone()),
            None => self,
        }
    }

    pub fn endpoint(&self) -> &EndpointTarget {
        match self {
            ConfigureStep::Bind { endpoint, .. }
            | ConfigureStep::Read { endpoint, .. }
            | ConfigureStep::ConfigureReporting { endpoint, .. }
            | ConfigureStep::Custom { endpoint, .. } => endpoint,
        }
    }

    pub fn cluster(&self) -> Option<&str> {
        match self {
            ConfigureStep::Bind { cluster, .. }
            | ConfigureStep::Read { cluster, .. }
            | ConfigureStep::ConfigureReporting { cluster, .. } => Some(cluster),
            ConfigureStep::Custom { action, .. } => action.cluster(),
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            ConfigureStep::Bind { .. } => StepKind::Bind,
            ConfigureStep::Read { .. } => StepKind::Read,
            ConfigureStep::ConfigureReporting { .. } => StepKind::ConfigureReporting,
            ConfigureStep::Custom { .. } => StepKind::Custom,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ConfigureStep::Custom { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            ConfigureStep::Bind { cluster, .. } if cluster.is_empty() => {
                Err("bind without cluster".to_string())
            }
            ConfigureStep::Read { cluster, attributes, .. } => {
                if cluster.is_empty() {
                    Err("read without cluster".to_string())
                } else if attributes.is_empty() || attributes.iter().any(|a| a.is_empty()) {
                    Err(format!("read of {cluster} without attributes"))
                } else {
                    Ok(())
                }
            }
            ConfigureStep::ConfigureReporting {
                cluster,
                attribute,
                config,
                ..
            } => {
                if cluster.is_empty() || attribute.is_empty() {
                    Err("reporting step without cluster or attribute".to_string())
                } else if let Some(config) = config
                    && config.max != 0
                    && config.min > config.max
                {
                    Err(format!(
                        "reporting {cluster}.{attribute} has min {} above max {}",
                        config.min, config.max
                    ))
                } else {
                    Ok(())
                }
            }
            ConfigureStep::Custom { name, .. } if name.is_empty() => {
                Err("custom step without name".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ConfigureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigureStep::Bind { endpoint, cluster } => f
                .debug_struct("Bind")
                .field("endpoint", endpoint)
                .field("cluster", cluster)
                .finish(),
            ConfigureStep::Read {
                endpoint,
                cluster,
                attributes,
            } => f
                .debug_struct("Read")
                .field("endpoint", endpoint)
                .field("cluster", cluster)
                .field("attributes", attributes)
                .finish(),
            ConfigureStep::ConfigureReporting {
                endpoint,
                cluster,
                attribute,
                config,
            } => f
                .debug_struct("ConfigureReporting")
                .field("endpoint", endpoint)
                .field("cluster", cluster)
                .field("attribute", attribute)
                .field("config", config)
                .finish(),
            ConfigureStep::Custom { name, endpoint, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("endpoint", endpoint)
                .finish_non_exhaustive(),
        }
    }
}

/// Bind, configure reporting and read steps for one readable attribute.
///
/// Reporting is set up only when a config is given; the attribute is read
/// once when the feature can be polled.
pub fn reporting_steps(
    target: Option<&EndpointTarget>,
    cluster: &str,
    attribute: &str,
    config: Option<ReportConfig>,
    access: Access,
) -> Vec<ConfigureStep> {
    let mut steps = Vec::new();
    if config.is_some() {
        steps.push(ConfigureStep::bind(cluster).on_opt(target));
        steps.push(ConfigureStep::report(cluster, attribute, config).on_opt(target));
    }
    if access.is_gettable() {
        steps.push(ConfigureStep::read(cluster, [attribute]).on_opt(target));
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zcl::ReportingInterval;

    struct Noop;

    #[async_trait]
    impl ConfigureAction for Noop {
        async fn run(&self, _ctx: &ActionContext<'_>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn test_builders_and_targets() {
        let step = ConfigureStep::read("genOnOff", ["onOff"]).on(EndpointTarget::named("l2"));
        assert_eq!(step.kind(), StepKind::Read);
        assert_eq!(step.cluster(), Some("genOnOff"));
        assert_eq!(step.endpoint(), &EndpointTarget::named("l2"));

        let custom = ConfigureStep::custom("noop", Noop);
        assert!(custom.is_custom());
        assert_eq!(custom.cluster(), None);
        assert!(format!("{custom:?}").contains("noop"));
    }

    #[test]
    fn test_validation() {
        assert!(ConfigureStep::bind("").validate().is_err());
        assert!(ConfigureStep::read("genBasic", Vec::<String>::new()).validate().is_err());
        let inverted = ConfigureStep::report(
            "genOnOff",
            "onOff",
            Some(ReportConfig::new(ReportingInterval::OneHour, 10u16, 1)),
        );
        assert!(inverted.validate().is_err());
        assert!(ConfigureStep::report("genOnOff", "onOff", None).validate().is_ok());
    }

    #[test]
    fn test_reporting_steps() {
        let config = ReportConfig::new(ReportingInterval::Min, ReportingInterval::OneHour, 0);
        let steps = reporting_steps(None, "hvacThermostat", "occupancy", Some(config), Access::All);
        let kinds: Vec<StepKind> = steps.iter().map(ConfigureStep::kind).collect();
        assert_eq!(kinds, vec![StepKind::Bind, StepKind::ConfigureReporting, StepKind::Read]);

        let state_only = reporting_steps(None, "genOnOff", "onOff", None, Access::State);
        assert!(state_only.is_empty());
    }
}
