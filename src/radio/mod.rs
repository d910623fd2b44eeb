//! Radio command interface.
//!
//! The composition engine never talks to hardware directly. It produces
//! [`RadioCommand`]s and hands them, one at a time per device, to a [`Radio`]
//! implementation: the MQTT transport in the bridge service, or
//! [`DryRunRadio`] for planning and tests. [`SerialRadio`] keeps a single
//! command in flight per device in front of either.

mod dry_run;
mod serial;

pub use dry_run::DryRunRadio;
pub use serial::SerialRadio;

use crate::capability::{Payload, StepKind};
use crate::error::CommandError;
use crate::zcl::ReportingItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination of a bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BindTarget {
    Coordinator { endpoint: u8 },
    Group { id: u16 },
}

impl Default for BindTarget {
    fn default() -> Self {
        BindTarget::Coordinator { endpoint: 1 }
    }
}

/// One command addressed to one endpoint of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RadioCommand {
    Bind {
        endpoint: u8,
        cluster: String,
        target: BindTarget,
    },
    Read {
        endpoint: u8,
        cluster: String,
        attributes: Vec<String>,
    },
    ConfigureReporting {
        endpoint: u8,
        cluster: String,
        items: Vec<ReportingItem>,
    },
    Write {
        endpoint: u8,
        cluster: String,
        attributes: Payload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manufacturer_code: Option<u16>,
    },
    Command {
        endpoint: u8,
        cluster: String,
        command: String,
        #[serde(default)]
        payload: Payload,
    },
}

impl RadioCommand {
    pub fn kind(&self) -> StepKind {
        match self {
            RadioCommand::Bind { .. } => StepKind::Bind,
            RadioCommand::Read { .. } => StepKind::Read,
            RadioCommand::ConfigureReporting { .. } => StepKind::ConfigureReporting,
            RadioCommand::Write { .. } => StepKind::Write,
            RadioCommand::Command { .. } => StepKind::Command,
        }
    }

    pub fn endpoint(&self) -> u8 {
        match self {
            RadioCommand::Bind { endpoint, .. }
            | RadioCommand::Read { endpoint, .. }
            | RadioCommand::ConfigureReporting { endpoint, .. }
            | RadioCommand::Write { endpoint, .. }
            | RadioCommand::Command { endpoint, .. } => *endpoint,
        }
    }

    pub fn cluster(&self) -> &str {
        match self {
            RadioCommand::Bind { cluster, .. }
            | RadioCommand::Read { cluster, .. }
            | RadioCommand::ConfigureReporting { cluster, .. }
            | RadioCommand::Write { cluster, .. }
            | RadioCommand::Command { cluster, .. } => cluster,
        }
    }

    /// Attribute names carried by the command, for failure reports.
    pub fn attributes(&self) -> Vec<String> {
        match self {
            RadioCommand::Bind { .. } => Vec::new(),
            RadioCommand::Read { attributes, .. } => attributes.clone(),
            RadioCommand::ConfigureReporting { items, .. } => {
                items.iter().map(|i| i.attribute.clone()).collect()
            }
            RadioCommand::Write { attributes, .. } => attributes.keys().cloned().collect(),
            RadioCommand::Command { command, .. } => vec![command.clone()],
        }
    }
}

impl fmt::Display for RadioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioCommand::Bind { .. } => {
                write!(f, "{} {} on endpoint {}", self.kind(), self.cluster(), self.endpoint())
            }
            _ => write!(
                f,
                "{} {} [{}] on endpoint {}",
                self.kind(),
                self.cluster(),
                self.attributes().join(", "),
                self.endpoint()
            ),
        }
    }
}

/// Half-duplex command channel to devices.
///
/// Callers issue at most one command per device at a time and await it.
/// Retries, if any, belong to the implementation.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Send one command to `device` (IEEE address) and wait for its outcome.
    ///
    /// Returns the response payload, e.g. attribute values of a read.
    async fn send(&self, device: &str, command: &RadioCommand) -> Result<Payload, CommandError>;

    async fn bind(
        &self,
        device: &str,
        endpoint: u8,
        cluster: &str,
        target: BindTarget,
    ) -> Result<(), CommandError> {
        let command = RadioCommand::Bind {
            endpoint,
            cluster: cluster.to_string(),
            target,
        };
        self.send(device, &command).await.map(|_| ())
    }

    async fn read(
        &self,
        device: &str,
        endpoint: u8,
        cluster: &str,
        attributes: &[&str],
    ) -> Result<Payload, CommandError> {
        let command = RadioCommand::Read {
            endpoint,
            cluster: cluster.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        };
        self.send(device, &command).await
    }

    async fn configure_reporting(
        &self,
        device: &str,
        endpoint: u8,
        cluster: &str,
        items: Vec<ReportingItem>,
    ) -> Result<(), CommandError> {
        let command = RadioCommand::ConfigureReporting {
            endpoint,
            cluster: cluster.to_string(),
            items,
        };
        self.send(device, &command).await.map(|_| ())
    }

    async fn write(
        &self,
        device: &str,
        endpoint: u8,
        cluster: &str,
        attributes: Payload,
        manufacturer_code: Option<u16>,
    ) -> Result<(), CommandError> {
        let command = RadioCommand::Write {
            endpoint,
            cluster: cluster.to_string(),
            attributes,
            manufacturer_code,
        };
        self.send(device, &command).await.map(|_| ())
    }

    async fn command(
        &self,
        device: &str,
        endpoint: u8,
        cluster: &str,
        command: &str,
        payload: Payload,
    ) -> Result<Payload, CommandError> {
        let command = RadioCommand::Command {
            endpoint,
            cluster: cluster.to_string(),
            command: command.to_string(),
            payload,
        };
        self.send(device, &command).await
    }
}
