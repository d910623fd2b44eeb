use crate::capability::StepKind;
use crate::error::{CommandError, ConfigureWarning};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use strum::Display;
use uuid::Uuid;

/// Phase of a configuration run.
///
/// A run walks `Idle -> Binding -> Reading -> ConfiguringReporting -> Done`
/// once per endpoint segment, entering `Custom` for custom steps, and ends in
/// `Done` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Idle,
    Binding,
    Reading,
    ConfiguringReporting,
    Custom,
    Done,
    Cancelled,
}

impl ExecutorState {
    pub(crate) fn for_kind(kind: StepKind) -> Self {
        match kind {
            StepKind::Bind => ExecutorState::Binding,
            StepKind::Read => ExecutorState::Reading,
            StepKind::ConfigureReporting => ExecutorState::ConfiguringReporting,
            StepKind::Write | StepKind::Command | StepKind::Custom => ExecutorState::Custom,
        }
    }
}

/// A command that went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub endpoint: u8,
    pub cluster: String,
    pub attributes: Vec<String>,
    pub kind: StepKind,
}

/// A command that failed, with enough addressing to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandFailure {
    pub device: String,
    pub endpoint: u8,
    pub cluster: String,
    pub attributes: Vec<String>,
    pub kind: StepKind,
    pub error: CommandError,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} endpoint {} {} {} [{}]: {}",
            self.device,
            self.endpoint,
            self.kind,
            self.cluster,
            self.attributes.join(", "),
            self.error
        )
    }
}

/// Run log of one configuration run.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureOutcome {
    pub run_id: Uuid,
    pub device: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: ExecutorState,
    pub succeeded: Vec<CommandRecord>,
    pub failures: Vec<CommandFailure>,
    pub warnings: Vec<ConfigureWarning>,
}

impl ConfigureOutcome {
    pub(crate) fn start(device: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            device: device.to_string(),
            started_at: now,
            finished_at: now,
            state: ExecutorState::Idle,
            succeeded: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, warning: ConfigureWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub(crate) fn finish(&mut self, state: ExecutorState) {
        self.state = state;
        self.finished_at = Utc::now();
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Every command went through and the run was not cancelled.
    pub fn is_complete(&self) -> bool {
        self.state == ExecutorState::Done && self.failures.is_empty()
    }

    pub fn cancelled(&self) -> bool {
        self.state == ExecutorState::Cancelled
    }

    /// Whether a command on `cluster` of `kind` went through.
    pub fn succeeded_on(&self, cluster: &str, kind: StepKind) -> bool {
        self.succeeded.iter().any(|r| r.cluster == cluster && r.kind == kind)
    }
}

impl fmt::Display for ConfigureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            ExecutorState::Cancelled => write!(
                f,
                "cancelled after {} commands with {} failures",
                self.succeeded.len() + self.failures.len(),
                self.failures.len()
            ),
            _ => write!(f, "completed with {} failures", self.failures.len()),
        }
    }
}
