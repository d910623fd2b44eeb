//! Radio that records commands instead of sending them.

use super::{Radio, RadioCommand};
use crate::capability::Payload;
use crate::error::CommandError;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::time::Duration;

type FailurePredicate = Box<dyn Fn(&RadioCommand) -> Option<CommandError> + Send + Sync>;

/// Acknowledges every command, optionally failing selected ones.
///
/// Used by the planning CLI and throughout the tests.
#[derive(Default)]
pub struct DryRunRadio {
    sent: Mutex<Vec<(String, RadioCommand)>>,
    fail_when: Option<FailurePredicate>,
    delay: Option<Duration>,
}

impl DryRunRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command for which `predicate` returns an error.
    pub fn failing<F>(predicate: F) -> Self
    where
        F: Fn(&RadioCommand) -> Option<CommandError> + Send + Sync + 'static,
    {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::default()
        }
    }

    /// Simulated round-trip time per command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All commands sent so far, in order.
    pub fn sent(&self) -> Vec<RadioCommand> {
        self.sent.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    /// Commands sent to one device, in order.
    pub fn sent_to(&self, device: &str) -> Vec<RadioCommand> {
        self.sent
            .lock()
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Radio for DryRunRadio {
    async fn send(&self, device: &str, command: &RadioCommand) -> Result<Payload, CommandError> {
        debug!("[DryRun] {} <- {}", device, command);
        self.sent.lock().push((device.to_string(), command.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.fail_when.as_ref().and_then(|f| f(command)) {
            Some(err) => Err(err),
            None => Ok(Payload::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::BindTarget;

    #[tokio::test]
    async fn test_records_in_order() {
        let radio = DryRunRadio::new();
        radio
            .bind("0x01", 1, "genOnOff", BindTarget::default())
            .await
            .unwrap();
        radio.read("0x02", 1, "genBasic", &["zclVersion"]).await.unwrap();

        assert_eq!(radio.sent().len(), 2);
        assert_eq!(radio.sent_to("0x02")[0].cluster(), "genBasic");
        radio.clear();
        assert!(radio.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_predicate() {
        let radio = DryRunRadio::failing(|command| {
            (command.cluster() == "seMetering").then(|| CommandError::UnsupportedCluster("seMetering".into()))
        });

        assert!(radio.read("0x01", 1, "genOnOff", &["onOff"]).await.is_ok());
        let err = radio
            .read("0x01", 1, "seMetering", &["currentSummDelivered"])
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::UnsupportedCluster("seMetering".to_string()));
        // failed commands are still recorded
        assert_eq!(radio.sent().len(), 2);
    }
}
