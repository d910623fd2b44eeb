//! Radio commands over MQTT.
//!
//! Each command is published to `<base>/request` with a fresh id. The
//! coordinator answers on `<base>/response` with the same id; the bridge loop
//! hands responses to [`MqttRadio::complete`], which wakes the waiting sender.

use crate::capability::Payload;
use crate::error::CommandError;
use crate::radio::{Radio, RadioCommand};
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Result<Payload, CommandError>>>>>;

#[derive(Debug, Serialize)]
pub struct RadioRequest<'a> {
    pub id: Uuid,
    pub device: &'a str,
    pub command: &'a RadioCommand,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RadioResponse {
    pub id: Uuid,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub error: Option<CommandError>,
}

/// Removes the pending entry when the sender stops waiting, e.g. on timeout.
struct PendingGuard {
    pending: Pending,
    id: Uuid,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

pub struct MqttRadio {
    client: AsyncClient,
    request_topic: String,
    pending: Pending,
}

impl MqttRadio {
    pub fn new(client: AsyncClient, base_topic: &str) -> Self {
        Self {
            client,
            request_topic: format!("{base_topic}/request"),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve the request a response belongs to.
    ///
    /// Returns false for responses nobody waits for anymore.
    pub fn complete(&self, response: RadioResponse) -> bool {
        let Some(tx) = self.pending.lock().remove(&response.id) else {
            debug!("[MQTT] Response {} has no pending request", response.id);
            return false;
        };
        let result = match response.error {
            Some(err) => Err(err),
            None => Ok(response.data),
        };
        tx.send(result).is_ok()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl Radio for MqttRadio {
    async fn send(&self, device: &str, command: &RadioCommand) -> Result<Payload, CommandError> {
        let id = Uuid::new_v4();
        let request = RadioRequest { id, device, command };
        let body = serde_json::to_string(&request).map_err(|e| CommandError::Transport(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };

        debug!("[MQTT] {} <- {} ({})", device, command, id);
        if let Err(e) = self
            .client
            .publish(&self.request_topic, QoS::AtLeastOnce, false, body.into_bytes())
            .await
        {
            warn!("[MQTT] Failed to publish request {}: {:?}", id, e);
            return Err(CommandError::Transport(e.to_string()));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Transport("response channel closed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_parsing() {
        let id = Uuid::new_v4();
        let ok: RadioResponse = serde_json::from_value(json!({
            "id": id,
            "data": {"onOff": 1}
        }))
        .unwrap();
        assert_eq!(ok.error, None);
        assert_eq!(ok.data["onOff"], json!(1));

        let failed: RadioResponse = serde_json::from_value(json!({
            "id": id,
            "error": {"error": "unsupported_attribute", "detail": "acFrequency"}
        }))
        .unwrap();
        assert_eq!(
            failed.error,
            Some(CommandError::UnsupportedAttribute("acFrequency".to_string()))
        );
    }

    #[test]
    fn test_request_serialization() {
        let command = RadioCommand::Read {
            endpoint: 1,
            cluster: "genOnOff".to_string(),
            attributes: vec!["onOff".to_string()],
        };
        let request = RadioRequest {
            id: Uuid::nil(),
            device: "0x00158d0001",
            command: &command,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["device"], "0x00158d0001");
        assert_eq!(json["command"]["kind"], "read");
        assert_eq!(json["command"]["attributes"], json!(["onOff"]));
    }

    #[tokio::test]
    async fn test_complete_unknown_id() {
        let (client, _event_loop) = AsyncClient::new(rumqttc::MqttOptions::new("test", "localhost", 1883), 10);
        let radio = MqttRadio::new(client, "zigbee");
        let response = RadioResponse {
            id: Uuid::new_v4(),
            data: Payload::new(),
            error: None,
        };
        assert!(!radio.complete(response));
        assert_eq!(radio.pending_count(), 0);
    }
}
