//! Coordinator bridge service.
//!
//! Listens to the coordinator on `<base>/...` topics:
//! - `event/joined`, `event/interview`: a device announced itself, find its
//!   definition and start a configuration run
//! - `event/left`: cancel the device's run
//! - `event/message`: inbound ZCL message, translated and published as
//!   device state on `device/<ieee>`
//! - `device/<ieee>/set`, `device/<ieee>/get`: feature requests
//! - `response`: radio command responses
//!
//! Configuration runs publish their outcome on `device/<ieee>/configured`.

use super::client::{MqttClient, MqttMessage};
use super::radio::{MqttRadio, RadioResponse};
use crate::capability::{Message, Payload};
use crate::config::Config;
use crate::devices::DefinitionRegistry;
use crate::dispatch::Dispatcher;
use crate::error::{BridgeError, CommandError, Result};
use crate::executor::{ConfigurationExecutor, Device};
use crate::radio::{Radio, RadioCommand, SerialRadio};
use crate::zcl::MessageKind;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, QoS};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What an incoming topic addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Response,
    Joined,
    Left,
    Message,
    Set(String),
    Get(String),
}

impl Route {
    pub(crate) fn parse(base: &str, topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix(base)?.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            ["response"] => Some(Route::Response),
            ["event", "joined"] | ["event", "interview"] => Some(Route::Joined),
            ["event", "left"] => Some(Route::Left),
            ["event", "message"] => Some(Route::Message),
            ["device", ieee, "set"] => Some(Route::Set(ieee.to_string())),
            ["device", ieee, "get"] => Some(Route::Get(ieee.to_string())),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeftEvent {
    ieee: String,
}

#[derive(Debug, Deserialize)]
struct MessageEvent {
    ieee: String,
    message: Message,
}

/// Per-device state while the device is known to the bridge.
struct Session {
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    run: JoinHandle<()>,
}

pub struct CoordinatorBridge {
    config: Config,
    registry: Arc<DefinitionRegistry>,
}

/// Shared handles used by message handlers and spawned tasks.
///
/// Everything sent to devices goes through `serial`, so a device never has
/// more than one request outstanding.
#[derive(Clone)]
struct Context {
    base: String,
    client: AsyncClient,
    radio: Arc<MqttRadio>,
    serial: Arc<SerialRadio>,
    executor: ConfigurationExecutor,
    command_timeout: Option<Duration>,
}

impl Context {
    fn state_topic(&self, ieee: &str) -> String {
        format!("{}/device/{}", self.base, ieee)
    }

    async fn publish_json(&self, topic: &str, value: &impl serde::Serialize) {
        let body = match serde_json::to_string(value) {
            Ok(body) => body,
            Err(e) => {
                warn!("[MQTT] Failed to encode payload for {}: {}", topic, e);
                return;
            }
        };
        if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, false, body.into_bytes()).await {
            warn!("[MQTT] Failed to publish to {}: {:?}", topic, e);
        }
    }
}

impl CoordinatorBridge {
    pub fn new(config: Config, registry: Arc<DefinitionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Connect, subscribe and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mqtt = &self.config.mqtt;
        info!("[MQTT] Connecting to {}:{}", mqtt.broker_host, mqtt.broker_port);

        let mqtt_client = MqttClient::new(mqtt);
        let client = mqtt_client.client();
        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(256);
        let (connected_tx, connected_rx) = oneshot::channel();

        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });

        match tokio::time::timeout(Duration::from_secs(10), connected_rx).await {
            Ok(Ok(())) => info!("[MQTT] Connection established, subscribing to topics"),
            Ok(Err(_)) => {
                mqtt_loop.abort();
                return Err(BridgeError::IoError(std::io::Error::other("connection signal dropped")));
            }
            Err(_) => {
                mqtt_loop.abort();
                return Err(BridgeError::IoError(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "no connection after 10 seconds",
                )));
            }
        }

        let base = mqtt.base_topic.clone();
        for topic in [
            format!("{base}/response"),
            format!("{base}/event/#"),
            format!("{base}/device/+/set"),
            format!("{base}/device/+/get"),
        ] {
            client.subscribe(&topic, QoS::AtLeastOnce).await?;
        }

        let radio = Arc::new(MqttRadio::new(client.clone(), &base));
        let serial = Arc::new(SerialRadio::new(radio.clone()));
        let options = self.config.configure.executor_options();
        let executor = ConfigurationExecutor::new(serial.clone()).with_options(options);
        let ctx = Context {
            base: base.clone(),
            client,
            radio,
            serial,
            executor,
            command_timeout: options.command_timeout,
        };
        let mut sessions: HashMap<String, Session> = HashMap::new();

        info!("[MQTT] Bridge serving {} device definitions", self.registry.len());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("[MQTT] Shutting down, cancelling {} sessions", sessions.len());
                    break;
                }
                msg = msg_rx.recv() => {
                    let Some(msg) = msg else {
                        warn!("[MQTT] Event loop stopped");
                        break;
                    };
                    self.handle(&ctx, &mut sessions, &shutdown, msg).await;
                }
            }
        }

        for session in sessions.values() {
            session.cancel.cancel();
        }
        mqtt_loop.abort();
        Ok(())
    }

    async fn handle(
        &self,
        ctx: &Context,
        sessions: &mut HashMap<String, Session>,
        shutdown: &CancellationToken,
        msg: MqttMessage,
    ) {
        let Some(route) = Route::parse(&ctx.base, &msg.topic) else {
            debug!("[MQTT] Ignoring topic {}", msg.topic);
            return;
        };

        match route {
            Route::Response => match serde_json::from_str::<RadioResponse>(&msg.payload) {
                Ok(response) => {
                    ctx.radio.complete(response);
                }
                Err(e) => warn!("[MQTT] Malformed response: {}", e),
            },
            Route::Joined => match serde_json::from_str::<Device>(&msg.payload) {
                Ok(device) => self.device_joined(ctx, sessions, shutdown, device),
                Err(e) => warn!("[MQTT] Malformed device announcement: {}", e),
            },
            Route::Left => match serde_json::from_str::<LeftEvent>(&msg.payload) {
                Ok(left) => {
                    if let Some(session) = sessions.remove(&left.ieee) {
                        info!("[MQTT] {} left, cancelling its configuration", left.ieee);
                        session.cancel.cancel();
                    }
                }
                Err(e) => warn!("[MQTT] Malformed leave event: {}", e),
            },
            Route::Message => match serde_json::from_str::<MessageEvent>(&msg.payload) {
                Ok(event) => {
                    let Some(session) = sessions.get(&event.ieee) else {
                        debug!("[MQTT] Message from unknown device {}", event.ieee);
                        return;
                    };
                    if let Some(state) = session.dispatcher.inbound(&event.message) {
                        ctx.publish_json(&ctx.state_topic(&event.ieee), &state).await;
                    }
                }
                Err(e) => warn!("[MQTT] Malformed device message: {}", e),
            },
            Route::Set(ieee) | Route::Get(ieee) if !sessions.contains_key(&ieee) => {
                warn!("[MQTT] Request for unknown device {}", ieee);
            }
            Route::Set(ieee) => {
                let Some(session) = sessions.get(&ieee) else { return };
                let Some(request) = parse_object(&msg.payload) else {
                    warn!("[MQTT] Set request for {} is not a JSON object", ieee);
                    return;
                };
                for (key, value) in request {
                    match session.dispatcher.set(&key, &value) {
                        Ok(command) => spawn_request(ctx.clone(), session.dispatcher.clone(), ieee.clone(), command),
                        Err(e) => warn!("[Dispatch] {}: {}", ieee, e),
                    }
                }
            }
            Route::Get(ieee) => {
                let Some(session) = sessions.get(&ieee) else { return };
                let Some(request) = parse_object(&msg.payload) else {
                    warn!("[MQTT] Get request for {} is not a JSON object", ieee);
                    return;
                };
                for key in request.keys() {
                    match session.dispatcher.get(key) {
                        Ok(command) => spawn_request(ctx.clone(), session.dispatcher.clone(), ieee.clone(), command),
                        Err(e) => warn!("[Dispatch] {}: {}", ieee, e),
                    }
                }
            }
        }
    }

    fn device_joined(
        &self,
        ctx: &Context,
        sessions: &mut HashMap<String, Session>,
        shutdown: &CancellationToken,
        device: Device,
    ) {
        let Some(model_id) = device.model.as_deref() else {
            warn!("[MQTT] {} announced without a model id", device.ieee);
            return;
        };
        let Some(entry) = self.registry.find(model_id, device.manufacturer.as_deref()) else {
            warn!("[MQTT] {}: {}", device.ieee, BridgeError::UnknownModel(model_id.to_string()));
            return;
        };
        info!(
            "[MQTT] {} is a {} {} ({})",
            device.ieee, entry.definition.vendor, entry.definition.model, entry.definition.description
        );

        // A re-announce supersedes the running configuration, which stops
        // after its in-flight command. The new run starts once it has.
        let previous = sessions.remove(&device.ieee).map(|previous| {
            previous.cancel.cancel();
            previous.run
        });
        let cancel = shutdown.child_token();
        let dispatcher = Arc::new(Dispatcher::new(entry.descriptor.clone(), device.endpoints.clone()));
        let ieee = device.ieee.clone();

        let run = {
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            let descriptor = entry.descriptor.clone();
            tokio::spawn(async move {
                if let Some(previous) = previous {
                    debug!("[MQTT] {} waiting for the superseded run to stop", device.ieee);
                    let _ = previous.await;
                }
                let outcome = ctx.executor.execute(&device, &descriptor, &cancel).await;
                let topic = format!("{}/configured", ctx.state_topic(&device.ieee));
                ctx.publish_json(&topic, &outcome).await;
            })
        };
        sessions.insert(ieee, Session { dispatcher, cancel, run });
    }
}

fn parse_object(payload: &str) -> Option<Payload> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Send a runtime command and publish whatever state the response carries.
fn spawn_request(ctx: Context, dispatcher: Arc<Dispatcher>, ieee: String, command: RadioCommand) {
    tokio::spawn(async move {
        let sent = ctx.serial.send(&ieee, &command);
        let result = match ctx.command_timeout {
            Some(limit) => tokio::time::timeout(limit, sent)
                .await
                .unwrap_or_else(|_| Err(CommandError::Timeout(limit.as_millis() as u64))),
            None => sent.await,
        };
        match result {
            Ok(data) => {
                if !matches!(command, RadioCommand::Read { .. }) || data.is_empty() {
                    return;
                }
                let msg = Message::new(command.cluster(), MessageKind::ReadResponse, command.endpoint(), data);
                if let Some(state) = dispatcher.inbound(&msg) {
                    ctx.publish_json(&ctx.state_topic(&ieee), &state).await;
                }
            }
            Err(e) => error!("[MQTT] {} <- {} failed: {}", ieee, command, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parsing() {
        assert_eq!(Route::parse("zigbee", "zigbee/response"), Some(Route::Response));
        assert_eq!(Route::parse("zigbee", "zigbee/event/interview"), Some(Route::Joined));
        assert_eq!(Route::parse("zigbee", "zigbee/event/left"), Some(Route::Left));
        assert_eq!(
            Route::parse("zigbee", "zigbee/device/0x00124b00/set"),
            Some(Route::Set("0x00124b00".to_string()))
        );
        assert_eq!(
            Route::parse("home/zb", "home/zb/device/0x01/get"),
            Some(Route::Get("0x01".to_string()))
        );
        assert_eq!(Route::parse("zigbee", "zigbee/device/0x01"), None);
        assert_eq!(Route::parse("zigbee", "zigbeex/response"), None);
        assert_eq!(Route::parse("zigbee", "other/response"), None);
    }

    #[test]
    fn test_message_event_parsing() {
        let event: MessageEvent = serde_json::from_str(
            r#"{"ieee": "0x01", "message": {"cluster": "genOnOff", "type": "attributeReport", "endpoint": 2, "data": {"onOff": 1}}}"#,
        )
        .unwrap();
        assert_eq!(event.message.kind, MessageKind::AttributeReport);
        assert_eq!(event.message.endpoint, 2);
    }

    #[test]
    fn test_parse_object() {
        assert!(parse_object(r#"{"state": "ON"}"#).is_some());
        assert!(parse_object(r#""ON""#).is_none());
        assert!(parse_object("not json").is_none());
    }
}
