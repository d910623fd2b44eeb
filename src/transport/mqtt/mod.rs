//! MQTT link to the coordinator bridge.
//!
//! Radio commands go out as JSON requests and are correlated with their
//! responses by id. Device announcements and ZCL messages come in on event
//! topics and are served by [`CoordinatorBridge`].

mod bridge;
mod client;
mod radio;

pub use bridge::CoordinatorBridge;
pub use client::{MqttClient, MqttMessage};
pub use radio::{MqttRadio, RadioRequest, RadioResponse};
