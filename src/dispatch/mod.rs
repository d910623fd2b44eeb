//! Runtime message translation for one device.
//!
//! Inbound messages go to the first matching inbound converter. Set and get
//! requests go to the converter registered last for the feature key. On
//! multi-endpoint definitions published keys carry the logical endpoint
//! name (`state_l1`), and requests may address an endpoint the same way.

use crate::capability::{ConvertContext, Message, Payload, WireRequest};
use crate::compose::UnifiedDescriptor;
use crate::endpoint::{EndpointInventory, Resolution};
use crate::error::ConvertError;
use crate::radio::RadioCommand;
use log::debug;
use serde_json::Value;
use std::sync::Arc;

pub struct Dispatcher {
    descriptor: Arc<UnifiedDescriptor>,
    inventory: EndpointInventory,
    resolution: Resolution,
}

impl Dispatcher {
    pub fn new(descriptor: Arc<UnifiedDescriptor>, inventory: EndpointInventory) -> Self {
        let resolution = descriptor.endpoints.resolve(&inventory);
        Self {
            descriptor,
            inventory,
            resolution,
        }
    }

    pub fn descriptor(&self) -> &UnifiedDescriptor {
        &self.descriptor
    }

    /// Feature updates for an inbound message, `None` when no converter
    /// matches or the converter produced nothing.
    pub fn inbound(&self, msg: &Message) -> Option<Payload> {
        let converter = self.descriptor.inbound_for(msg)?;
        let endpoint_name = self.resolution.name_of(msg.endpoint);
        debug!(
            "[Dispatch] {} {} from endpoint {} -> '{}'",
            msg.cluster, msg.kind, msg.endpoint, converter.name
        );

        let payload = converter.convert(msg, &ConvertContext { endpoint_name })?;
        match endpoint_name {
            Some(name) if self.descriptor.multi_endpoint => Some(
                payload
                    .into_iter()
                    .map(|(key, value)| (format!("{key}_{name}"), value))
                    .collect(),
            ),
            _ => Some(payload),
        }
    }

    /// Radio command for a feature set request.
    pub fn set(&self, key: &str, value: &Value) -> Result<RadioCommand, ConvertError> {
        let (base, endpoint) = self.split_key(key)?;
        let converter = self
            .descriptor
            .outbound_for(base)
            .ok_or_else(|| ConvertError::UnknownKey(key.to_string()))?;
        let request = converter.encode(base, value)?;
        let cluster = match &request {
            WireRequest::Write { cluster, .. } | WireRequest::Command { cluster, .. } => cluster.clone(),
        };
        let endpoint = endpoint.unwrap_or_else(|| self.default_endpoint(&cluster));
        Ok(request.at(endpoint))
    }

    /// Radio command reading a feature back.
    pub fn get(&self, key: &str) -> Result<RadioCommand, ConvertError> {
        let (base, endpoint) = self.split_key(key)?;
        let converter = self
            .descriptor
            .outbound_for(base)
            .ok_or_else(|| ConvertError::UnknownKey(key.to_string()))?;
        let read_back = converter.read(base)?;
        Ok(RadioCommand::Read {
            endpoint: endpoint.unwrap_or_else(|| self.default_endpoint(&read_back.cluster)),
            cluster: read_back.cluster.clone(),
            attributes: read_back.attributes.clone(),
        })
    }

    /// Split `state_l1` into the feature key and its physical endpoint.
    fn split_key<'k>(&self, key: &'k str) -> Result<(&'k str, Option<u8>), ConvertError> {
        if self.descriptor.outbound_for(key).is_some() {
            return Ok((key, None));
        }
        if let Some((base, name)) = key.rsplit_once('_')
            && let Some(endpoint) = self.resolution.physical(name)
        {
            return Ok((base, Some(endpoint)));
        }
        Err(ConvertError::UnknownKey(key.to_string()))
    }

    fn default_endpoint(&self, cluster: &str) -> u8 {
        self.inventory
            .supporting(cluster)
            .first()
            .copied()
            .or_else(|| self.inventory.first())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::library::{OnOffArgs, on_off, temperature};
    use crate::compose::compose;
    use crate::endpoint::EndpointSpec;
    use crate::zcl::MessageKind;
    use serde_json::json;

    fn dual_switch() -> Dispatcher {
        let descriptor = compose(&[on_off(OnOffArgs::endpoints(["l1", "l2"]))])
            .unwrap()
            .with_endpoints(EndpointSpec::fixed([("l1", 1), ("l2", 2)]))
            .with_multi_endpoint(true);
        Dispatcher::new(
            Arc::new(descriptor),
            EndpointInventory::default().with(1, ["genOnOff"]).with(2, ["genOnOff"]),
        )
    }

    #[test]
    fn test_inbound_suffixes_endpoint() {
        let dispatcher = dual_switch();
        let mut data = Payload::new();
        data.insert("onOff".to_string(), json!(0));
        let msg = Message::new("genOnOff", MessageKind::AttributeReport, 2, data);

        let payload = dispatcher.inbound(&msg).unwrap();
        assert_eq!(payload.get("state_l2"), Some(&json!("OFF")));
        assert!(!payload.contains_key("state"));
    }

    #[test]
    fn test_unmatched_message() {
        let dispatcher = dual_switch();
        let msg = Message::new("genLevelCtrl", MessageKind::AttributeReport, 1, Payload::new());
        assert!(dispatcher.inbound(&msg).is_none());
    }

    #[test]
    fn test_set_with_endpoint_suffix() {
        let dispatcher = dual_switch();
        let command = dispatcher.set("state_l2", &json!("ON")).unwrap();
        assert_eq!(command.endpoint(), 2);
        assert_eq!(command.cluster(), "genOnOff");

        let plain = dispatcher.set("state", &json!("TOGGLE")).unwrap();
        assert_eq!(plain.endpoint(), 1);

        assert_eq!(
            dispatcher.set("state_l9", &json!("ON")),
            Err(ConvertError::UnknownKey("state_l9".to_string()))
        );
    }

    #[test]
    fn test_get_and_read_only() {
        let descriptor = compose(&[temperature()]).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(descriptor),
            EndpointInventory::default()
                .with(1, ["genBasic"])
                .with(3, ["msTemperatureMeasurement"]),
        );

        let read = dispatcher.get("temperature").unwrap();
        assert_eq!(read.endpoint(), 3);
        assert_eq!(read.attributes(), vec!["measuredValue".to_string()]);

        assert!(matches!(
            dispatcher.set("temperature", &json!(20)),
            Err(ConvertError::NotWritable { .. })
        ));
    }
}
