use crate::capability::{ActionContext, CapabilityDescriptor, ConfigureAction, ConfigureStep};
use crate::endpoint::EndpointTarget;
use crate::error::CommandError;
use crate::zcl::cluster::GEN_BASIC;
use async_trait::async_trait;
use log::debug;

/// Basic-cluster read that switches many Tuya devices out of their
/// proprietary mode.
///
/// The firmware only reacts to this exact attribute set in one request, so it
/// bypasses the planner's batching.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuyaMagicPacket;

const MAGIC_ATTRIBUTES: [&str; 6] = [
    "manufacturerName",
    "zclVersion",
    "appVersion",
    "modelId",
    "powerSource",
    "65534",
];

#[async_trait]
impl ConfigureAction for TuyaMagicPacket {
    async fn run(&self, ctx: &ActionContext<'_>) -> Result<(), CommandError> {
        debug!("[Configure] Sending Tuya magic packet to {} endpoint {}", ctx.device, ctx.endpoint);
        ctx.radio
            .read(ctx.device, ctx.endpoint, GEN_BASIC, &MAGIC_ATTRIBUTES)
            .await
            .map(|_| ())
    }

    fn cluster(&self) -> Option<&str> {
        Some(GEN_BASIC)
    }
}

/// Capability contributing only the magic packet, on endpoint 1.
pub fn tuya_magic_packet() -> CapabilityDescriptor {
    CapabilityDescriptor::new("tuya_magic_packet")
        .step(ConfigureStep::custom("tuya_magic_packet", TuyaMagicPacket).on(EndpointTarget::Physical(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointInventory;
    use crate::radio::{DryRunRadio, RadioCommand};

    #[tokio::test]
    async fn test_magic_packet_is_one_read() {
        let radio = DryRunRadio::new();
        let inventory = EndpointInventory::from_ids([1]);
        let ctx = ActionContext {
            device: "0x00124b0001",
            endpoint: 1,
            inventory: &inventory,
            radio: &radio,
            coordinator_endpoint: 1,
        };
        TuyaMagicPacket.run(&ctx).await.unwrap();

        let sent = radio.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            RadioCommand::Read { cluster, attributes, .. } => {
                assert_eq!(cluster, GEN_BASIC);
                assert_eq!(attributes.len(), 6);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
