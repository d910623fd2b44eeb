//! One command in flight per device.
//!
//! Zigbee devices answer one request at a time. [`SerialRadio`] wraps another
//! [`Radio`] and queues commands per IEEE address, so a configuration run, a
//! run superseding it after a re-announce and runtime set/get requests never
//! overlap on the same device. Different devices still proceed concurrently.

use super::{Radio, RadioCommand};
use crate::capability::Payload;
use crate::error::CommandError;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as DeviceLock;

pub struct SerialRadio {
    inner: Arc<dyn Radio>,
    devices: Mutex<HashMap<String, Arc<DeviceLock<()>>>>,
}

impl SerialRadio {
    pub fn new(inner: Arc<dyn Radio>) -> Self {
        Self {
            inner,
            devices: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, device: &str) -> Arc<DeviceLock<()>> {
        self.devices
            .lock()
            .entry(device.to_string())
            .or_insert_with(|| Arc::new(DeviceLock::new(())))
            .clone()
    }
}

#[async_trait]
impl Radio for SerialRadio {
    async fn send(&self, device: &str, command: &RadioCommand) -> Result<Payload, CommandError> {
        let lock = self.lock_for(device);
        let _turn = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("[Radio] {} busy, queueing {}", device, command);
                lock.lock().await
            }
        };
        self.inner.send(device, command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::library::{OnOffArgs, on_off};
    use crate::compose::compose;
    use crate::endpoint::EndpointInventory;
    use crate::executor::{ConfigurationExecutor, Device, ExecutorState};
    use crate::radio::BindTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Records the highest number of commands outstanding at once per device.
    #[derive(Default)]
    struct OverlapRadio {
        in_flight: Mutex<HashMap<String, usize>>,
        max_in_flight: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
        peak_total: AtomicUsize,
    }

    impl OverlapRadio {
        fn peak(&self, device: &str) -> usize {
            self.max_in_flight.lock().get(device).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Radio for OverlapRadio {
        async fn send(&self, device: &str, _command: &RadioCommand) -> Result<Payload, CommandError> {
            {
                let mut in_flight = self.in_flight.lock();
                let count = in_flight.entry(device.to_string()).or_default();
                *count += 1;
                let mut max = self.max_in_flight.lock();
                let peak = max.entry(device.to_string()).or_default();
                *peak = (*peak).max(*count);
            }
            let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_total.fetch_max(total, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;

            self.total.fetch_sub(1, Ordering::SeqCst);
            *self.in_flight.lock().entry(device.to_string()).or_default() -= 1;
            Ok(Payload::new())
        }
    }

    fn bind(endpoint: u8) -> RadioCommand {
        RadioCommand::Bind {
            endpoint,
            cluster: "genOnOff".to_string(),
            target: BindTarget::default(),
        }
    }

    #[tokio::test]
    async fn test_same_device_is_serialized() {
        let inner = Arc::new(OverlapRadio::default());
        let radio = SerialRadio::new(inner.clone());

        let (b1, b2, b3) = (bind(1), bind(2), bind(3));
        let (a, b, c) = tokio::join!(
            radio.send("0x01", &b1),
            radio.send("0x01", &b2),
            radio.send("0x01", &b3),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(inner.peak("0x01"), 1);
    }

    #[tokio::test]
    async fn test_other_devices_run_concurrently() {
        let inner = Arc::new(OverlapRadio::default());
        let radio = SerialRadio::new(inner.clone());

        let (b1, b2) = (bind(1), bind(1));
        let _ = tokio::join!(radio.send("0x01", &b1), radio.send("0x02", &b2));
        assert_eq!(inner.peak("0x01"), 1);
        assert_eq!(inner.peak("0x02"), 1);
        assert_eq!(inner.peak_total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_superseding_run_waits_for_in_flight_command() {
        let inner = Arc::new(OverlapRadio::default());
        let radio: Arc<dyn Radio> = Arc::new(SerialRadio::new(inner.clone()));
        let executor = ConfigurationExecutor::new(radio.clone());
        let descriptor = compose(&[on_off(OnOffArgs::default())]).unwrap();
        let device = Device::new("0x01", EndpointInventory::default().with(1, ["genBasic", "genOnOff"]));

        let first = CancellationToken::new();
        let superseded = executor.execute(&device, &descriptor, &first);
        let replacement = async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            first.cancel();
            executor.execute(&device, &descriptor, &CancellationToken::new()).await
        };
        let (_, outcome) = tokio::join!(superseded, replacement);

        assert_eq!(inner.peak("0x01"), 1);
        assert_eq!(outcome.state, ExecutorState::Done);
        assert!(outcome.failures.is_empty());
    }
}
