use crate::executor::ExecutorOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            // Env vars already set take precedence
            if std::env::var(key).is_err() {
                // SAFETY: called at startup before the async runtime spawns threads
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub configure: ConfigureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic prefix of the coordinator bridge
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "zigbee-capability-bridge".to_string(),
            username: None,
            password: None,
            base_topic: "zigbee".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureConfig {
    /// Per-command timeout in milliseconds, 0 disables it
    pub command_timeout_ms: u64,
    pub coordinator_endpoint: u8,
}

impl Default for ConfigureConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 10_000,
            coordinator_endpoint: 1,
        }
    }
}

impl ConfigureConfig {
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            coordinator_endpoint: self.coordinator_endpoint,
            command_timeout: (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms)),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(base_topic) = std::env::var("MQTT_BASE_TOPIC") {
            config.mqtt.base_topic = base_topic.trim_end_matches('/').to_string();
        }

        // Configuration runs
        if let Ok(timeout) = std::env::var("CONFIGURE_COMMAND_TIMEOUT_MS")
            && let Ok(t) = timeout.parse()
        {
            config.configure.command_timeout_ms = t;
        }
        if let Ok(endpoint) = std::env::var("COORDINATOR_ENDPOINT")
            && let Ok(e) = endpoint.parse()
        {
            config.configure.coordinator_endpoint = e;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_options_from_config() {
        let options = ConfigureConfig::default().executor_options();
        assert_eq!(options.command_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.coordinator_endpoint, 1);

        let unlimited = ConfigureConfig {
            command_timeout_ms: 0,
            coordinator_endpoint: 242,
        }
        .executor_options();
        assert_eq!(unlimited.command_timeout, None);
        assert_eq!(unlimited.coordinator_endpoint, 242);
    }
}
