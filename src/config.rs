use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::error::{GatewayError, Result};

pub const DEFAULT_BUS_DEVICE: &str = "/dev/i2c-1";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_EVENTS_PATH: &str = "data/events.jsonl";
pub const DEFAULT_NOTIFY_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "LaboGateway/1.0";

// Reserved and 10-bit ranges excluded.
const MIN_ADDRESS: u8 = 0x03;
const MAX_ADDRESS: u8 = 0x77;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub bus: Option<BusConfig>,
    pub gateway: Option<GatewayConfig>,
    pub events: Option<EventsConfig>,
    pub alerts: AlertsConfig,
    pub notifier: Option<NotifierConfig>,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BusConfig {
    pub device: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct GatewayConfig {
    pub poll_interval_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct EventsConfig {
    pub path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AlertsConfig {
    pub email: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct NotifierConfig {
    pub discord_webhook: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub address: u8,
    pub timeout_minutes: u32,
}

impl AppConfig {
    /// Read and validate a configuration file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|err| GatewayError::Config(format!("{}: {}", path.display(), err)))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::de::from_str(contents).map_err(|err| GatewayError::Config(err.to_string()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|err| GatewayError::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(GatewayError::Config("no devices configured".to_string()));
        }
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "device at 0x{:02X} has an empty id",
                    device.address
                )));
            }
            if !(MIN_ADDRESS..=MAX_ADDRESS).contains(&device.address) {
                return Err(GatewayError::Config(format!(
                    "device '{}' address 0x{:02X} outside 0x{:02X}..=0x{:02X}",
                    device.id, device.address, MIN_ADDRESS, MAX_ADDRESS
                )));
            }
        }
        if self.poll_interval().is_zero() {
            return Err(GatewayError::Config(
                "poll_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = self.discord_webhook() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(GatewayError::Config(format!(
                    "discord_webhook is not an http(s) URL: {}",
                    url
                )));
            }
        }
        Ok(())
    }

    pub fn bus_device(&self) -> &str {
        self.bus
            .as_ref()
            .and_then(|b| b.device.as_deref())
            .unwrap_or(DEFAULT_BUS_DEVICE)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.gateway
                .as_ref()
                .and_then(|g| g.poll_interval_seconds)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS),
        )
    }

    pub fn events_path(&self) -> &str {
        self.events
            .as_ref()
            .and_then(|e| e.path.as_deref())
            .unwrap_or(DEFAULT_EVENTS_PATH)
    }

    pub fn discord_webhook(&self) -> Option<&str> {
        self.notifier
            .as_ref()
            .and_then(|n| n.discord_webhook.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(
            self.notifier
                .as_ref()
                .and_then(|n| n.timeout_seconds)
                .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECONDS),
        )
    }

    pub fn user_agent(&self) -> &str {
        self.notifier
            .as_ref()
            .and_then(|n| n.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [alerts]
        email = "lab@example.org"

        [[devices]]
        id = "OSC-01"
        name = "Oscilloscope"
        address = 0x42
        timeout_minutes = 30
    "#;

    #[test]
    fn test_config() {
        let config_str = r#"
            [bus]
            device = "/dev/i2c-0"

            [gateway]
            poll_interval_seconds = 2

            [alerts]
            email = "lab@example.org"

            [notifier]
            discord_webhook = "https://discord.example/api/webhooks/1/abc"
            timeout_seconds = 3

            [[devices]]
            id = "OSC-01"
            name = "Oscilloscope"
            address = 0x42
            timeout_minutes = 30

            [[devices]]
            id = "MUL-01"
            name = "Multimeter"
            address = 0x43
            timeout_minutes = 15
        "#;
        let config = AppConfig::from_toml_str(config_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].address, 0x42);
        assert_eq!(config.bus_device(), "/dev/i2c-0");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.notify_timeout(), Duration::from_secs(3));
        assert!(config.discord_webhook().is_some());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bus_device(), DEFAULT_BUS_DEVICE);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.events_path(), DEFAULT_EVENTS_PATH);
        assert_eq!(config.notify_timeout(), Duration::from_secs(10));
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
        assert!(config.discord_webhook().is_none());
    }

    #[test]
    fn test_json_config() {
        let config_str = r#"{
            "alerts": {"email": "lab@example.org"},
            "devices": [
                {"id": "OSC-01", "name": "Oscilloscope", "address": 66, "timeout_minutes": 30}
            ]
        }"#;
        let config = AppConfig::from_json_str(config_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.devices[0].address, 0x42);
    }

    #[test]
    fn test_missing_alerts_is_config_error() {
        let config_str = r#"
            [[devices]]
            id = "OSC-01"
            name = "Oscilloscope"
            address = 0x42
            timeout_minutes = 30
        "#;
        assert!(matches!(
            AppConfig::from_toml_str(config_str),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.devices[0].address = 0x01;
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.devices.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.gateway = Some(GatewayConfig {
            poll_interval_seconds: Some(0),
        });
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.notifier = Some(NotifierConfig {
            discord_webhook: Some("ftp://nowhere".to_string()),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_json_file() {
        let dir = std::env::temp_dir()
            .join(format!("labtrack-gateway-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("arduinos_config.JSON");
        fs::write(
            &path,
            r#"{
                "alerts": {"email": "lab@example.org"},
                "notifier": {"timeout_seconds": 4},
                "devices": [
                    {"id": "OSC-01", "name": "Oscilloscope", "address": 66, "timeout_minutes": 30},
                    {"id": "MUL-01", "name": "Multimeter", "address": 67, "timeout_minutes": 15}
                ]
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[1].address, 0x43);
        assert_eq!(config.notify_timeout(), Duration::from_secs(4));

        // The same document is not valid TOML, so the extension picked the parser.
        let toml_path = dir.join("arduinos_config.toml");
        fs::copy(&path, &toml_path).unwrap();
        assert!(matches!(AppConfig::load(&toml_path), Err(GatewayError::Config(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Path::new("/nonexistent/labtrack.toml"));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}
