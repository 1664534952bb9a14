use crate::error::{DeltaError, Result};
use crate::sensors::SensorRef;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default polling interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 15_000;

const APP_DIR: &str = "hue-temperature-delta";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub hue: HueConfig,
    #[serde(default)]
    pub deltas: Vec<DeltaDefinition>,
    /// Polling interval in milliseconds, shared by every delta sensor
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Extra attempts to reach the bridge at startup before giving up
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,
    /// Delay between startup attempts in milliseconds
    #[serde(default = "default_startup_retry_delay")]
    pub startup_retry_delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HueConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Bridge-issued API username
    pub username: String,
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

/// One configured delta sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaDefinition {
    /// Stable id; the accessory identity is derived from it
    pub id: String,
    #[serde(rename = "displayName", alias = "display_name")]
    pub display_name: String,
    /// Report `b - a` instead of `a - b`
    #[serde(default)]
    pub inverse: bool,
    #[serde(rename = "a", alias = "sensor_a")]
    pub sensor_a: SensorRef,
    #[serde(rename = "b", alias = "sensor_b")]
    pub sensor_b: SensorRef,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_startup_retries() -> u32 {
    5
}

fn default_startup_retry_delay() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load a JSON configuration file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DeltaError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `HUE_HOST`, `HUE_PORT`, `HUE_USERNAME` and `DELTA_INTERVAL_MS`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HUE_HOST") {
            self.hue.host = host;
        }
        if let Some(port) = lookup("HUE_PORT") {
            match port.parse() {
                Ok(p) => self.hue.port = Some(p),
                Err(_) => warn!("Ignoring invalid HUE_PORT: {}", port),
            }
        }
        if let Some(username) = lookup("HUE_USERNAME") {
            self.hue.username = username;
        }
        if let Some(interval) = lookup("DELTA_INTERVAL_MS")
            && let Ok(ms) = interval.parse()
        {
            self.interval = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hue.host.trim().is_empty() {
            return Err(DeltaError::Configuration("hue.host is required".to_string()));
        }
        if self.hue.username.trim().is_empty() {
            return Err(DeltaError::Configuration(
                "hue.username is required".to_string(),
            ));
        }
        if self.interval == 0 {
            return Err(DeltaError::Configuration(
                "interval must be greater than zero".to_string(),
            ));
        }
        validate_definitions(&self.deltas)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay)
    }
}

/// Reject definitions that cannot be reconciled unambiguously.
pub fn validate_definitions(definitions: &[DeltaDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for definition in definitions {
        if definition.id.trim().is_empty() {
            return Err(DeltaError::Configuration(format!(
                "delta '{}' has an empty id",
                definition.display_name
            )));
        }
        for sensor in [&definition.sensor_a, &definition.sensor_b] {
            if let SensorRef::ByAddressPrefix { address } = sensor
                && address.trim().is_empty()
            {
                return Err(DeltaError::Configuration(format!(
                    "delta '{}' has an empty sensor address",
                    definition.id
                )));
            }
        }
        if !seen.insert(definition.id.as_str()) {
            return Err(DeltaError::Configuration(format!(
                "duplicate delta id '{}'",
                definition.id
            )));
        }
    }
    Ok(())
}

/// `<config dir>/hue-temperature-delta/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}

/// `<data dir>/hue-temperature-delta/accessories.json`
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR).join("accessories.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorId;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "platform": "hue-temperature-delta",
        "hue": { "host": "192.168.1.20", "username": "abc123" },
        "deltas": [
            {
                "id": "d1",
                "displayName": "Window delta",
                "a": { "id": 1 },
                "b": { "id": 2 }
            },
            {
                "id": "d2",
                "displayName": "Attic delta",
                "inverse": true,
                "a": { "address": "00:17:88:01:02:aa" },
                "b": { "id": "7" }
            }
        ]
    }"#;

    fn definition(id: &str) -> DeltaDefinition {
        DeltaDefinition {
            id: id.to_string(),
            display_name: format!("Delta {}", id),
            inverse: false,
            sensor_a: SensorRef::ById { id: SensorId::from(1) },
            sensor_b: SensorRef::ById { id: SensorId::from(2) },
        }
    }

    #[test]
    fn test_parse_with_defaults() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.interval, DEFAULT_INTERVAL_MS);
        assert_eq!(config.interval(), Duration::from_secs(15));
        assert_eq!(config.hue.port, None);
        assert!(config.hue.accept_invalid_certs);
        assert_eq!(config.deltas.len(), 2);

        let first = &config.deltas[0];
        assert_eq!(first.display_name, "Window delta");
        assert!(!first.inverse);
        assert_eq!(first.sensor_a, SensorRef::ById { id: SensorId::from(1) });

        let second = &config.deltas[1];
        assert!(second.inverse);
        assert_eq!(
            second.sensor_a,
            SensorRef::ByAddressPrefix {
                address: "00:17:88:01:02:aa".to_string()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            ("HUE_HOST", "10.0.0.5"),
            ("HUE_PORT", "8443"),
            ("DELTA_INTERVAL_MS", "5000"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.hue.host, "10.0.0.5");
        assert_eq!(config.hue.port, Some(8443));
        assert_eq!(config.hue.username, "abc123");
        assert_eq!(config.interval, 5000);
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.apply_overrides(|key| (key == "HUE_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.hue.port, None);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = validate_definitions(&[definition("dup"), definition("dup")]);
        match result {
            Err(DeltaError::Configuration(msg)) => assert!(msg.contains("dup")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_id_and_address_rejected() {
        assert!(validate_definitions(&[definition(" ")]).is_err());

        let mut empty_address = definition("d1");
        empty_address.sensor_b = SensorRef::ByAddressPrefix {
            address: String::new(),
        };
        assert!(validate_definitions(&[empty_address]).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.interval = 0;
        assert!(matches!(
            config.validate(),
            Err(DeltaError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/hue-temperature-delta.json");
        assert!(matches!(result, Err(DeltaError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "hue": {{ "host": "bridge.local", "username": "abc" }},
                "deltas": [
                    {{ "id": "dup", "displayName": "One", "a": {{ "id": 1 }}, "b": {{ "id": 2 }} }},
                    {{ "id": "dup", "displayName": "Two", "a": {{ "id": 3 }}, "b": {{ "id": 4 }} }}
                ]
            }}"#
        )
        .unwrap();

        let result = Config::load(file.path());
        assert!(matches!(result, Err(DeltaError::Configuration(_))));
    }
}
