//! Physical sensor data as reported by the Hue bridge.
//!
//! A [`SensorReading`] is a fresh, immutable snapshot of one bridge sensor.
//! A [`SensorRef`] is how configuration points at a sensor, either by the
//! bridge-local id or by a prefix of the sensor's hardware address.

pub mod resolver;

pub use resolver::SensorResolver;

use crate::error::{DeltaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::EnumString;

/// Bridge-local sensor id.
///
/// The bridge keys its sensor map by strings ("5", "12"), while configuration
/// files usually carry plain numbers, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawSensorId")]
pub struct SensorId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSensorId {
    Number(u64),
    Text(String),
}

impl From<RawSensorId> for SensorId {
    fn from(raw: RawSensorId) -> Self {
        match raw {
            RawSensorId::Number(n) => SensorId(n.to_string()),
            RawSensorId::Text(s) => SensorId(s),
        }
    }
}

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for SensorId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for SensorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sensor type tag from the bridge's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
pub enum SensorKind {
    /// Zigbee temperature sensor (Hue motion sensor, Hue temperature sensor)
    #[strum(serialize = "ZLLTemperature")]
    ZllTemperature,
    /// Virtual temperature sensor created through the bridge API
    #[strum(serialize = "CLIPTemperature")]
    ClipTemperature,
    #[strum(default)]
    Other(String),
}

impl SensorKind {
    pub fn parse(tag: &str) -> Self {
        // The default variant makes this infallible.
        SensorKind::from_str(tag).unwrap_or_else(|_| SensorKind::Other(tag.to_string()))
    }

    pub fn is_temperature(&self) -> bool {
        matches!(
            self,
            SensorKind::ZllTemperature | SensorKind::ClipTemperature
        )
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::ZllTemperature => f.write_str("ZLLTemperature"),
            SensorKind::ClipTemperature => f.write_str("CLIPTemperature"),
            SensorKind::Other(tag) => f.write_str(tag),
        }
    }
}

/// One sensor as fetched from the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: SensorId,
    pub name: String,
    pub kind: SensorKind,
    /// Hardware address, e.g. `00:17:88:01:02:03:04:05-02-0402`
    pub unique_id: Option<String>,
    /// Temperature in hundredths of a degree Celsius (2150 = 21.50°C)
    pub temperature: Option<i32>,
}

impl SensorReading {
    /// Temperature usable as a delta input.
    ///
    /// Fails for non-temperature sensors and for temperature sensors that
    /// have not reported a value yet.
    pub fn temperature(&self) -> Result<i32> {
        if !self.kind.is_temperature() {
            return Err(DeltaError::SensorNotFound(format!(
                "sensor {} is a {} sensor, not a temperature sensor",
                self.id, self.kind
            )));
        }
        self.temperature.ok_or_else(|| {
            DeltaError::SensorNotFound(format!("sensor {} reports no temperature", self.id))
        })
    }

    /// Case-insensitive hardware address prefix match.
    pub fn matches_address(&self, prefix: &str) -> bool {
        self.unique_id.as_deref().is_some_and(|unique_id| {
            unique_id
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase())
        })
    }
}

/// Configured reference to one physical sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorRef {
    /// `{ "id": 5 }`: bridge-local id
    ById { id: SensorId },
    /// `{ "address": "00:17:88:01:02:03" }`: prefix of the hardware address
    ByAddressPrefix { address: String },
}

impl fmt::Display for SensorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorRef::ById { id } => write!(f, "id {}", id),
            SensorRef::ByAddressPrefix { address } => write!(f, "address {}*", address),
        }
    }
}
