//! REST client for the Hue bridge (API v1).

use super::{BridgeInfo, SensorGateway};
use crate::config::HueConfig;
use crate::error::{DeltaError, Result};
use crate::sensors::{SensorId, SensorKind, SensorReading};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Default HTTPS port of the bridge.
pub const DEFAULT_PORT: u16 = 443;

/// Hue API error type for "unauthorized user".
const UNAUTHORIZED_USER: u64 = 1;

/// Hue API error type for "resource not available", e.g. an unknown sensor id.
const RESOURCE_NOT_AVAILABLE: u64 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sensor resource as returned by `/api/<username>/sensors[/<id>]`.
#[derive(Debug, Deserialize)]
struct WireSensor {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "uniqueid", default)]
    unique_id: Option<String>,
    #[serde(default)]
    state: WireState,
}

#[derive(Debug, Default, Deserialize)]
struct WireState {
    #[serde(default)]
    temperature: Option<i32>,
}

impl WireSensor {
    fn into_reading(self, id: SensorId) -> SensorReading {
        SensorReading {
            id,
            name: self.name,
            kind: SensorKind::parse(&self.kind),
            unique_id: self.unique_id,
            temperature: self.state.temperature,
        }
    }
}

/// HTTP client for one bridge and one whitelisted username.
pub struct HueClient {
    http: Client,
    base_url: String,
    username: String,
}

impl HueClient {
    /// Create a client from the `hue` section of the configuration.
    pub fn new(config: &HueConfig) -> Result<Self> {
        let http = Client::builder()
            // Bridges ship with a self-signed certificate
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "https://{}:{}",
                config.host,
                config.port.unwrap_or(DEFAULT_PORT)
            ),
            username: config.username.clone(),
        })
    }

    /// GET a path below `/api` and decode the body.
    ///
    /// The username is part of the path, so only the caller-supplied
    /// `label` is logged.
    async fn get_json(&self, path: &str, label: &str) -> Result<Value> {
        let url = format!("{}/api/{}", self.base_url, path);
        debug!("[Hue] GET {}", label);

        let response = self.http.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(DeltaError::GatewayProtocol(format!(
                "{} returned HTTP {}",
                label,
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        check_api_error(&body)?;
        Ok(body)
    }

    fn user_path(&self, resource: &str) -> String {
        format!("{}/{}", self.username, resource)
    }
}

#[async_trait]
impl SensorGateway for HueClient {
    async fn check_reachable(&self) -> Result<BridgeInfo> {
        let public = self.get_json("config", "config").await?;
        let info = parse_bridge_info(&public)?;

        let private = self
            .get_json(&self.user_path("config"), "authenticated config")
            .await?;
        check_authenticated(&private)?;

        Ok(info)
    }

    async fn fetch_all(&self) -> Result<Vec<SensorReading>> {
        let body = self.get_json(&self.user_path("sensors"), "sensors").await?;
        parse_sensor_map(body)
    }

    async fn fetch_by_id(&self, id: &SensorId) -> Result<SensorReading> {
        let body = self
            .get_json(
                &self.user_path(&format!("sensors/{}", id)),
                &format!("sensors/{}", id),
            )
            .await?;
        parse_sensor(id, body)
    }
}

/// The bridge reports failures as HTTP 200 with an error array body.
fn check_api_error(body: &Value) -> Result<()> {
    let Some(error) = body
        .as_array()
        .and_then(|entries| entries.iter().find_map(|entry| entry.get("error")))
    else {
        return Ok(());
    };

    let description = error
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    match error.get("type").and_then(Value::as_u64) {
        Some(UNAUTHORIZED_USER) => Err(DeltaError::GatewayUnavailable(description)),
        Some(RESOURCE_NOT_AVAILABLE) => Err(DeltaError::SensorNotFound(description)),
        Some(kind) => Err(DeltaError::GatewayProtocol(format!(
            "{} (type {})",
            description, kind
        ))),
        None => Err(DeltaError::GatewayProtocol(description)),
    }
}

fn parse_bridge_info(body: &Value) -> Result<BridgeInfo> {
    let field = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DeltaError::GatewayProtocol(format!("bridge config lacks `{}`", key)))
    };

    Ok(BridgeInfo {
        name: field("name")?,
        bridge_id: field("bridgeid")?,
        api_version: field("apiversion")?,
    })
}

/// An unknown username still gets the public config back, only without
/// the whitelist.
fn check_authenticated(body: &Value) -> Result<()> {
    if body.get("whitelist").is_some() {
        Ok(())
    } else {
        Err(DeltaError::GatewayUnavailable(
            "username is not authorized on this bridge".to_string(),
        ))
    }
}

fn parse_sensor_map(body: Value) -> Result<Vec<SensorReading>> {
    let sensors: HashMap<String, WireSensor> = serde_json::from_value(body)
        .map_err(|e| DeltaError::GatewayProtocol(format!("malformed sensor list: {}", e)))?;

    let mut readings: Vec<SensorReading> = sensors
        .into_iter()
        .map(|(id, sensor)| sensor.into_reading(SensorId::new(id)))
        .collect();
    // Numeric ids sort naturally when shorter ids come first
    readings.sort_by(|a, b| {
        (a.id.as_str().len(), a.id.as_str()).cmp(&(b.id.as_str().len(), b.id.as_str()))
    });
    Ok(readings)
}

fn parse_sensor(id: &SensorId, body: Value) -> Result<SensorReading> {
    let sensor: WireSensor = serde_json::from_value(body)
        .map_err(|e| DeltaError::GatewayProtocol(format!("malformed sensor {}: {}", id, e)))?;
    Ok(sensor.into_reading(id.clone()))
}
