//! Hue bridge access.
//!
//! The rest of the crate talks to the bridge only through [`SensorGateway`].
//! [`HueClient`] is the REST implementation, [`HueSession`] guards it so that
//! nothing fetches sensors before the bridge has been reached and the
//! configured username has been accepted.

mod client;
pub mod session;

pub use client::HueClient;
pub use session::{HueSession, SessionState};

use crate::error::Result;
use crate::sensors::{SensorId, SensorReading};
use async_trait::async_trait;

/// Public identity of a reachable bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeInfo {
    pub name: String,
    pub bridge_id: String,
    pub api_version: String,
}

/// Source of sensor readings.
///
/// Every call is one network round-trip. Nothing is cached here; callers
/// that want to reuse a bulk listing keep it themselves.
#[async_trait]
pub trait SensorGateway: Send + Sync {
    /// Verify the bridge is reachable and the username is authorized.
    async fn check_reachable(&self) -> Result<BridgeInfo>;

    /// Fetch every sensor known to the bridge.
    async fn fetch_all(&self) -> Result<Vec<SensorReading>>;

    /// Fetch one sensor by its bridge-local id.
    async fn fetch_by_id(&self, id: &SensorId) -> Result<SensorReading>;
}
