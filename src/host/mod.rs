//! Host accessory framework interface.
//!
//! The host owns the accessories shown to the user and caches them across
//! restarts. The delta engine only needs four things from it: the accessories
//! it restored, a way to register or re-attach one, a way to drop one, and a
//! per-device handle for exchanging the current value.

pub mod cache;

pub use cache::AccessoryCache;

use crate::error::Result;
use crate::sensors::SensorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Synchronous read of a device's current value, called by the host on demand.
pub type ValueReader = Arc<dyn Fn() -> i32 + Send + Sync>;

/// Per-device handle returned by the host.
///
/// Values are hundredths of a degree Celsius.
pub trait DeviceHandle: Send + Sync {
    /// Push a changed value to the host.
    fn set_value(&self, delta: i32);

    /// Install the callback the host uses whenever it wants the current value.
    fn on_value_requested(&self, reader: ValueReader);
}

/// State the host keeps with each accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryContext {
    pub sensor_a: SensorId,
    pub sensor_b: SensorId,
    #[serde(default)]
    pub inverse: bool,
    /// Last delta, hundredths of a degree Celsius
    #[serde(default)]
    pub delta: i32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryRecord {
    pub uuid: Uuid,
    pub display_name: String,
    pub context: AccessoryContext,
}

pub trait AccessoryHost: Send + Sync {
    /// Accessories the host currently knows about, including those restored
    /// from its cache at startup.
    fn cached_accessories(&self) -> Vec<AccessoryRecord>;

    /// Register a new accessory. Fails if the uuid is already registered.
    fn register_device(&self, record: AccessoryRecord) -> Result<Arc<dyn DeviceHandle>>;

    /// Re-attach a known accessory with a refreshed record.
    fn restore_device(&self, record: AccessoryRecord) -> Result<Arc<dyn DeviceHandle>>;

    fn unregister_device(&self, uuid: &Uuid) -> Result<()>;
}
