//! Maps configured sensor references to bridge sensors.
//!
//! References by id are a direct lookup. References by hardware address need
//! the full sensor list; a resolver fetches that list at most once, so every
//! address lookup within one discovery pass shares a single bulk request.

use super::{SensorId, SensorReading, SensorRef};
use crate::error::{DeltaError, Result};
use crate::hue::SensorGateway;
use log::warn;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SensorResolver {
    gateway: Arc<dyn SensorGateway>,
    /// Bulk sensor listing, fetched on first address lookup
    snapshot: OnceCell<Vec<SensorReading>>,
}

impl SensorResolver {
    pub fn new(gateway: Arc<dyn SensorGateway>) -> Self {
        Self {
            gateway,
            snapshot: OnceCell::new(),
        }
    }

    /// Resolve a reference to a temperature sensor that currently reports a value.
    pub async fn resolve(&self, sensor: &SensorRef) -> Result<SensorReading> {
        let reading = match sensor {
            SensorRef::ById { id } => self.gateway.fetch_by_id(id).await?,
            SensorRef::ByAddressPrefix { address } => self.resolve_by_address(address).await?,
        };
        reading.temperature()?;
        Ok(reading)
    }

    async fn resolve_by_address(&self, prefix: &str) -> Result<SensorReading> {
        let sensors = self
            .snapshot
            .get_or_try_init(|| self.gateway.fetch_all())
            .await?;

        let mut matches = sensors
            .iter()
            .filter(|sensor| sensor.kind.is_temperature() && sensor.matches_address(prefix));

        let Some(first) = matches.next() else {
            return Err(DeltaError::SensorNotFound(format!(
                "no temperature sensor with address {}*",
                prefix
            )));
        };

        let others: Vec<&SensorId> = matches.map(|sensor| &sensor.id).collect();
        if !others.is_empty() {
            warn!(
                "[Discovery] Address prefix {} is ambiguous; using sensor {} and ignoring {:?}",
                prefix, first.id, others
            );
        }
        Ok(first.clone())
    }
}

/// Fetch the current temperature of an already resolved sensor.
pub async fn read_temperature(gateway: &dyn SensorGateway, id: &SensorId) -> Result<i32> {
    gateway.fetch_by_id(id).await?.temperature()
}
