//! Reconciles configured deltas with the accessories the host already knows.
//!
//! Discovery resolves both sensors of every definition concurrently, then
//! walks the results in configuration order and either restores the cached
//! accessory with the same persistent id or registers a new one. A definition
//! whose sensors cannot be resolved is skipped for the rest of the process.

use super::device::{DeltaDevice, persistent_id};
use super::value::DeltaValue;
use crate::config::{DeltaDefinition, validate_definitions};
use crate::error::Result;
use crate::host::{AccessoryContext, AccessoryHost, AccessoryRecord, DeviceHandle};
use crate::sensors::{SensorReading, SensorResolver};
use futures_util::future::join_all;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one discovery pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub created: Vec<Uuid>,
    pub restored: Vec<Uuid>,
    /// Delta ids whose sensors could not be resolved
    pub skipped: Vec<String>,
    /// Cached accessories with no matching definition, removed from the host
    pub removed: Vec<Uuid>,
}

impl DiscoveryReport {
    pub fn active(&self) -> usize {
        self.created.len() + self.restored.len()
    }
}

pub struct DeltaRegistry {
    host: Arc<dyn AccessoryHost>,
    devices: BTreeMap<Uuid, Arc<DeltaDevice>>,
}

impl DeltaRegistry {
    pub fn new(host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            host,
            devices: BTreeMap::new(),
        }
    }

    pub fn devices(&self) -> Vec<Arc<DeltaDevice>> {
        self.devices.values().cloned().collect()
    }

    pub fn get(&self, persistent_id: &Uuid) -> Option<Arc<DeltaDevice>> {
        self.devices.get(persistent_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Run the discovery pass.
    ///
    /// Invalid definitions (duplicate or empty ids) reject the whole pass
    /// before anything is resolved or registered.
    pub async fn discover(
        &mut self,
        definitions: &[DeltaDefinition],
        resolver: &SensorResolver,
    ) -> Result<DiscoveryReport> {
        validate_definitions(definitions)?;
        info!("[Discovery] Resolving {} delta(s)", definitions.len());

        let resolved = join_all(definitions.iter().map(|definition| async move {
            let (a, b) = tokio::join!(
                resolver.resolve(&definition.sensor_a),
                resolver.resolve(&definition.sensor_b)
            );
            (definition, a, b)
        }))
        .await;

        let cached: HashMap<Uuid, AccessoryRecord> = self
            .host
            .cached_accessories()
            .into_iter()
            .map(|record| (record.uuid, record))
            .collect();

        let mut report = DiscoveryReport::default();

        for (definition, a, b) in resolved {
            let (a, b) = match (a, b) {
                (Ok(a), Ok(b)) => (a, b),
                (a, b) => {
                    for error in [a.err(), b.err()].into_iter().flatten() {
                        warn!("[Discovery] Delta '{}': {}", definition.id, error);
                    }
                    warn!(
                        "[Discovery] Skipping delta '{}' as one or more sensors were not found",
                        definition.id
                    );
                    report.skipped.push(definition.id.clone());
                    continue;
                }
            };

            let uuid = persistent_id(&definition.id);
            if self.devices.contains_key(&uuid) {
                debug!("[Discovery] Delta '{}' is already active", definition.id);
                continue;
            }

            match self.activate(definition, uuid, &a, &b, cached.get(&uuid)) {
                Ok(device) => {
                    if cached.contains_key(&uuid) {
                        report.restored.push(uuid);
                    } else {
                        report.created.push(uuid);
                    }
                    self.devices.insert(uuid, device);
                }
                Err(e) => {
                    warn!("[Discovery] Skipping delta '{}': {}", definition.id, e);
                    report.skipped.push(definition.id.clone());
                }
            }
        }

        let configured: HashSet<Uuid> = definitions
            .iter()
            .map(|definition| persistent_id(&definition.id))
            .collect();
        for uuid in cached.keys().filter(|uuid| !configured.contains(*uuid)) {
            info!(
                "[Discovery] Removing accessory no longer in configuration: {}",
                cached[uuid].display_name
            );
            match self.host.unregister_device(uuid) {
                Ok(()) => report.removed.push(*uuid),
                Err(e) => warn!("[Discovery] Failed to remove accessory {}: {}", uuid, e),
            }
        }

        info!(
            "[Discovery] {} created, {} restored, {} skipped, {} removed",
            report.created.len(),
            report.restored.len(),
            report.skipped.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Restore or create the device for one resolved definition.
    fn activate(
        &self,
        definition: &DeltaDefinition,
        uuid: Uuid,
        a: &SensorReading,
        b: &SensorReading,
        cached: Option<&AccessoryRecord>,
    ) -> Result<Arc<DeltaDevice>> {
        // Restored accessories keep their last delta
        let (delta, updated_at) = cached
            .map(|record| (record.context.delta, record.context.updated_at))
            .unwrap_or_default();

        let record = AccessoryRecord {
            uuid,
            display_name: definition.display_name.clone(),
            context: AccessoryContext {
                sensor_a: a.id.clone(),
                sensor_b: b.id.clone(),
                inverse: definition.inverse,
                delta,
                updated_at,
            },
        };

        let handle = match cached {
            Some(existing) => {
                info!(
                    "[Discovery] Restoring existing accessory from cache: {}",
                    existing.display_name
                );
                self.host.restore_device(record)?
            }
            None => {
                info!("[Discovery] Adding new accessory: {}", definition.display_name);
                self.host.register_device(record)?
            }
        };

        let value = Arc::new(match cached {
            Some(_) => DeltaValue::restored(delta, updated_at),
            None => DeltaValue::new(),
        });
        connect(&value, handle);

        Ok(Arc::new(DeltaDevice {
            persistent_id: uuid,
            delta_id: definition.id.clone(),
            display_name: definition.display_name.clone(),
            sensor_a: a.id.clone(),
            sensor_b: b.id.clone(),
            inverse: definition.inverse,
            value,
        }))
    }
}

/// Wire a value to its host handle in both directions.
fn connect(value: &Arc<DeltaValue>, handle: Arc<dyn DeviceHandle>) {
    let reader_value = value.clone();
    handle.on_value_requested(Arc::new(move || reader_value.read()));
    value.set_pusher(Arc::new(move |delta| handle.set_value(delta)));
}
