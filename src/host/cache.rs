//! File-backed accessory cache.
//!
//! Keeps registered accessories in a JSON file so a restart restores them
//! (with their last delta) instead of creating new ones.

use super::{AccessoryHost, AccessoryRecord, DeviceHandle, ValueReader};
use crate::error::{DeltaError, Result};
use chrono::Utc;
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    accessories: Vec<AccessoryRecord>,
}

impl CacheFile {
    fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) => {
                    info!(
                        "[Cache] Loaded {} accessories from {:?}",
                        file.accessories.len(),
                        path
                    );
                    file
                }
                Err(e) => {
                    warn!("[Cache] Failed to parse accessory cache: {}", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[Cache] No accessory cache found (first run)");
                Self::default()
            }
            Err(e) => {
                error!("[Cache] Failed to read accessory cache: {}", e);
                Self::default()
            }
        }
    }
}

struct CacheState {
    path: Option<PathBuf>,
    records: RwLock<BTreeMap<Uuid, AccessoryRecord>>,
    readers: RwLock<HashMap<Uuid, ValueReader>>,
}

/// Accessory host backed by a JSON file (or by nothing, see [`in_memory`]).
///
/// [`in_memory`]: AccessoryCache::in_memory
#[derive(Clone)]
pub struct AccessoryCache {
    state: Arc<CacheState>,
}

impl AccessoryCache {
    /// Load the cache at `path`. A missing or unreadable file starts empty.
    pub fn load(path: PathBuf) -> Self {
        let file = CacheFile::load(&path);
        Self::with_records(Some(path), file.accessories)
    }

    /// A cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::with_records(None, Vec::new())
    }

    fn with_records(path: Option<PathBuf>, accessories: Vec<AccessoryRecord>) -> Self {
        let records = accessories
            .into_iter()
            .map(|record| (record.uuid, record))
            .collect();
        Self {
            state: Arc::new(CacheState {
                path,
                records: RwLock::new(records),
                readers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Write every accessory, including the latest deltas, to disk.
    ///
    /// Blocking write. The file holds one small record per configured delta;
    /// move this to `spawn_blocking` if it ever grows beyond that.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.state.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            accessories: self.accessories(),
        };
        fs::write(path, serde_json::to_vec_pretty(&file)?)?;
        info!(
            "[Cache] Saved {} accessories to {:?}",
            file.accessories.len(),
            path
        );
        Ok(())
    }

    pub fn accessories(&self) -> Vec<AccessoryRecord> {
        self.state.records.read().values().cloned().collect()
    }

    /// Ask a device for its current value, the way the host does on demand.
    pub fn read_value(&self, uuid: &Uuid) -> Option<i32> {
        let reader = self.state.readers.read().get(uuid).cloned()?;
        Some(reader())
    }

    /// Structural changes are written straight away; a failed write only
    /// costs the restore on the next start.
    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("[Cache] Failed to save accessory cache: {}", e);
        }
    }

    fn handle(&self, uuid: Uuid) -> Arc<dyn DeviceHandle> {
        Arc::new(CachedDevice {
            cache: self.clone(),
            uuid,
        })
    }
}

impl AccessoryHost for AccessoryCache {
    fn cached_accessories(&self) -> Vec<AccessoryRecord> {
        self.accessories()
    }

    fn register_device(&self, record: AccessoryRecord) -> Result<Arc<dyn DeviceHandle>> {
        let uuid = record.uuid;
        {
            let mut records = self.state.records.write();
            if records.contains_key(&uuid) {
                return Err(DeltaError::Configuration(format!(
                    "accessory {} is already registered",
                    uuid
                )));
            }
            records.insert(uuid, record);
        }
        self.persist();
        Ok(self.handle(uuid))
    }

    fn restore_device(&self, record: AccessoryRecord) -> Result<Arc<dyn DeviceHandle>> {
        let uuid = record.uuid;
        {
            let mut records = self.state.records.write();
            let Some(existing) = records.get_mut(&uuid) else {
                return Err(DeltaError::Configuration(format!(
                    "accessory {} is not in the cache",
                    uuid
                )));
            };
            *existing = record;
        }
        self.persist();
        Ok(self.handle(uuid))
    }

    fn unregister_device(&self, uuid: &Uuid) -> Result<()> {
        let removed = self.state.records.write().remove(uuid);
        self.state.readers.write().remove(uuid);
        if removed.is_some() {
            self.persist();
        }
        Ok(())
    }
}

struct CachedDevice {
    cache: AccessoryCache,
    uuid: Uuid,
}

impl DeviceHandle for CachedDevice {
    fn set_value(&self, delta: i32) {
        if let Some(record) = self.cache.state.records.write().get_mut(&self.uuid) {
            record.context.delta = delta;
            record.context.updated_at = Some(Utc::now());
        }
    }

    fn on_value_requested(&self, reader: ValueReader) {
        self.cache.state.readers.write().insert(self.uuid, reader);
    }
}
