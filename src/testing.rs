//! In-memory gateway for unit tests.

use crate::error::{DeltaError, Result};
use crate::hue::{BridgeInfo, SensorGateway};
use crate::sensors::{SensorId, SensorKind, SensorReading};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn temperature_sensor(id: u32, unique_id: &str, temperature: i32) -> SensorReading {
    SensorReading {
        id: SensorId::from(id),
        name: format!("Sensor {}", id),
        kind: SensorKind::ZllTemperature,
        unique_id: Some(unique_id.to_string()),
        temperature: Some(temperature),
    }
}

/// Gateway whose sensors and failures are scripted by the test.
pub struct ScriptedGateway {
    sensors: Mutex<BTreeMap<SensorId, SensorReading>>,
    failing: Mutex<HashSet<SensorId>>,
    reachable: AtomicBool,
    pub check_calls: AtomicUsize,
    pub fetch_all_calls: AtomicUsize,
    pub fetch_by_id_calls: AtomicUsize,
    fetch_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    /// Highest number of `fetch_by_id` calls running at the same time
    pub peak_in_flight: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            sensors: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            reachable: AtomicBool::new(true),
            check_calls: AtomicUsize::new(0),
            fetch_all_calls: AtomicUsize::new(0),
            fetch_by_id_calls: AtomicUsize::new(0),
            fetch_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_sensor(self, reading: SensorReading) -> Self {
        self.sensors.lock().insert(reading.id.clone(), reading);
        self
    }

    /// Add a temperature sensor with a generated hardware address.
    pub fn with_temperature(self, id: u32, temperature: i32) -> Self {
        let unique_id = format!("00:17:88:01:00:00:00:{:02x}-02-0402", id);
        self.with_sensor(temperature_sensor(id, &unique_id, temperature))
    }

    /// Make every `fetch_by_id` take this long.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock() = delay;
        self
    }

    pub fn set_temperature(&self, id: u32, temperature: i32) {
        if let Some(sensor) = self.sensors.lock().get_mut(&SensorId::from(id)) {
            sensor.temperature = Some(temperature);
        }
    }

    /// Make every fetch of this sensor fail until `recover` is called.
    pub fn fail(&self, id: u32) {
        self.failing.lock().insert(SensorId::from(id));
    }

    pub fn recover(&self, id: u32) {
        self.failing.lock().remove(&SensorId::from(id));
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SensorGateway for ScriptedGateway {
    async fn check_reachable(&self) -> Result<BridgeInfo> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent callers can pile up behind the attempt
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.reachable.load(Ordering::SeqCst) {
            Ok(BridgeInfo {
                name: "Scripted bridge".to_string(),
                bridge_id: "001788FFFE000000".to_string(),
                api_version: "1.60.0".to_string(),
            })
        } else {
            Err(DeltaError::GatewayUnavailable("connection refused".to_string()))
        }
    }

    async fn fetch_all(&self) -> Result<Vec<SensorReading>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(DeltaError::GatewayUnavailable("connection refused".to_string()));
        }
        let failing = self.failing.lock().clone();
        Ok(self
            .sensors
            .lock()
            .values()
            .filter(|sensor| !failing.contains(&sensor.id))
            .cloned()
            .collect())
    }

    async fn fetch_by_id(&self, id: &SensorId) -> Result<SensorReading> {
        self.fetch_by_id_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        let result = self.lookup(id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptedGateway {
    fn lookup(&self, id: &SensorId) -> Result<SensorReading> {
        if !self.reachable.load(Ordering::SeqCst) || self.failing.lock().contains(id) {
            return Err(DeltaError::GatewayUnavailable(format!(
                "timed out fetching sensor {}",
                id
            )));
        }
        self.sensors.lock().get(id).cloned().ok_or_else(|| {
            DeltaError::SensorNotFound(format!("resource, /sensors/{}, not available", id))
        })
    }
}
