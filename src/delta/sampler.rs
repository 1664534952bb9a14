//! Periodic sampling of one delta device.
//!
//! Each device gets its own task. A tick reads both sensors concurrently and
//! stores the new delta only if both reads succeed; otherwise the previous
//! value stays in place. Ticks of one device never overlap: the loop awaits
//! each tick before waiting for the next, and ticks missed while a slow
//! fetch was running are dropped.

use super::device::DeltaDevice;
use crate::error::Result;
use crate::hue::SensorGateway;
use crate::sensors::resolver::read_temperature;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct DeltaSampler {
    device: Arc<DeltaDevice>,
    gateway: Arc<dyn SensorGateway>,
    interval: Duration,
}

impl DeltaSampler {
    pub fn new(device: Arc<DeltaDevice>, gateway: Arc<dyn SensorGateway>, interval: Duration) -> Self {
        Self {
            device,
            gateway,
            interval,
        }
    }

    /// Sample both sensors once and store the new delta.
    pub async fn tick(&self) -> Result<i32> {
        let device = &self.device;
        let (a, b) = tokio::join!(
            read_temperature(self.gateway.as_ref(), &device.sensor_a),
            read_temperature(self.gateway.as_ref(), &device.sensor_b)
        );
        let (a, b) = (a?, b?);

        let delta = device.compute(a, b);
        debug!("[Delta] {} sensor A: {}", device.display_name, a);
        debug!("[Delta] {} sensor B: {}", device.display_name, b);
        debug!("[Delta] {} delta: {}", device.display_name, delta);

        device.value.store(delta);
        Ok(delta)
    }

    /// Sample until `shutdown` is cancelled. The first tick runs immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "[Delta] Sampling '{}' every {:?}",
            self.device.display_name, self.interval
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.tick() => {
                    if let Err(e) = result {
                        warn!(
                            "[Delta] Skipping sample of '{}', keeping {}: {}",
                            self.device.display_name,
                            self.device.current_delta(),
                            e
                        );
                    }
                }
            }
        }

        debug!("[Delta] Stopped sampling '{}'", self.device.display_name);
    }
}
