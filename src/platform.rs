//! Startup and shutdown of the delta sensors.
//!
//! Startup waits for the bridge session, runs the discovery pass once and
//! spawns one sampler per active device. If the bridge cannot be reached
//! within the configured retries the platform stays inert: no devices are
//! created and nothing is sampled, but the process keeps running.

use crate::config::Config;
use crate::delta::{DeltaDevice, DeltaRegistry, DeltaSampler, DiscoveryReport};
use crate::error::{DeltaError, Result};
use crate::host::AccessoryHost;
use crate::hue::{HueSession, SensorGateway};
use crate::sensors::SensorResolver;
use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct DeltaPlatform {
    config: Config,
    session: Arc<HueSession>,
    registry: DeltaRegistry,
    shutdown: CancellationToken,
    samplers: TaskTracker,
    started: bool,
}

impl DeltaPlatform {
    pub fn new(config: Config, session: Arc<HueSession>, host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            config,
            session,
            registry: DeltaRegistry::new(host),
            shutdown: CancellationToken::new(),
            samplers: TaskTracker::new(),
            started: false,
        }
    }

    /// Connect, discover and start sampling. Discovery runs at most once;
    /// calling this again after a successful start is an error.
    pub async fn start(&mut self) -> Result<DiscoveryReport> {
        if self.started {
            return Err(DeltaError::Configuration(
                "delta platform is already started".to_string(),
            ));
        }

        let gateway = self.wait_for_bridge().await?;

        let resolver = SensorResolver::new(gateway.clone());
        let report = self
            .registry
            .discover(&self.config.deltas, &resolver)
            .await?;
        self.started = true;

        for device in self.registry.devices() {
            let sampler = DeltaSampler::new(device, gateway.clone(), self.config.interval());
            self.samplers.spawn(sampler.run(self.shutdown.clone()));
        }
        info!(
            "[Delta] Started {} sampler(s), interval {:?}",
            self.samplers.len(),
            self.config.interval()
        );

        Ok(report)
    }

    /// Try the session up to `startup_retries + 1` times.
    async fn wait_for_bridge(&self) -> Result<Arc<dyn SensorGateway>> {
        let attempts = self.config.startup_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.session.ready().await {
                Ok(gateway) => return Ok(gateway),
                Err(e) if attempt >= attempts => {
                    error!(
                        "[Hue] Giving up on the bridge after {} attempt(s): {}",
                        attempt, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "[Hue] Bridge not ready (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        self.config.startup_retry_delay()
                    );
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Err(DeltaError::GatewayUnavailable("startup cancelled".to_string()));
                }
                _ = tokio::time::sleep(self.config.startup_retry_delay()) => {}
            }
            attempt += 1;
        }
    }

    pub fn devices(&self) -> Vec<Arc<DeltaDevice>> {
        self.registry.devices()
    }

    /// Token that stops every sampler (and a pending startup) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop all samplers and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.samplers.close();
        self.samplers.wait().await;
        info!("[Delta] All samplers stopped");
    }
}
