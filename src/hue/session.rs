//! Shared bridge session with lazy, single-flight initialization.
//!
//! Every consumer obtains the gateway through [`HueSession::ready`]. The first
//! call checks reachability and authentication; callers arriving while that
//! check is in flight wait for its outcome instead of starting their own.

use super::{BridgeInfo, SensorGateway};
use crate::error::{DeltaError, Result};
use log::{error, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Lifecycle of the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticating,
    Ready,
    /// Last attempt failed; the next `ready()` call starts a new one.
    Failed,
}

pub struct HueSession {
    gateway: Arc<dyn SensorGateway>,
    state: RwLock<SessionState>,
    bridge: RwLock<Option<BridgeInfo>>,
    /// Held for the whole duration of an initialization attempt
    init_lock: Mutex<()>,
    /// Number of finished initialization attempts
    attempts: AtomicU64,
}

impl HueSession {
    pub fn new(gateway: Arc<dyn SensorGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(SessionState::Uninitialized),
            bridge: RwLock::new(None),
            init_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Identity of the bridge, once the session is ready.
    pub fn bridge(&self) -> Option<BridgeInfo> {
        self.bridge.read().clone()
    }

    /// Get the gateway, initializing the session first if needed.
    pub async fn ready(&self) -> Result<Arc<dyn SensorGateway>> {
        if self.state() == SessionState::Ready {
            return Ok(self.gateway.clone());
        }

        let seen_attempts = self.attempts.load(Ordering::SeqCst);
        let _guard = self.init_lock.lock().await;

        // Someone else ran an attempt while we were waiting; share its outcome
        if self.attempts.load(Ordering::SeqCst) != seen_attempts {
            return match self.state() {
                SessionState::Ready => Ok(self.gateway.clone()),
                _ => Err(DeltaError::GatewayUnavailable(
                    "bridge session initialization failed".to_string(),
                )),
            };
        }
        if self.state() == SessionState::Ready {
            return Ok(self.gateway.clone());
        }

        *self.state.write() = SessionState::Authenticating;
        info!("[Hue] Connecting to bridge");

        let outcome = self.gateway.check_reachable().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(bridge) => {
                info!(
                    "[Hue] Connected to '{}' (bridge id {}, API {})",
                    bridge.name, bridge.bridge_id, bridge.api_version
                );
                *self.bridge.write() = Some(bridge);
                *self.state.write() = SessionState::Ready;
                Ok(self.gateway.clone())
            }
            Err(e) => {
                error!("[Hue] Failed to initialize bridge session: {}", e);
                *self.state.write() = SessionState::Failed;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGateway;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_ready_initializes_once() {
        let gateway = Arc::new(ScriptedGateway::new());
        let session = HueSession::new(gateway.clone());
        assert_eq!(session.state(), SessionState::Uninitialized);

        assert_ok!(session.ready().await);
        assert_ok!(session.ready().await);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(gateway.check_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.bridge().unwrap().name, "Scripted bridge");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let gateway = Arc::new(ScriptedGateway::new());
        let session = Arc::new(HueSession::new(gateway.clone()));

        let (a, b, c) = tokio::join!(session.ready(), session.ready(), session.ready());
        assert_ok!(a);
        assert_ok!(b);
        assert_ok!(c);
        assert_eq!(gateway.check_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_reachable(false);
        let session = HueSession::new(gateway.clone());

        let (a, b) = tokio::join!(session.ready(), session.ready());
        assert_err!(a.map(|_| ()));
        assert_err!(b.map(|_| ()));
        assert_eq!(gateway.check_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_failed_session_retries_on_next_call() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_reachable(false);
        let session = HueSession::new(gateway.clone());

        let err = assert_err!(session.ready().await.map(|_| ()));
        assert!(matches!(err, DeltaError::GatewayUnavailable(_)));
        assert!(session.bridge().is_none());

        gateway.set_reachable(true);
        assert_ok!(session.ready().await);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(gateway.check_calls.load(Ordering::SeqCst), 2);
    }
}
