//! Provider status simulator (dev tool)
//!
//! Randomizes provider online/busy flags on a fixed tick so search and
//! change-feed demos have moving data without a real liveness feed.
//! Never started unless `USLUGO_SIMULATE_STATUS` is set.

use crate::services::ProviderService;
use crate::state::AppState;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_secs(30);

pub struct StatusSimulator {
    state: Arc<AppState>,
}

/// Owned handle to a running simulator
pub struct SimulatorHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl SimulatorHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl StatusSimulator {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn start(self) -> SimulatorHandle {
        let (tx, mut rx) = oneshot::channel();
        let state = self.state;

        tokio::spawn(async move {
            info!("Status simulator started ({}s tick)", TICK.as_secs());
            let mut interval = tokio::time::interval(TICK);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => Self::tick(&state),
                    _ = &mut rx => {
                        info!("Status simulator stopped");
                        break;
                    }
                }
            }
        });

        SimulatorHandle { shutdown: Some(tx) }
    }

    fn tick(state: &AppState) {
        let providers = match state.sqlite.list_providers() {
            Ok(p) => p,
            Err(e) => {
                warn!("Status simulator tick failed: {}", e);
                return;
            }
        };

        let mut rng = rand::thread_rng();
        for provider in providers {
            // Flip roughly a quarter of the fleet each tick.
            if rng.gen_bool(0.25) {
                let online = rng.gen_bool(0.8);
                let busy = online && rng.gen_bool(0.3);
                if let Err(e) = ProviderService::set_status(state, &provider.id, online, busy) {
                    debug!("Simulator skipped provider {}: {}", provider.id, e);
                }
            }
        }
    }
}
