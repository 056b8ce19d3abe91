/// Topic-based event broadcasting.
pub mod hub;
/// Championship lifecycle machine.
pub mod phase;

use std::sync::Arc;

use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};
use tracing::warn;

use crate::{
    agent::client::{AgentConnector, HttpAgentClient},
    config::AppConfig,
    dao::{ChampionshipStore, memory::MemoryStore},
};

pub use self::hub::EventHub;
use self::phase::{InvalidTransition, Phase, PhaseEvent, PhaseMachine};

pub type SharedState = Arc<AppState>;

/// Handle on the running scheduler task and its cancellation signal.
///
/// The cancel channel is watched by the scheduler and every match runner at
/// each suspension point.
pub struct RunHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunHandle {
    pub fn new(cancel: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Signal cancellation and wait for the scheduler tree to wind down.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "scheduler task ended abnormally during shutdown");
            }
        }
    }
}

/// Phase machine plus the round counters reported on the status surface.
#[derive(Default)]
struct Progress {
    machine: PhaseMachine,
    /// One-based round currently running; 0 while waiting.
    current_round: usize,
    total_rounds: usize,
}

/// Central application state: configuration, the store, the agent connector,
/// the event hub, and the lifecycle bookkeeping.
///
/// One `AppState` owns one championship; tests build fresh instances instead
/// of clearing globals.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn ChampionshipStore>,
    connector: Arc<dyn AgentConnector>,
    hub: EventHub,
    progress: RwLock<Progress>,
    run: Mutex<Option<RunHandle>>,
    admin_gate: Mutex<()>,
}

impl AppState {
    /// Construct the shared state around explicit store and connector
    /// implementations.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ChampionshipStore>,
        connector: Arc<dyn AgentConnector>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            connector,
            hub: EventHub::new(),
            progress: RwLock::new(Progress::default()),
            run: Mutex::new(None),
            admin_gate: Mutex::new(()),
        })
    }

    /// Production wiring: in-memory store and HTTP agent connector.
    pub fn with_defaults(config: AppConfig) -> SharedState {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(HttpAgentClient::new()),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ChampionshipStore> {
        self.store.clone()
    }

    pub fn connector(&self) -> Arc<dyn AgentConnector> {
        self.connector.clone()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> Phase {
        self.progress.read().await.machine.phase()
    }

    /// Apply a lifecycle event, returning the new phase.
    pub async fn apply_phase(&self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        let mut progress = self.progress.write().await;
        let next = progress.machine.apply(event)?;
        if next == Phase::Waiting {
            progress.current_round = 0;
            progress.total_rounds = 0;
        }
        Ok(next)
    }

    /// `(current_round, total_rounds)` as reported on the status surface.
    pub async fn rounds(&self) -> (usize, usize) {
        let progress = self.progress.read().await;
        (progress.current_round, progress.total_rounds)
    }

    pub async fn set_total_rounds(&self, total: usize) {
        self.progress.write().await.total_rounds = total;
    }

    pub async fn set_current_round(&self, round: usize) {
        self.progress.write().await.current_round = round;
    }

    /// Install the handle of a freshly spawned scheduler run.
    pub async fn install_run(&self, handle: RunHandle) {
        let mut slot = self.run.lock().await;
        if let Some(stale) = slot.replace(handle) {
            // A previous run should have been shut down already.
            warn!("replacing a scheduler run handle that was never taken");
            stale.task.abort();
        }
    }

    /// Take the current run handle, if a scheduler is (or was) running.
    pub async fn take_run(&self) -> Option<RunHandle> {
        self.run.lock().await.take()
    }

    /// Gate serializing the mutating admin operations (register, start,
    /// restart, reset) so roster and lifecycle checks stay atomic.
    pub fn admin_gate(&self) -> &Mutex<()> {
        &self.admin_gate
    }
}
