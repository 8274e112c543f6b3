use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::cycle::{run_cycle, CycleContext, CycleLimits, CycleOutcome};
use super::models::SourceKind;
use super::source::SearchSource;
use super::strategy::SearchStrategy;
use crate::history::SearchHistoryStore;
use crate::state::StateStore;

/// Object-safe handle on a source's worker, used by the scheduler and the API.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Runs a full cycle, waiting for any cycle already in progress first.
    async fn run_cycle_now(&self) -> CycleOutcome;

    fn is_running(&self) -> bool;

    /// New limits take effect from the next cycle.
    fn set_limits(&self, limits: CycleLimits);
}

/// Owns everything one source's cycles need, including the lock that keeps
/// scheduled and manual cycles from interleaving.
pub struct SearchWorker<S, C> {
    source: SourceKind,
    strategy: S,
    client: C,
    limits: StdMutex<CycleLimits>,
    state_store: Arc<dyn StateStore>,
    history: Arc<dyn SearchHistoryStore>,
    cycle_lock: Arc<Mutex<()>>,
}

impl<S, C> SearchWorker<S, C> {
    pub fn new(
        source: SourceKind,
        strategy: S,
        client: C,
        limits: CycleLimits,
        state_store: Arc<dyn StateStore>,
        history: Arc<dyn SearchHistoryStore>,
    ) -> Self {
        Self {
            source,
            strategy,
            client,
            limits: StdMutex::new(limits),
            state_store,
            history,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Shares `lock` with other workers of the same source, so a replacement
    /// worker waits for a cycle its predecessor still has in flight.
    pub fn with_cycle_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.cycle_lock = lock;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn limits(&self) -> CycleLimits {
        *self.limits.lock().unwrap()
    }
}

#[async_trait]
impl<S, C> CycleRunner for SearchWorker<S, C>
where
    S: SearchStrategy + 'static,
    C: SearchSource<Item = S::Item, Unit = S::Unit> + 'static,
{
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn run_cycle_now(&self) -> CycleOutcome {
        let _guard = self.cycle_lock.lock().await;
        let ctx = CycleContext {
            source: self.source,
            limits: self.limits(),
            state_store: self.state_store.as_ref(),
            history: self.history.as_ref(),
        };
        run_cycle(&self.strategy, &self.client, &ctx).await
    }

    fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    fn set_limits(&self, limits: CycleLimits) {
        *self.limits.lock().unwrap() = limits;
    }
}
