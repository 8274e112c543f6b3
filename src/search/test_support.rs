//! In-memory source used by the cycle and worker tests.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::models::{QueueKind, SearchUnit};
use super::source::SearchSource;
use crate::arr::ArrError;

pub struct FakeSource<I, U> {
    pub missing: Mutex<Vec<I>>,
    pub cutoff: Mutex<Vec<I>>,
    pub fail_fetch: Mutex<bool>,
    /// Display names whose search trigger fails.
    pub failing: Mutex<Vec<String>>,
    pub searched: Mutex<Vec<String>>,
    pub search_delay: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    _unit: PhantomData<fn() -> U>,
}

impl<I, U> FakeSource<I, U> {
    pub fn new(missing: Vec<I>, cutoff: Vec<I>) -> Self {
        Self {
            missing: Mutex::new(missing),
            cutoff: Mutex::new(cutoff),
            fail_fetch: Mutex::new(false),
            failing: Mutex::new(Vec::new()),
            searched: Mutex::new(Vec::new()),
            search_delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            _unit: PhantomData,
        }
    }

    pub fn unreachable() -> Self {
        let source = Self::new(Vec::new(), Vec::new());
        *source.fail_fetch.lock().unwrap() = true;
        source
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn fail_search_for(&self, name: &str) {
        self.failing.lock().unwrap().push(name.to_string());
    }

    pub fn set_reachable(&self, reachable: bool) {
        *self.fail_fetch.lock().unwrap() = !reachable;
    }

    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }
}

#[async_trait]
impl<I, U> SearchSource for FakeSource<I, U>
where
    I: Clone + Send + Sync,
    U: SearchUnit + Send + Sync,
{
    type Item = I;
    type Unit = U;

    async fn fetch_candidates(&self, queue: QueueKind) -> Result<Vec<I>, ArrError> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(ArrError::Connection {
                path: format!("/api/v3/wanted/{}", queue),
                message: "connection refused".into(),
            });
        }
        Ok(match queue {
            QueueKind::Missing => self.missing.lock().unwrap().clone(),
            QueueKind::Cutoff => self.cutoff.lock().unwrap().clone(),
        })
    }

    async fn trigger_search(&self, unit: &U) -> Result<(), ArrError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = unit.display_name().to_string();
        if self.failing.lock().unwrap().contains(&name) {
            return Err(ArrError::Status {
                path: "/api/v3/command".into(),
                status: 500,
            });
        }
        self.searched.lock().unwrap().push(name);
        Ok(())
    }
}
