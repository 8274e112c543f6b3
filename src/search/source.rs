use async_trait::async_trait;

use super::models::QueueKind;
use crate::arr::ArrError;

/// A system that can list wanted candidates and trigger searches for them.
///
/// Implementations are expected to bound every call with their own timeout
/// and retry policy; the cycle treats any error as terminal for that call.
#[async_trait]
pub trait SearchSource: Send + Sync {
    type Item: Send + Sync;
    type Unit: Send + Sync;

    async fn fetch_candidates(&self, queue: QueueKind) -> Result<Vec<Self::Item>, ArrError>;

    async fn trigger_search(&self, unit: &Self::Unit) -> Result<(), ArrError>;
}
