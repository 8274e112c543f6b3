//! One search cycle for one source: fetch both queues, pick the next
//! round-robin batch from each and trigger a search per unit.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use super::batch::{cap_batch_sizes, slice_batch};
use super::models::{QueueKind, SearchUnit, SourceKind};
use super::source::SearchSource;
use super::strategy::SearchStrategy;
use crate::arr::ArrError;
use crate::history::{NewSearchAttempt, SearchHistoryStore};
use crate::server::metrics;
use crate::state::{SourceState, StateStore};

/// Per-cycle budget. Zero for `hard_max` means no combined cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleLimits {
    pub missing: usize,
    pub cutoff: usize,
    pub hard_max: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Raw candidates across both queues, before filtering.
    pub fetched: usize,
    pub searched: usize,
    /// Units whose search trigger failed.
    pub skipped: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// A fetch failed; nothing but the health fields changed.
    Aborted(ArrError),
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }
}

/// Collaborators a cycle reads from and writes to.
pub struct CycleContext<'a> {
    pub source: SourceKind,
    pub limits: CycleLimits,
    pub state_store: &'a dyn StateStore,
    pub history: &'a dyn SearchHistoryStore,
}

impl CycleContext<'_> {
    fn persist(&self, state: &SourceState) {
        if let Err(err) = self.state_store.save(self.source, state) {
            error!("{}: Failed to save state -- {:#}", self.source, err);
        }
    }

    fn record(&self, attempt: NewSearchAttempt) {
        metrics::record_search(self.source, attempt.queue, attempt.outcome);
        if let Err(err) = self.history.record(&attempt) {
            warn!("{}: Failed to record search history -- {:#}", self.source, err);
        }
    }
}

/// Runs one cycle. Never fails: fetch errors abort the cycle with only the
/// health fields updated, search errors are recorded and skipped.
///
/// Callers must make sure no other cycle for the same source runs at the
/// same time.
pub async fn run_cycle<S, C>(strategy: &S, client: &C, ctx: &CycleContext<'_>) -> CycleOutcome
where
    S: SearchStrategy,
    C: SearchSource<Item = S::Item, Unit = S::Unit>,
{
    let started = Instant::now();
    let now = Utc::now();
    let mut state = ctx.state_store.load(ctx.source);

    let fetched = match fetch_both(client).await {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!("{}: Fetch failed, skipping cycle -- {}", ctx.source, err);
            state.mark_unreachable(now);
            ctx.persist(&state);
            metrics::set_source_connected(ctx.source, false);
            metrics::record_cycle(ctx.source, "aborted", started.elapsed());
            return CycleOutcome::Aborted(err);
        }
    };
    let (missing_items, cutoff_items) = fetched;

    let raw_missing = missing_items.len();
    let raw_cutoff = cutoff_items.len();
    state.mark_connected(raw_missing, raw_cutoff);
    metrics::set_source_connected(ctx.source, true);
    metrics::set_candidates(ctx.source, QueueKind::Missing, raw_missing);
    metrics::set_candidates(ctx.source, QueueKind::Cutoff, raw_cutoff);

    let (missing_limit, cutoff_limit) =
        cap_batch_sizes(ctx.limits.missing, ctx.limits.cutoff, ctx.limits.hard_max);

    let mut searched = 0;
    let mut skipped = 0;
    for (queue, items, limit) in [
        (QueueKind::Missing, missing_items, missing_limit),
        (QueueKind::Cutoff, cutoff_items, cutoff_limit),
    ] {
        let units = strategy.build_units(items, now);
        let (batch, next_cursor) = slice_batch(&units, state.cursor(queue), limit);
        state.set_cursor(queue, next_cursor);
        ctx.persist(&state);

        for unit in batch {
            if trigger_one(client, ctx, queue, unit).await {
                searched += 1;
            } else {
                skipped += 1;
            }
        }
    }

    state.last_run = Some(now);
    ctx.persist(&state);

    let report = CycleReport {
        fetched: raw_missing + raw_cutoff,
        searched,
        skipped,
        elapsed: started.elapsed(),
    };
    info!(
        "{}: Cycle completed in {:.1}s -- {} fetched, {} searched, {} skipped",
        ctx.source,
        report.elapsed.as_secs_f64(),
        report.fetched,
        report.searched,
        report.skipped
    );
    metrics::record_cycle(ctx.source, "completed", report.elapsed);
    CycleOutcome::Completed(report)
}

/// Both queues or nothing.
async fn fetch_both<C: SearchSource>(client: &C) -> Result<(Vec<C::Item>, Vec<C::Item>), ArrError> {
    let missing = client.fetch_candidates(QueueKind::Missing).await?;
    let cutoff = client.fetch_candidates(QueueKind::Cutoff).await?;
    Ok((missing, cutoff))
}

async fn trigger_one<C>(client: &C, ctx: &CycleContext<'_>, queue: QueueKind, unit: &C::Unit) -> bool
where
    C: SearchSource,
    C::Unit: SearchUnit,
{
    let name = unit.display_name();
    match client.trigger_search(unit).await {
        Ok(()) => {
            info!("{}: Searched {} ({})", ctx.source, name, queue);
            ctx.record(NewSearchAttempt::searched(ctx.source, queue, name));
            true
        }
        Err(err) => {
            warn!("{}: Search failed for {} ({}) -- {}", ctx.source, name, queue, err);
            ctx.record(NewSearchAttempt::failed(
                ctx.source,
                queue,
                name,
                err.to_string(),
            ));
            false
        }
    }
}
