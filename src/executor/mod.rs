//! Bounded concurrent fan-out with a two-pass retry policy.
//!
//! Work units are partitioned into fixed-size groups and dispatched with a
//! per-call-site worker limit. A group retries internally with linear
//! backoff; groups that still fail after the first pass are resubmitted in
//! a second pass at roughly half the concurrency. Groups that fail both
//! passes are absorbed as omissions, visible to the caller only through the
//! requested-vs-resolved counts on the outcome.

use std::future::Future;

use futures::stream::{self, StreamExt};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::error::MarketError;

/// Live progress sink for a batch phase. Implementations must be cheap and
/// thread-safe; the executor calls them from concurrently running groups.
pub trait BatchObserver: Send + Sync {
    fn groups_planned(&self, total: usize);
    fn group_succeeded(&self);
    fn group_redone(&self);
}

/// Observer for call sites that do not surface live progress.
pub struct NullObserver;

impl BatchObserver for NullObserver {
    fn groups_planned(&self, _total: usize) {}
    fn group_succeeded(&self) {}
    fn group_redone(&self) {}
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Units per group. 1 for calls that need full per-item detail, larger
    /// for calls that accept a batched identifier list.
    pub group_size: usize,
    /// Worker limit for the first pass; the redo pass runs at half of it.
    pub workers: usize,
    /// Attempts per group within a pass, including the first.
    pub attempts: u32,
    pub backoff_base: Duration,
    pub backoff_step: Duration,
}

impl BatchConfig {
    /// Singleton groups: one remote call per unit.
    pub fn singleton(workers: usize) -> Self {
        Self {
            group_size: 1,
            workers,
            attempts: 3,
            backoff_base: Duration::from_millis(800),
            backoff_step: Duration::from_millis(800),
        }
    }

    /// Bulk groups: one remote call per `group_size` units.
    pub fn bulk(group_size: usize, workers: usize) -> Self {
        Self {
            group_size,
            ..Self::singleton(workers)
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    fn redo_workers(&self) -> usize {
        (self.workers / 2).max(2)
    }
}

/// Result of a two-pass batch run. Order of `results` is unspecified.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    pub results: Vec<R>,
    pub requested_groups: usize,
    pub resolved_groups: usize,
    pub redone_groups: usize,
}

impl<R> BatchOutcome<R> {
    /// True when no group was dropped; a degraded run is not an error, but
    /// callers can detect it here.
    pub fn is_complete(&self) -> bool {
        self.resolved_groups == self.requested_groups
    }
}

/// Run `fetch` over `units`, grouped and bounded per `cfg`.
///
/// `fetch` receives one group and returns the partial results for it; any
/// error is treated as transient and retried. A group exhausting its
/// attempts in pass one is resubmitted in pass two; a group failing both
/// passes is dropped.
pub async fn run_batches<T, R, F, Fut>(
    units: Vec<T>,
    cfg: &BatchConfig,
    observer: &dyn BatchObserver,
    fetch: F,
) -> BatchOutcome<R>
where
    T: Clone + Send,
    R: Send,
    F: Fn(Vec<T>) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<R>, MarketError>> + Send,
{
    let groups: Vec<Vec<T>> = units
        .chunks(cfg.group_size.max(1))
        .map(|c| c.to_vec())
        .collect();
    let requested_groups = groups.len();
    observer.groups_planned(requested_groups);

    if groups.is_empty() {
        return BatchOutcome {
            results: Vec::new(),
            requested_groups: 0,
            resolved_groups: 0,
            redone_groups: 0,
        };
    }

    let mut results = Vec::new();
    let mut resolved_groups = 0;

    // First pass at full concurrency.
    let (ok, failed) = run_pass(groups, cfg.workers, cfg, &fetch).await;
    for part in ok {
        results.extend(part);
        resolved_groups += 1;
        observer.group_succeeded();
    }

    // Redo pass at reduced concurrency so retries do not compound the
    // rate-limit pressure that likely caused the failures.
    let mut redone_groups = 0;
    if !failed.is_empty() {
        warn!("Redoing {} failed groups at reduced concurrency", failed.len());
        let (ok, dropped) = run_pass(failed, cfg.redo_workers(), cfg, &fetch).await;
        for part in ok {
            results.extend(part);
            resolved_groups += 1;
            redone_groups += 1;
            observer.group_redone();
        }
        if !dropped.is_empty() {
            warn!(
                "{} groups failed both passes and were dropped",
                dropped.len()
            );
        }
    }

    BatchOutcome {
        results,
        requested_groups,
        resolved_groups,
        redone_groups,
    }
}

/// One concurrency-bounded sweep over `groups`. Returns the successful
/// partial results and the groups that exhausted their attempts.
async fn run_pass<T, R, F, Fut>(
    groups: Vec<Vec<T>>,
    workers: usize,
    cfg: &BatchConfig,
    fetch: &F,
) -> (Vec<Vec<R>>, Vec<Vec<T>>)
where
    T: Clone + Send,
    R: Send,
    F: Fn(Vec<T>) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<R>, MarketError>> + Send,
{
    let outcomes: Vec<Result<Vec<R>, Vec<T>>> = stream::iter(groups)
        .map(|group| async move {
            let mut attempt: u32 = 0;
            loop {
                match fetch(group.clone()).await {
                    Ok(part) => return Ok(part),
                    Err(err) => {
                        attempt += 1;
                        if !err.is_retryable() || attempt >= cfg.attempts {
                            debug!("Group failed after {} attempts: {}", attempt, err);
                            return Err(group);
                        }
                        let backoff = cfg.backoff_base + cfg.backoff_step * (attempt - 1);
                        debug!(
                            "Group attempt {} failed ({}), backing off {:?}",
                            attempt, err, backoff
                        );
                        sleep(backoff).await;
                    }
                }
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(part) => ok.push(part),
            Err(group) => failed.push(group),
        }
    }
    (ok, failed)
}
