//! Validation driver: page through the pending candidates, hand each to the worker pool,
//! then drain, flush and re-arm.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::engine::classify::{FailureKind, Outcome, evaluate};
use crate::engine::db_ops::{BatchStore, discovery_page, due_page};
use crate::engine::tools::format_stamp;
use crate::error::Declined;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::context::ApproxCounts;
use crate::pipeline::error_handler::FirstError;
use crate::pipeline::pool::{Handler, WorkerPool};
use crate::utils::config::StoreConsts;
use crate::{Candidate, ImageId, RunMode, RunSummary};

/// Called with the number of candidates just completed.
pub type ProgressFn = Box<dyn Fn(usize) + Send + Sync>;

/// Proof that this driver's single run slot is taken. Releases it on drop.
pub struct RunClaim {
    busy: Arc<AtomicBool>,
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Outcome tallies, bumped by workers after a successful write.
#[derive(Default)]
struct Tally {
    recorded: AtomicUsize,
    confirmed: AtomicUsize,
    missing: AtomicUsize,
    unreadable: AtomicUsize,
    mismatched: AtomicUsize,
}

impl Tally {
    fn count(&self, outcome: &Outcome) {
        let slot = match outcome {
            Outcome::Recorded { .. } => &self.recorded,
            Outcome::Confirmed { .. } => &self.confirmed,
            Outcome::Failed(f) => match f.kind {
                FailureKind::Missing => &self.missing,
                FailureKind::Unreadable => &self.unreadable,
                FailureKind::Mismatch => &self.mismatched,
            },
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self, mode: RunMode, dispatched: usize, cancelled: bool) -> RunSummary {
        RunSummary {
            mode: mode.label(),
            dispatched,
            recorded: self.recorded.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            unreadable: self.unreadable.load(Ordering::Relaxed),
            mismatched: self.mismatched.load(Ordering::Relaxed),
            cancelled,
        }
    }
}

/// One kind of run (discovery or revalidation) with its own pool size, cancel flag and in-flight gauge.
/// At most one run per driver at a time.
pub struct ValidationDriver {
    label: &'static str,
    store: Arc<BatchStore>,
    counts: Arc<ApproxCounts>,
    max_concurrent: usize,
    cancel: CancelToken,
    busy: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl ValidationDriver {
    pub fn new(
        label: &'static str,
        store: Arc<BatchStore>,
        counts: Arc<ApproxCounts>,
        max_concurrent: usize,
    ) -> Self {
        ValidationDriver {
            label,
            store,
            counts,
            max_concurrent: max_concurrent.max(1),
            cancel: CancelToken::new(),
            busy: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take the run slot, or decline if a run of this kind is active.
    pub fn claim(&self) -> Result<RunClaim, Declined> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunClaim {
                busy: Arc::clone(&self.busy),
            })
            .map_err(|_| Declined::AlreadyRunning(self.label))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Request cancellation of the active run. Returns false (and does nothing) when idle.
    pub fn cancel(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Token for external cancel sources (Ctrl+C).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Handlers running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Claim and run to completion on the calling thread.
    pub fn run(&self, mode: RunMode, progress: Option<ProgressFn>) -> Result<RunSummary> {
        let claim = self.claim()?;
        self.run_claimed(claim, mode, progress)
    }

    /// Run with a slot already claimed (lets a caller claim synchronously and run elsewhere).
    ///
    /// Store failures stop dispatch; work already dispatched still drains and a final commit is
    /// attempted before the first failure is returned.
    pub fn run_claimed(
        &self,
        claim: RunClaim,
        mode: RunMode,
        progress: Option<ProgressFn>,
    ) -> Result<RunSummary> {
        log::debug!("Starting {} run", mode.label());
        // A cancel that arrived while idle must not stop this run.
        self.cancel.reset();
        let tally = Arc::new(Tally::default());
        let first_error = FirstError::new();
        let handler: Handler<Candidate> = {
            let store = Arc::clone(&self.store);
            let counts = Arc::clone(&self.counts);
            let tally = Arc::clone(&tally);
            let first_error = first_error.clone();
            Arc::new(move |candidate: Candidate| {
                let outcome = evaluate(&candidate);
                match store.write_outcome(&outcome) {
                    Ok(()) => {
                        tally.count(&outcome);
                        counts.record_completion(mode, &outcome);
                    }
                    Err(e) => first_error.record(&e),
                }
                if let Some(p) = progress.as_ref() {
                    p(1);
                }
            })
        };
        let pool = WorkerPool::with_gauge(self.max_concurrent, handler, Arc::clone(&self.in_flight));

        let page_size = StoreConsts::CANDIDATE_PAGE_SIZE;
        let mut after: ImageId = ImageId::MIN;
        let mut dispatched = 0usize;
        let mut cancelled = false;
        'pages: loop {
            if first_error.is_set() {
                break;
            }
            let page = match self.store.read(|conn| fetch_page(conn, mode, after, page_size)) {
                Ok(page) => page,
                Err(e) => {
                    first_error.record(&e);
                    break;
                }
            };
            let last_page = page.len() < page_size;
            for candidate in page {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'pages;
                }
                if first_error.is_set() {
                    break 'pages;
                }
                after = candidate.image_id();
                pool.dispatch(candidate);
                dispatched += 1;
            }
            if last_page {
                break;
            }
        }

        pool.drain();
        if pool.panicked() > 0 {
            log::warn!("{} handler(s) panicked during {} run", pool.panicked(), mode.label());
        }
        drop(pool);
        let committed = self.store.force_commit();
        self.cancel.reset();
        drop(claim);

        first_error.check()?;
        committed?;
        let summary = tally.summary(mode, dispatched, cancelled);
        log::info!(
            "{} run {}: {} dispatched, {} recorded, {} confirmed, {} failed",
            mode.label(),
            if cancelled { "cancelled" } else { "finished" },
            summary.dispatched,
            summary.recorded,
            summary.confirmed,
            summary.failures()
        );
        Ok(summary)
    }
}

fn fetch_page(
    conn: &rusqlite::Connection,
    mode: RunMode,
    after: ImageId,
    limit: usize,
) -> Result<Vec<Candidate>> {
    Ok(match mode {
        RunMode::Discovery => discovery_page(conn, after, limit)?
            .into_iter()
            .map(Candidate::New)
            .collect(),
        RunMode::Revalidation { cutoff } => due_page(conn, &format_stamp(&cutoff), after, limit)?
            .into_iter()
            .map(Candidate::Due)
            .collect(),
    })
}
