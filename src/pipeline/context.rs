//! Process-scoped validation context: the store, one driver per run kind, approximate counters
//! and the background run handles. Replaces any global run state.

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDateTime};
use image::DynamicImage;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::engine::classify::Outcome;
use crate::engine::db_ops::{
    BatchStore, CutoffBucket, cutoff_buckets, list_errors, open_catalog, status_counts,
    validation_tables_present,
};
use crate::engine::tools::format_stamp;
use crate::error::Declined;
use crate::pipeline::driver::{ProgressFn, ValidationDriver};
use crate::preview::{self, PreviewCache};
use crate::review::{self, ReviewOutcome};
use crate::utils::config::{StatusConsts, StoreConsts};
use crate::{
    ErrorReviewRow, ImageId, Opts, ReviewKind, RunMode, RunSummary, StatusCounts, StatusSnapshot,
};

const UNKNOWN: i64 = -1;

/// Approximate category counts: exact after a refresh, then nudged per completed item.
/// `-1` means not known yet.
pub struct ApproxCounts {
    new_images: AtomicI64,
    due_images: AtomicI64,
    new_errors: AtomicI64,
    revalidation_errors: AtomicI64,
}

impl Default for ApproxCounts {
    fn default() -> Self {
        ApproxCounts {
            new_images: AtomicI64::new(UNKNOWN),
            due_images: AtomicI64::new(UNKNOWN),
            new_errors: AtomicI64::new(UNKNOWN),
            revalidation_errors: AtomicI64::new(UNKNOWN),
        }
    }
}

fn known(a: &AtomicI64) -> Option<u64> {
    u64::try_from(a.load(Ordering::Relaxed)).ok()
}

fn nudge(a: &AtomicI64, delta: i64) {
    let _ = a.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        (v >= 0).then(|| (v + delta).max(0))
    });
}

impl ApproxCounts {
    pub fn set(&self, c: &StatusCounts) {
        self.new_images.store(c.new_images as i64, Ordering::Relaxed);
        self.due_images.store(c.due_images as i64, Ordering::Relaxed);
        self.new_errors.store(c.new_errors as i64, Ordering::Relaxed);
        self.revalidation_errors
            .store(c.revalidation_errors as i64, Ordering::Relaxed);
    }

    /// One candidate of `mode` finished with `outcome`.
    pub fn record_completion(&self, mode: RunMode, outcome: &Outcome) {
        let failed = matches!(outcome, Outcome::Failed(_));
        match mode {
            RunMode::Discovery => {
                nudge(&self.new_images, -1);
                if failed {
                    nudge(&self.new_errors, 1);
                }
            }
            RunMode::Revalidation { .. } => {
                nudge(&self.due_images, -1);
                if failed {
                    nudge(&self.revalidation_errors, 1);
                }
            }
        }
    }

    fn fill(&self, snap: &mut StatusSnapshot) {
        snap.new_images = known(&self.new_images);
        snap.due_images = known(&self.due_images);
        snap.new_errors = known(&self.new_errors);
        snap.revalidation_errors = known(&self.revalidation_errors);
    }
}

/// A driver and the handle of its background run, if any.
struct RunSlot {
    driver: ValidationDriver,
    handle: Mutex<Option<JoinHandle<Result<RunSummary>>>>,
}

impl RunSlot {
    fn new(driver: ValidationDriver) -> Self {
        RunSlot {
            driver,
            handle: Mutex::new(None),
        }
    }

    fn wait(&self) -> Option<Result<RunSummary>> {
        let handle = match self.handle.lock() {
            Ok(mut h) => h.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }?;
        Some(
            handle
                .join()
                .unwrap_or_else(|_| Err(anyhow!("run thread panicked"))),
        )
    }
}

/// Everything one catalog needs for validation, owned in one place.
pub struct Validator {
    store: Arc<BatchStore>,
    catalog: Option<PathBuf>,
    counts: Arc<ApproxCounts>,
    discovery: Arc<RunSlot>,
    revalidation: Arc<RunSlot>,
    last_refresh: Mutex<Option<Instant>>,
}

impl Validator {
    /// Open `opts.catalog` and check it carries the side tables.
    pub fn open(opts: &Opts) -> Result<Self> {
        let conn = open_catalog(&opts.catalog)?;
        let mut v = Self::from_connection(conn, opts)?;
        v.catalog = Some(opts.catalog.clone());
        Ok(v)
    }

    /// Build over an already-open connection (in-memory catalogs, tests). No preview cache.
    pub fn from_connection(conn: Connection, opts: &Opts) -> Result<Self> {
        if !validation_tables_present(&conn)? {
            return Err(Declined::NotInitialized.into());
        }
        let store = Arc::new(BatchStore::new(conn, opts.batch_size));
        let counts = Arc::new(ApproxCounts::default());
        let driver = |label| {
            ValidationDriver::new(
                label,
                Arc::clone(&store),
                Arc::clone(&counts),
                opts.max_concurrent,
            )
        };
        Ok(Validator {
            discovery: Arc::new(RunSlot::new(driver("discovery"))),
            revalidation: Arc::new(RunSlot::new(driver("revalidation"))),
            store,
            catalog: None,
            counts,
            last_refresh: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    fn slot(&self, mode: RunMode) -> &Arc<RunSlot> {
        match mode {
            RunMode::Discovery => &self.discovery,
            RunMode::Revalidation { .. } => &self.revalidation,
        }
    }

    fn start(&self, mode: RunMode) -> Result<(), Declined> {
        let slot = self.slot(mode);
        let claim = slot.driver.claim()?;
        let runner = Arc::clone(slot);
        let handle = thread::spawn(move || runner.driver.run_claimed(claim, mode, None));
        let mut h = match slot.handle.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(old) = h.replace(handle)
            && let Ok(Err(e)) = old.join()
        {
            log::warn!("Previous {} run ended with an error: {:#}", mode.label(), e);
        }
        Ok(())
    }

    /// Start discovery in the background. Declined while a discovery run is active.
    pub fn start_discovery(&self) -> Result<(), Declined> {
        self.start(RunMode::Discovery)
    }

    /// Start revalidation of records last checked before `cutoff` in the background.
    pub fn start_revalidation(&self, cutoff: NaiveDateTime) -> Result<(), Declined> {
        self.start(RunMode::Revalidation { cutoff })
    }

    /// Returns whether a run was active to cancel. Safe to call repeatedly.
    pub fn cancel_discovery(&self) -> bool {
        self.discovery.driver.cancel()
    }

    pub fn cancel_revalidation(&self) -> bool {
        self.revalidation.driver.cancel()
    }

    /// Join the background discovery run. `None` when none was started since the last wait.
    pub fn wait_discovery(&self) -> Option<Result<RunSummary>> {
        self.discovery.wait()
    }

    pub fn wait_revalidation(&self) -> Option<Result<RunSummary>> {
        self.revalidation.wait()
    }

    /// Run on the calling thread (CLI). `progress` is ticked per completed candidate.
    pub fn run_blocking(&self, mode: RunMode, progress: Option<ProgressFn>) -> Result<RunSummary> {
        self.slot(mode).driver.run(mode, progress)
    }

    /// Cancel whichever runs are active (Ctrl+C).
    pub fn cancel_all(&self) {
        self.cancel_discovery();
        self.cancel_revalidation();
    }

    pub fn is_busy(&self) -> bool {
        self.discovery.driver.is_busy() || self.revalidation.driver.is_busy()
    }

    /// Current snapshot without touching the catalog. Counts may be approximate or unknown.
    pub fn status(&self) -> StatusSnapshot {
        let mut snap = StatusSnapshot {
            in_flight: self.discovery.driver.in_flight() + self.revalidation.driver.in_flight(),
            discovery_active: self.discovery.driver.is_busy(),
            revalidation_active: self.revalidation.driver.is_busy(),
            ..Default::default()
        };
        self.counts.fill(&mut snap);
        snap
    }

    /// Re-query exact counts. While a run is active this happens at most once per refresh
    /// interval unless `force`; otherwise the approximate counts are returned.
    /// `cutoff` defaults to now.
    pub fn refresh_status(
        &self,
        cutoff: Option<NaiveDateTime>,
        force: bool,
    ) -> Result<StatusSnapshot> {
        let mut last = self
            .last_refresh
            .lock()
            .map_err(|_| anyhow!("status lock poisoned"))?;
        let fresh = last.is_some_and(|t| t.elapsed() < StatusConsts::REFRESH_WHEN_BUSY);
        if !force && self.is_busy() && fresh {
            return Ok(self.status());
        }
        let cutoff = format_stamp(&cutoff.unwrap_or_else(|| Local::now().naive_local()));
        let counts = self.store.read(|conn| status_counts(conn, &cutoff))?;
        self.counts.set(&counts);
        *last = Some(Instant::now());
        Ok(self.status())
    }

    /// Cutoff choices that revalidate a chosen share of clean records.
    pub fn cutoff_buckets(&self) -> Result<Vec<CutoffBucket>> {
        self.store
            .read(|conn| cutoff_buckets(conn, StoreConsts::CUTOFF_BUCKETS))
    }

    /// Failures awaiting review. `None` lists both kinds.
    pub fn errors(&self, kind: Option<ReviewKind>) -> Result<Vec<ErrorReviewRow>> {
        self.store.read(|conn| list_errors(conn, kind))
    }

    /// Drop the error rows so the images are discovered again.
    pub fn review_ignore(&self, ids: &[ImageId]) -> Result<ReviewOutcome> {
        let out = review::ignore(&self.store, ids)?;
        self.mark_stale();
        Ok(out)
    }

    /// Adopt each error's new digest. Declined as a whole if any lacks one.
    pub fn review_accept(&self, ids: &[ImageId]) -> Result<ReviewOutcome> {
        let out = review::accept(&self.store, ids)?;
        self.mark_stale();
        Ok(out)
    }

    fn mark_stale(&self) {
        if let Ok(mut last) = self.last_refresh.lock() {
            *last = None;
        }
    }

    /// Decode the cached preview of `image_id` nearest `edge` pixels, rotated upright.
    /// `None` when the catalog has no preview cache or the preview cannot be read.
    pub fn preview(&self, image_id: ImageId, edge: u32) -> Option<DynamicImage> {
        let catalog = self.catalog.as_ref()?;
        let entry = PreviewCache::for_catalog(catalog).lookup(image_id)?;
        preview::extract(&entry.path, edge, &entry.orientation)
    }

    /// Commit any open batch now.
    pub fn flush(&self) -> Result<()> {
        self.store.force_commit().context("flush open batch")?;
        Ok(())
    }
}
