//! Batched outcome writes over the single shared catalog connection.
//!
//! Every outcome write, commit and batch-counter change happens under one mutex. Writes 1..=N of
//! a batch share a transaction; the Nth write commits it and the next write opens a fresh one.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, Transaction, params};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::engine::classify::Outcome;
use crate::engine::tools::now_stamp;

use super::{INSERT_ERROR_SQL, INSERT_RECORD_SQL, TOUCH_RECORD_SQL};

struct BatchState {
    conn: Connection,
    writes_since_commit: usize,
    open: bool,
}

/// Persistence façade: the only path from the pipeline to the catalog.
pub struct BatchStore {
    state: Mutex<BatchState>,
    batch_size: usize,
    commits: AtomicUsize,
}

impl BatchStore {
    pub fn new(conn: Connection, batch_size: usize) -> Self {
        BatchStore {
            state: Mutex::new(BatchState {
                conn,
                writes_since_commit: 0,
                open: false,
            }),
            batch_size: batch_size.max(1),
            commits: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BatchState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("store lock poisoned by a panicking writer"))
    }

    fn begin_locked(st: &mut BatchState) -> Result<()> {
        if !st.open {
            st.conn.execute_batch("BEGIN").context("begin batch")?;
            st.open = true;
        }
        Ok(())
    }

    fn commit_locked(&self, st: &mut BatchState) -> Result<bool> {
        if !st.open {
            return Ok(false);
        }
        st.conn.execute_batch("COMMIT").context("commit batch")?;
        st.open = false;
        log::debug!("Committed batch of {} writes", st.writes_since_commit);
        st.writes_since_commit = 0;
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn commit_if_due_locked(&self, st: &mut BatchState) -> Result<bool> {
        if st.writes_since_commit >= self.batch_size {
            self.commit_locked(st)
        } else {
            Ok(false)
        }
    }

    /// Open a batch transaction unless one is already open.
    pub fn begin_or_continue_batch(&self) -> Result<()> {
        let mut st = self.lock()?;
        Self::begin_locked(&mut st)
    }

    /// Write one outcome into the open batch (opening one if needed), committing when the batch is full.
    pub fn write_outcome(&self, outcome: &Outcome) -> Result<()> {
        let mut st = self.lock()?;
        Self::begin_locked(&mut st)?;
        apply_outcome(&st.conn, outcome, &now_stamp())?;
        st.writes_since_commit += 1;
        self.commit_if_due_locked(&mut st)?;
        Ok(())
    }

    /// Commit if the batch has reached its size. Returns whether a commit happened.
    pub fn commit_if_needed(&self) -> Result<bool> {
        let mut st = self.lock()?;
        self.commit_if_due_locked(&mut st)
    }

    /// Final flush. No-op when nothing is open. Not for use from inside the batched write path.
    pub fn force_commit(&self) -> Result<bool> {
        let mut st = self.lock()?;
        self.commit_locked(&mut st)
    }

    /// Commits performed since the store was created.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn has_open_transaction(&self) -> bool {
        self.lock().map(|st| st.open).unwrap_or(false)
    }

    /// Writes in the currently open batch.
    pub fn pending_writes(&self) -> usize {
        self.lock().map(|st| st.writes_since_commit).unwrap_or(0)
    }

    /// Run read-only queries on the shared connection. Sees uncommitted batch writes.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let st = self.lock()?;
        f(&st.conn)
    }

    /// Run `f` in its own all-or-nothing transaction. Any open batch is committed first so the
    /// two never nest; an error from `f` rolls back everything `f` wrote.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut st = self.lock()?;
        self.commit_locked(&mut st)?;
        let tx = st.conn.transaction().context("begin transaction")?;
        let out = f(&tx)?;
        tx.commit().context("commit transaction")?;
        Ok(out)
    }
}

impl Drop for BatchStore {
    fn drop(&mut self) {
        let st = match self.state.get_mut() {
            Ok(st) => st,
            Err(poisoned) => poisoned.into_inner(),
        };
        if st.open
            && let Err(e) = st.conn.execute_batch("COMMIT")
        {
            log::warn!("Final commit on close failed; open batch rolled back: {}", e);
        }
    }
}

fn apply_outcome(conn: &Connection, outcome: &Outcome, now: &str) -> Result<()> {
    match outcome {
        Outcome::Recorded {
            image_id,
            digest,
            path,
        } => conn
            .prepare_cached(INSERT_RECORD_SQL)?
            .execute(params![image_id, now, digest.to_hex(), path])
            .with_context(|| format!("insert record for image {image_id}"))?,
        Outcome::Confirmed { image_id } => conn
            .prepare_cached(TOUCH_RECORD_SQL)?
            .execute(params![image_id, now])
            .with_context(|| format!("touch record for image {image_id}"))?,
        Outcome::Failed(f) => conn
            .prepare_cached(INSERT_ERROR_SQL)?
            .execute(params![
                f.image_id,
                now,
                f.new_digest.map(|d| d.to_hex()),
                f.message,
                f.suggestion
            ])
            .with_context(|| format!("insert error for image {}", f.image_id))?,
    };
    Ok(())
}
