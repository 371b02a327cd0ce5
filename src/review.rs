//! Review of failed validations: ignore (forget the failure) or accept (adopt the new digest).
//! Both are all-or-nothing over the given image ids.

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Transaction, params};
use serde::Serialize;

use crate::engine::db_ops::{ACCEPT_SOURCE_SQL, ACCEPT_UPSERT_SQL, BatchStore, DELETE_ERROR_SQL};
use crate::engine::tools::now_stamp;
use crate::error::Declined;
use crate::{Digest, ImageId};

/// What a review request did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ReviewOutcome {
    /// Number of error rows resolved.
    Applied(usize),
    /// Refused before any write.
    #[serde(serialize_with = "serialize_declined")]
    Declined(Declined),
}

fn serialize_declined<S: serde::Serializer>(d: &Declined, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&d.to_string())
}

/// Delete the error rows for `ids` in one transaction. The images become discovery
/// candidates again (or revalidation candidates, when a record exists). Unknown ids are skipped.
pub fn ignore(store: &BatchStore, ids: &[ImageId]) -> Result<ReviewOutcome> {
    store.transaction(|tx| {
        let mut removed = 0;
        let mut stmt = tx.prepare_cached(DELETE_ERROR_SQL)?;
        for id in ids {
            removed += stmt
                .execute(params![id])
                .with_context(|| format!("delete error for image {id}"))?;
        }
        log::debug!("Ignored {} of {} errors", removed, ids.len());
        Ok(ReviewOutcome::Applied(removed))
    })
}

/// For each id, upsert the record with the error's new digest, last known path and a fresh
/// check time, then delete the error row. If any id has no new digest nothing is written.
pub fn accept(store: &BatchStore, ids: &[ImageId]) -> Result<ReviewOutcome> {
    store.transaction(|tx| {
        let mut sources = Vec::with_capacity(ids.len());
        for &id in ids {
            match accept_source(tx, id)? {
                Some(source) => sources.push((id, source)),
                None => return Ok(ReviewOutcome::Declined(Declined::NoNewDigest(id))),
            }
        }
        let now = now_stamp();
        let mut upsert = tx.prepare_cached(ACCEPT_UPSERT_SQL)?;
        let mut delete = tx.prepare_cached(DELETE_ERROR_SQL)?;
        for (id, (digest, path)) in &sources {
            upsert
                .execute(params![id, now, digest.to_hex(), path])
                .with_context(|| format!("accept digest for image {id}"))?;
            delete
                .execute(params![id])
                .with_context(|| format!("delete error for image {id}"))?;
        }
        log::debug!("Accepted {} new digests", sources.len());
        Ok(ReviewOutcome::Applied(sources.len()))
    })
}

/// New digest and last known path of an error row. `None` when the row is absent or carries no
/// parseable digest.
fn accept_source(tx: &Transaction<'_>, id: ImageId) -> Result<Option<(Digest, Option<String>)>> {
    let row: Option<(Option<String>, Option<String>)> = tx
        .prepare_cached(ACCEPT_SOURCE_SQL)?
        .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()
        .with_context(|| format!("read error for image {id}"))?;
    Ok(row.and_then(|(digest, path)| {
        let digest = digest?.parse::<Digest>().ok()?;
        Some((digest, path))
    }))
}
