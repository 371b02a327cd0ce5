//! Read-side queries: candidate pages, status counts, cutoff buckets, error listing.
//! Rows are decoded into named structs here.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use std::path::PathBuf;

use crate::utils::config::TIMESTAMP_FORMAT;
use crate::{DueCandidate, ErrorReviewRow, ImageId, NewCandidate, ReviewKind, StatusCounts};

use super::{
    CHECKED_PER_MINUTE_SQL, DISCOVERY_PAGE_SQL, DUE_PAGE_SQL, STATUS_COUNTS_SQL, list_errors_sql,
};

/// Up to `limit` discovery candidates with image id greater than `after`, in id order.
pub fn discovery_page(conn: &Connection, after: ImageId, limit: usize) -> Result<Vec<NewCandidate>> {
    let mut stmt = conn.prepare_cached(DISCOVERY_PAGE_SQL)?;
    let rows = stmt
        .query_map(params![after, limit as i64], |row| {
            let path: Option<String> = row.get(1)?;
            Ok(NewCandidate {
                image_id: row.get(0)?,
                path: PathBuf::from(path.unwrap_or_default()),
            })
        })
        .context("query discovery candidates")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("read discovery candidates")
}

/// Up to `limit` revalidation candidates last checked before `cutoff`, image id greater than `after`.
pub fn due_page(
    conn: &Connection,
    cutoff: &str,
    after: ImageId,
    limit: usize,
) -> Result<Vec<DueCandidate>> {
    let mut stmt = conn.prepare_cached(DUE_PAGE_SQL)?;
    let rows = stmt
        .query_map(params![cutoff, after, limit as i64], |row| {
            let path: Option<String> = row.get(1)?;
            Ok(DueCandidate {
                image_id: row.get(0)?,
                current_path: path.filter(|p| !p.is_empty()).map(PathBuf::from),
                prior_digest: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                prior_path: row.get(3)?,
                first_checked_at: row.get(4)?,
                last_checked_at: row.get(5)?,
            })
        })
        .context("query revalidation candidates")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("read revalidation candidates")
}

/// Exact counts of the four categories. Due images are those last checked before `cutoff`.
pub fn status_counts(conn: &Connection, cutoff: &str) -> Result<StatusCounts> {
    conn.query_row(STATUS_COUNTS_SQL, params![cutoff], |row| {
        Ok(StatusCounts {
            new_images: row.get::<_, i64>(0)? as u64,
            due_images: row.get::<_, i64>(1)? as u64,
            new_errors: row.get::<_, i64>(2)? as u64,
            revalidation_errors: row.get::<_, i64>(3)? as u64,
        })
    })
    .context("query status counts")
}

/// One choice of revalidation cutoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CutoffBucket {
    /// Timestamp to pass as the cutoff: one minute past `newest_minute`.
    pub cutoff: String,
    /// Newest check minute in this bucket (`YYYY-MM-DDTHH:MM`).
    pub newest_minute: String,
    /// Clean records the cutoff makes due: this bucket and every older one.
    pub count: u64,
}

/// Split clean records into at most `max_buckets` groups of roughly equal size, newest first.
/// A new bucket starts once the current one holds more than `total / max_buckets` records.
pub fn cutoff_buckets(conn: &Connection, max_buckets: usize) -> Result<Vec<CutoffBucket>> {
    let max_buckets = max_buckets.max(1);
    let mut stmt = conn.prepare(CHECKED_PER_MINUTE_SQL)?;
    let minutes = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get::<_, i64>(1)? as u64,
            ))
        })
        .context("query checked-per-minute")?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let total: u64 = minutes.iter().map(|(_, n)| n).sum();
    let share = total / max_buckets as u64;
    let mut buckets: Vec<(String, u64)> = Vec::new();
    for (minute, n) in minutes {
        let start_new = match buckets.last() {
            None => true,
            Some((_, count)) => *count > share && buckets.len() < max_buckets,
        };
        if start_new {
            buckets.push((minute, 0));
        }
        if let Some(last) = buckets.last_mut() {
            last.1 += n;
        }
    }
    for i in (0..buckets.len().saturating_sub(1)).rev() {
        buckets[i].1 += buckets[i + 1].1;
    }

    buckets
        .into_iter()
        .map(|(minute, count)| -> Result<CutoffBucket> {
            Ok(CutoffBucket {
                cutoff: minute_cutoff(&minute)?,
                newest_minute: minute,
                count,
            })
        })
        .collect()
}

fn minute_cutoff(minute: &str) -> Result<String> {
    let start = NaiveDateTime::parse_from_str(&format!("{minute}:00"), TIMESTAMP_FORMAT)
        .with_context(|| format!("unexpected check time {minute:?}"))?;
    Ok((start + Duration::minutes(1))
        .format(TIMESTAMP_FORMAT)
        .to_string())
}

/// Error rows for review. `None` lists both kinds.
pub fn list_errors(conn: &Connection, kind: Option<ReviewKind>) -> Result<Vec<ErrorReviewRow>> {
    let sql = match kind {
        Some(ReviewKind::NewErrors) => list_errors_sql("LEFT", "AND lvi.ImageID IS NULL"),
        Some(ReviewKind::RevalidationErrors) => list_errors_sql("INNER", ""),
        None => list_errors_sql("LEFT", ""),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], review_row)
        .context("query validation errors")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("read validation errors")
}

fn review_row(row: &Row<'_>) -> rusqlite::Result<ErrorReviewRow> {
    Ok(ErrorReviewRow {
        image_id: row.get(0)?,
        detected_at: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        new_digest: row.get::<_, Option<String>>(2)?.filter(|d| !d.is_empty()),
        message: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        suggestion: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        catalog_path: row.get(5)?,
        prior_path: row.get(6)?,
        orientation: row.get(7)?,
        last_checked_at: row.get(8)?,
        first_checked_at: row.get(9)?,
    })
}
