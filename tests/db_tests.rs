//! DB tests: batched commits, candidate queries, status counts, cutoff buckets, error listing.

mod common;

use common::{TestCatalog, count, insert_error, insert_record};
use rusqlite::params;
use valicat::engine::classify::Outcome;
use valicat::engine::{
    BatchStore, cutoff_buckets, discovery_page, due_page, list_errors, open_catalog,
    open_catalog_in_memory, status_counts, validation_tables_present,
};
use valicat::{Digest, ReviewKind};

fn recorded(id: i64) -> Outcome {
    Outcome::Recorded {
        image_id: id,
        digest: Digest([id as u8; 16]),
        path: format!("/photos/{id}.jpg"),
    }
}

fn empty_store(batch_size: usize) -> (tempfile::TempDir, BatchStore) {
    TestCatalog::new().into_store(batch_size)
}

// --- batching ---

#[test]
fn test_batch_of_exactly_batch_size_commits_once() {
    let (_dir, store) = empty_store(50);
    for id in 1..=50 {
        store.write_outcome(&recorded(id)).unwrap();
    }
    assert_eq!(store.commit_count(), 1);
    assert!(!store.has_open_transaction());
    assert_eq!(store.pending_writes(), 0);
}

#[test]
fn test_one_past_batch_size_leaves_one_open() {
    let (_dir, store) = empty_store(50);
    for id in 1..=51 {
        store.write_outcome(&recorded(id)).unwrap();
    }
    assert_eq!(store.commit_count(), 1);
    assert!(store.has_open_transaction());
    assert_eq!(store.pending_writes(), 1);
}

#[test]
fn test_force_commit_is_noop_when_nothing_open() {
    let (_dir, store) = empty_store(50);
    assert!(!store.force_commit().unwrap());
    assert_eq!(store.commit_count(), 0);

    for id in 1..=51 {
        store.write_outcome(&recorded(id)).unwrap();
    }
    assert!(store.force_commit().unwrap());
    assert_eq!(store.commit_count(), 2);
    assert!(!store.force_commit().unwrap());
    assert_eq!(store.commit_count(), 2);
    assert_eq!(count(&store, "LightroomValidateImages"), 51);
}

#[test]
fn test_commit_if_needed_only_when_full() {
    let (_dir, store) = empty_store(3);
    store.begin_or_continue_batch().unwrap();
    assert!(store.has_open_transaction());
    assert!(!store.commit_if_needed().unwrap());
    store.write_outcome(&recorded(1)).unwrap();
    store.write_outcome(&recorded(2)).unwrap();
    assert!(!store.commit_if_needed().unwrap());
    assert_eq!(store.pending_writes(), 2);
}

#[test]
fn test_transaction_flushes_open_batch_first() {
    let (_dir, store) = empty_store(50);
    for id in 1..=3 {
        store.write_outcome(&recorded(id)).unwrap();
    }
    let n: i64 = store
        .transaction(|tx| Ok(tx.query_row("SELECT COUNT(*) FROM LightroomValidateImages", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(store.commit_count(), 1);
    assert!(!store.has_open_transaction());
}

#[test]
fn test_transaction_rolls_back_on_error() {
    let (_dir, store) = empty_store(50);
    let res: anyhow::Result<()> = store.transaction(|tx| {
        tx.execute(
            "INSERT INTO LightroomValidateErrors (ImageID, ValidationError) VALUES (?1, 'x')",
            params![7],
        )?;
        anyhow::bail!("abort")
    });
    assert!(res.is_err());
    assert_eq!(count(&store, "LightroomValidateErrors"), 0);
}

#[test]
fn test_outcome_writes_land_in_the_right_table() {
    let (_dir, store) = empty_store(50);
    store.write_outcome(&recorded(1)).unwrap();
    store
        .write_outcome(&Outcome::Failed(valicat::engine::Failure {
            image_id: 2,
            kind: valicat::engine::FailureKind::Missing,
            new_digest: None,
            message: "gone".into(),
            suggestion: "find it".into(),
        }))
        .unwrap();
    store.force_commit().unwrap();
    let rec = common::record_of(&store, 1).unwrap();
    assert_eq!(rec.0, "01010101010101010101010101010101");
    assert_eq!(rec.1, rec.2);
    assert_eq!(rec.3.as_deref(), Some("/photos/1.jpg"));
    assert_eq!(
        common::error_of(&store, 2),
        Some((None, "gone".to_string()))
    );
}

// --- connection ---

#[test]
fn test_open_catalog_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(open_catalog(&dir.path().join("nope.lrcat")).is_err());
}

#[test]
fn test_open_catalog_on_disk_detects_tables() {
    let (cat, path) = TestCatalog::on_disk("Catalog.lrcat");
    let _dir = cat.dir;
    drop(cat.conn);
    let conn = open_catalog(&path).unwrap();
    assert!(validation_tables_present(&conn).unwrap());
}

#[test]
fn test_tables_absent_in_empty_db() {
    let conn = open_catalog_in_memory().unwrap();
    assert!(!validation_tables_present(&conn).unwrap());
}

// --- candidate queries ---

#[test]
fn test_discovery_page_skips_virtual_copies_records_and_errors() {
    let mut cat = TestCatalog::new();
    let a = cat.add_image("a", b"a");
    let b = cat.add_image("b", b"b");
    let _copy = cat.add_virtual_copy("a", a);
    let c = cat.add_image("c", b"c");
    let d = cat.add_missing_image("d");
    let expected_a = cat.file_path("a");
    let (_dir, store) = cat.into_store(50);
    insert_record(&store, b, "00", "2020-01-01T00:00:00");
    insert_error(&store, c, None);

    let page = store.read(|conn| discovery_page(conn, i64::MIN, 100)).unwrap();
    let ids: Vec<i64> = page.iter().map(|p| p.image_id).collect();
    assert_eq!(ids, vec![a, d]);
    assert_eq!(page[0].path, expected_a);
}

#[test]
fn test_discovery_page_keyset_paging() {
    let mut cat = TestCatalog::new();
    let ids: Vec<i64> = (0..5).map(|i| cat.add_image(&format!("p{i}"), b"x")).collect();
    let (_dir, store) = cat.into_store(50);
    let first = store.read(|conn| discovery_page(conn, i64::MIN, 2)).unwrap();
    assert_eq!(first.len(), 2);
    let after = first[1].image_id;
    let rest = store.read(|conn| discovery_page(conn, after, 10)).unwrap();
    let rest_ids: Vec<i64> = rest.iter().map(|p| p.image_id).collect();
    assert_eq!(rest_ids, ids[2..].to_vec());
}

#[test]
fn test_due_page_uses_strict_cutoff_and_skips_errors() {
    let mut cat = TestCatalog::new();
    let old = cat.add_image("old", b"o");
    let edge = cat.add_image("edge", b"e");
    let failed = cat.add_image("failed", b"f");
    let (_dir, store) = cat.into_store(50);
    insert_record(&store, old, "AA", "2020-01-01T00:00:00");
    insert_record(&store, edge, "BB", "2020-06-01T00:00:00");
    insert_record(&store, failed, "CC", "2020-01-01T00:00:00");
    insert_error(&store, failed, Some("DD"));

    let due = store
        .read(|conn| due_page(conn, "2020-06-01T00:00:00", i64::MIN, 100))
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].image_id, old);
    assert_eq!(due[0].prior_digest, "AA");
    assert!(due[0].current_path.is_some());
    assert_eq!(due[0].last_checked_at.as_deref(), Some("2020-01-01T00:00:00"));
}

#[test]
fn test_status_counts_four_categories() {
    let mut cat = TestCatalog::new();
    let new1 = cat.add_image("n1", b"1");
    let _new2 = cat.add_missing_image("n2");
    let due = cat.add_image("due", b"d");
    let fresh = cat.add_image("fresh", b"f");
    let new_err = cat.add_missing_image("ne");
    let reval_err = cat.add_image("re", b"r");
    let _copy = cat.add_virtual_copy("n1", new1);
    let (_dir, store) = cat.into_store(50);
    insert_record(&store, due, "AA", "2020-01-01T00:00:00");
    insert_record(&store, fresh, "BB", "2024-01-01T00:00:00");
    insert_error(&store, new_err, None);
    insert_record(&store, reval_err, "CC", "2020-01-01T00:00:00");
    insert_error(&store, reval_err, Some("DD"));

    let counts = store
        .read(|conn| status_counts(conn, "2023-01-01T00:00:00"))
        .unwrap();
    assert_eq!(counts.new_images, 2);
    assert_eq!(counts.due_images, 1);
    assert_eq!(counts.new_errors, 1);
    assert_eq!(counts.revalidation_errors, 1);
}

#[test]
fn test_status_error_counts_skip_virtual_copies() {
    let mut cat = TestCatalog::new();
    let master = cat.add_image("m", b"m");
    let copy = cat.add_virtual_copy("m", master);
    let copy2 = cat.add_virtual_copy("m", master);
    let (_dir, store) = cat.into_store(50);
    insert_error(&store, copy, None);
    insert_record(&store, copy2, "AA", "2020-01-01T00:00:00");
    insert_error(&store, copy2, Some("BB"));

    let counts = store
        .read(|conn| status_counts(conn, "2023-01-01T00:00:00"))
        .unwrap();
    assert_eq!(counts.new_errors, 0);
    assert_eq!(counts.revalidation_errors, 0);
    let listed = store.read(|conn| list_errors(conn, None)).unwrap();
    assert!(listed.is_empty());
}

// --- cutoff buckets ---

#[test]
fn test_cutoff_buckets_empty() {
    let (_dir, store) = empty_store(50);
    let buckets = store.read(|conn| cutoff_buckets(conn, 10)).unwrap();
    assert!(buckets.is_empty());
}

#[test]
fn test_cutoff_buckets_cumulative_from_oldest() {
    let (_dir, store) = empty_store(50);
    for i in 0..20 {
        insert_record(&store, i + 1, "AA", &format!("2024-03-01T10:{:02}:30", i));
    }
    let buckets = store.read(|conn| cutoff_buckets(conn, 10)).unwrap();
    let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![20, 17, 14, 11, 8, 5, 2]);
    assert_eq!(buckets[0].newest_minute, "2024-03-01T10:19");
    assert_eq!(buckets[0].cutoff, "2024-03-01T10:20:00");
    assert_eq!(buckets[6].newest_minute, "2024-03-01T10:01");
}

#[test]
fn test_cutoff_bucket_count_matches_due_count() {
    let (_dir, store) = empty_store(50);
    for i in 0..20 {
        insert_record(&store, i + 1, "AA", &format!("2024-03-01T10:{:02}:30", i));
    }
    let buckets = store.read(|conn| cutoff_buckets(conn, 10)).unwrap();
    for b in &buckets {
        let due = store
            .read(|conn| due_page(conn, &b.cutoff, i64::MIN, 1000))
            .unwrap();
        assert_eq!(due.len() as u64, b.count, "cutoff {}", b.cutoff);
    }
}

// --- error listing ---

#[test]
fn test_list_errors_by_kind() {
    let mut cat = TestCatalog::new();
    let never = cat.add_missing_image("never");
    let changed = cat.add_image("changed", b"c");
    let (_dir, store) = cat.into_store(50);
    insert_error(&store, never, None);
    insert_record(&store, changed, "AA", "2020-01-01T00:00:00");
    insert_error(&store, changed, Some("BB"));

    let new_errors = store
        .read(|conn| list_errors(conn, Some(ReviewKind::NewErrors)))
        .unwrap();
    assert_eq!(new_errors.len(), 1);
    assert_eq!(new_errors[0].image_id, never);
    assert!(new_errors[0].prior_path.is_none());
    assert!(new_errors[0].catalog_path.as_deref().unwrap().ends_with("never.jpg"));

    let reval = store
        .read(|conn| list_errors(conn, Some(ReviewKind::RevalidationErrors)))
        .unwrap();
    assert_eq!(reval.len(), 1);
    assert_eq!(reval[0].image_id, changed);
    assert_eq!(reval[0].new_digest.as_deref(), Some("BB"));
    assert_eq!(reval[0].orientation.as_deref(), Some("AB"));
    assert_eq!(reval[0].last_checked_at.as_deref(), Some("2020-01-01T00:00:00"));

    let all = store.read(|conn| list_errors(conn, None)).unwrap();
    assert_eq!(all.len(), 2);
}
