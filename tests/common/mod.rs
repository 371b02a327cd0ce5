//! Shared fixture: a minimal catalog (the tables and columns valicat reads) plus the two side
//! tables, with image files in a temp directory.

#![allow(dead_code)]

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use valicat::engine::BatchStore;
use valicat::{Opts, Validator};

pub const CATALOG_DDL: &str = r#"
CREATE TABLE AgLibraryRootFolder (id_local INTEGER PRIMARY KEY, absolutePath TEXT);
CREATE TABLE AgLibraryFolder (id_local INTEGER PRIMARY KEY, rootFolder INTEGER, pathFromRoot TEXT);
CREATE TABLE AgLibraryFile (id_local INTEGER PRIMARY KEY, folder INTEGER, baseName TEXT, extension TEXT);
CREATE TABLE Adobe_images (id_local INTEGER PRIMARY KEY, rootFile INTEGER, MasterImage INTEGER, orientation TEXT);
"#;

pub const SIDE_TABLES_DDL: &str = r#"
CREATE TABLE LightroomValidateImages (
    ImageID INTEGER PRIMARY KEY,
    InitialChecksumDateTime TEXT,
    LastValidateDateTime TEXT,
    checksum TEXT,
    Oldpath TEXT
);
CREATE TABLE LightroomValidateErrors (
    ImageID INTEGER PRIMARY KEY,
    ErrorDetectedDateTime TEXT,
    InvalidChecksum TEXT,
    ValidationError TEXT,
    SuggestedAction TEXT
);
"#;

/// Catalog under construction. Image files live in `dir`; the catalog itself is in memory
/// unless built with [`TestCatalog::on_disk`].
pub struct TestCatalog {
    pub dir: TempDir,
    pub conn: Connection,
    next_id: i64,
}

impl TestCatalog {
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        Self::with_connection(tempfile::tempdir().unwrap(), conn)
    }

    /// Catalog stored as `<dir>/<name>`, so it can be opened by path.
    pub fn on_disk(name: &str) -> (Self, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let conn = Connection::open(&path).unwrap();
        (Self::with_connection(dir, conn), path)
    }

    fn with_connection(dir: TempDir, conn: Connection) -> Self {
        conn.execute_batch(CATALOG_DDL).unwrap();
        conn.execute_batch(SIDE_TABLES_DDL).unwrap();
        let root = format!("{}/", dir.path().display());
        conn.execute(
            "INSERT INTO AgLibraryRootFolder (id_local, absolutePath) VALUES (1, ?1)",
            params![root],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO AgLibraryFolder (id_local, rootFolder, pathFromRoot) VALUES (1, 1, '')",
            [],
        )
        .unwrap();
        TestCatalog {
            dir,
            conn,
            next_id: 1,
        }
    }

    pub fn file_path(&self, base: &str) -> PathBuf {
        self.dir.path().join(format!("{base}.jpg"))
    }

    fn add_row(&mut self, base: &str, master: Option<i64>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.conn
            .execute(
                "INSERT INTO AgLibraryFile (id_local, folder, baseName, extension) VALUES (?1, 1, ?2, 'jpg')",
                params![id, base],
            )
            .unwrap();
        self.conn
            .execute(
                "INSERT INTO Adobe_images (id_local, rootFile, MasterImage, orientation) VALUES (?1, ?1, ?2, 'AB')",
                params![id, master],
            )
            .unwrap();
        id
    }

    /// Catalog image backed by a real file with `contents`.
    pub fn add_image(&mut self, base: &str, contents: &[u8]) -> i64 {
        std::fs::write(self.file_path(base), contents).unwrap();
        self.add_row(base, None)
    }

    /// Catalog image whose file does not exist.
    pub fn add_missing_image(&mut self, base: &str) -> i64 {
        self.add_row(base, None)
    }

    /// Virtual copy of `master`: same file, never a validation candidate.
    pub fn add_virtual_copy(&mut self, base: &str, master: i64) -> i64 {
        self.add_row(base, Some(master))
    }

    /// Hand the catalog to a validator. Keep the returned dir alive for the files.
    pub fn into_validator(self, max_concurrent: usize) -> (TempDir, Validator) {
        let opts = Opts {
            max_concurrent,
            ..Default::default()
        };
        let v = Validator::from_connection(self.conn, &opts).unwrap();
        (self.dir, v)
    }

    pub fn into_store(self, batch_size: usize) -> (TempDir, BatchStore) {
        (self.dir, BatchStore::new(self.conn, batch_size))
    }
}

pub fn write_file(path: &Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap();
}

pub fn count(store: &BatchStore, table: &str) -> i64 {
    store
        .read(|c| Ok(c.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
        .unwrap()
}

/// (checksum, InitialChecksumDateTime, LastValidateDateTime, Oldpath)
pub type RecordRow = (String, String, String, Option<String>);

pub fn record_of(store: &BatchStore, id: i64) -> Option<RecordRow> {
    store
        .read(|c| {
            Ok(c.query_row(
                "SELECT checksum, InitialChecksumDateTime, LastValidateDateTime, Oldpath \
                 FROM LightroomValidateImages WHERE ImageID = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?)
        })
        .unwrap()
}

/// (InvalidChecksum, ValidationError)
pub fn error_of(store: &BatchStore, id: i64) -> Option<(Option<String>, String)> {
    store
        .read(|c| {
            Ok(c.query_row(
                "SELECT InvalidChecksum, ValidationError FROM LightroomValidateErrors WHERE ImageID = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?)
        })
        .unwrap()
}

/// Backdate every record's last check so it falls before any recent cutoff.
pub fn age_records(store: &BatchStore, stamp: &str) {
    store
        .transaction(|tx| {
            tx.execute(
                "UPDATE LightroomValidateImages SET LastValidateDateTime = ?1",
                params![stamp],
            )?;
            Ok(())
        })
        .unwrap();
}

/// Insert a record directly (bypassing a run).
pub fn insert_record(store: &BatchStore, id: i64, checksum: &str, last: &str) {
    store
        .transaction(|tx| {
            tx.execute(
                "INSERT INTO LightroomValidateImages \
                 (ImageID, InitialChecksumDateTime, LastValidateDateTime, checksum, Oldpath) \
                 VALUES (?1, ?2, ?2, ?3, NULL)",
                params![id, last, checksum],
            )?;
            Ok(())
        })
        .unwrap();
}

/// Insert an error row directly.
pub fn insert_error(store: &BatchStore, id: i64, new_digest: Option<&str>) {
    store
        .transaction(|tx| {
            tx.execute(
                "INSERT INTO LightroomValidateErrors \
                 (ImageID, ErrorDetectedDateTime, InvalidChecksum, ValidationError, SuggestedAction) \
                 VALUES (?1, '2020-01-01T00:00:00', ?2, 'test error', 'test suggestion')",
                params![id, new_digest],
            )?;
            Ok(())
        })
        .unwrap();
}
