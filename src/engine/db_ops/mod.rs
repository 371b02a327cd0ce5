//! Database operations: catalog connection, batched outcome writes, candidate and status queries.
//!
//! Table and column names belong to the catalog and to the side tables that earlier releases
//! created; they are a fixed contract and are never created or dropped here.

mod batch;
mod connection;
mod queries;

pub use batch::BatchStore;
pub use connection::{open_catalog, open_catalog_in_memory, validation_tables_present};
pub use queries::{
    CutoffBucket, cutoff_buckets, discovery_page, due_page, list_errors, status_counts,
};

/// Full file path of a catalog image, assembled from root folder, folder, base name and extension.
macro_rules! image_path_expr {
    () => {
        "rf.absolutePath || lfo.pathFromRoot || lf.baseName || '.' || lf.extension"
    };
}

/// Discovery candidates after a given image id (keyset page). `MasterImage IS NULL` skips virtual copies.
pub(crate) const DISCOVERY_PAGE_SQL: &str = concat!(
    "SELECT ai.id_local, ",
    image_path_expr!(),
    r#"
FROM Adobe_images ai
INNER JOIN AgLibraryFile lf ON lf.id_local = ai.rootFile
INNER JOIN AgLibraryFolder lfo ON lfo.id_local = lf.folder
INNER JOIN AgLibraryRootFolder rf ON rf.id_local = lfo.rootFolder
WHERE ai.MasterImage IS NULL
  AND ai.id_local > ?1
  AND NOT EXISTS (SELECT 1 FROM LightroomValidateImages lvi WHERE lvi.ImageID = ai.id_local)
  AND NOT EXISTS (SELECT 1 FROM LightroomValidateErrors lve WHERE lve.ImageID = ai.id_local)
ORDER BY ai.id_local
LIMIT ?2
"#
);

/// Revalidation candidates: clean records last checked before ?1, after image id ?2.
pub(crate) const DUE_PAGE_SQL: &str = concat!(
    "SELECT lvi.ImageID, ",
    image_path_expr!(),
    r#", lvi.checksum, lvi.Oldpath, lvi.InitialChecksumDateTime, lvi.LastValidateDateTime
FROM LightroomValidateImages lvi
LEFT JOIN Adobe_images ai ON ai.id_local = lvi.ImageID
LEFT JOIN AgLibraryFile lf ON lf.id_local = ai.rootFile
LEFT JOIN AgLibraryFolder lfo ON lfo.id_local = lf.folder
LEFT JOIN AgLibraryRootFolder rf ON rf.id_local = lfo.rootFolder
WHERE lvi.LastValidateDateTime < ?1
  AND lvi.ImageID > ?2
  AND NOT EXISTS (SELECT 1 FROM LightroomValidateErrors lve WHERE lve.ImageID = lvi.ImageID)
ORDER BY lvi.ImageID
LIMIT ?3
"#
);

/// New images, due images (cutoff ?1), new errors, revalidation errors.
pub(crate) const STATUS_COUNTS_SQL: &str = r#"
SELECT
  (SELECT COUNT(*) FROM Adobe_images ai
     WHERE ai.MasterImage IS NULL
       AND NOT EXISTS (SELECT 1 FROM LightroomValidateImages lvi WHERE lvi.ImageID = ai.id_local)
       AND NOT EXISTS (SELECT 1 FROM LightroomValidateErrors lve WHERE lve.ImageID = ai.id_local)),
  (SELECT COUNT(*) FROM LightroomValidateImages lvi
     WHERE NOT EXISTS (SELECT 1 FROM LightroomValidateErrors lve WHERE lve.ImageID = lvi.ImageID)
       AND lvi.LastValidateDateTime < ?1),
  (SELECT COUNT(*) FROM LightroomValidateErrors lve
     LEFT JOIN Adobe_images ai ON ai.id_local = lve.ImageID
     WHERE ai.MasterImage IS NULL
       AND NOT EXISTS (SELECT 1 FROM LightroomValidateImages lvi WHERE lvi.ImageID = lve.ImageID)),
  (SELECT COUNT(*) FROM LightroomValidateErrors lve
     LEFT JOIN Adobe_images ai ON ai.id_local = lve.ImageID
     WHERE ai.MasterImage IS NULL
       AND EXISTS (SELECT 1 FROM LightroomValidateImages lvi WHERE lvi.ImageID = lve.ImageID))
"#;

/// Clean records grouped by the minute of their last check, newest first.
pub(crate) const CHECKED_PER_MINUTE_SQL: &str = r#"
SELECT substr(lvi.LastValidateDateTime, 1, 16) AS minute, COUNT(*)
FROM LightroomValidateImages lvi
WHERE NOT EXISTS (SELECT 1 FROM LightroomValidateErrors lve WHERE lve.ImageID = lvi.ImageID)
GROUP BY minute
ORDER BY minute DESC
"#;

/// Error rows with their record and catalog context. Joined type is chosen by review kind.
pub(crate) fn list_errors_sql(record_join: &str, extra_filter: &str) -> String {
    format!(
        r#"SELECT lve.ImageID, lve.ErrorDetectedDateTime, lve.InvalidChecksum, lve.ValidationError,
       lve.SuggestedAction, {path}, lvi.Oldpath, ai.orientation,
       lvi.LastValidateDateTime, lvi.InitialChecksumDateTime
FROM LightroomValidateErrors lve
{record_join} JOIN LightroomValidateImages lvi ON lvi.ImageID = lve.ImageID
LEFT JOIN Adobe_images ai ON ai.id_local = lve.ImageID
LEFT JOIN AgLibraryFile lf ON lf.id_local = ai.rootFile
LEFT JOIN AgLibraryFolder lfo ON lfo.id_local = lf.folder
LEFT JOIN AgLibraryRootFolder rf ON rf.id_local = lfo.rootFolder
WHERE ai.MasterImage IS NULL {extra_filter}
ORDER BY lve.ImageID"#,
        path = image_path_expr!(),
    )
}

pub(crate) const INSERT_RECORD_SQL: &str = "INSERT INTO LightroomValidateImages \
     (ImageID, InitialChecksumDateTime, LastValidateDateTime, checksum, Oldpath) \
     VALUES (?1, ?2, ?2, ?3, ?4)";

pub(crate) const TOUCH_RECORD_SQL: &str =
    "UPDATE LightroomValidateImages SET LastValidateDateTime = ?2 WHERE ImageID = ?1";

pub(crate) const INSERT_ERROR_SQL: &str = "INSERT INTO LightroomValidateErrors \
     (ImageID, ErrorDetectedDateTime, InvalidChecksum, ValidationError, SuggestedAction) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

pub(crate) const DELETE_ERROR_SQL: &str = "DELETE FROM LightroomValidateErrors WHERE ImageID = ?1";

/// What accept needs for one error row: its new digest and the last known path.
pub(crate) const ACCEPT_SOURCE_SQL: &str = concat!(
    "SELECT lve.InvalidChecksum, COALESCE(NULLIF(",
    image_path_expr!(),
    r#", ''), lvi.Oldpath)
FROM LightroomValidateErrors lve
LEFT JOIN LightroomValidateImages lvi ON lvi.ImageID = lve.ImageID
LEFT JOIN Adobe_images ai ON ai.id_local = lve.ImageID
LEFT JOIN AgLibraryFile lf ON lf.id_local = ai.rootFile
LEFT JOIN AgLibraryFolder lfo ON lfo.id_local = lf.folder
LEFT JOIN AgLibraryRootFolder rf ON rf.id_local = lfo.rootFolder
WHERE lve.ImageID = ?1
"#
);

/// Accept: adopt the new digest as ground truth, creating the record if it is somehow absent.
pub(crate) const ACCEPT_UPSERT_SQL: &str = "INSERT INTO LightroomValidateImages \
     (ImageID, InitialChecksumDateTime, LastValidateDateTime, checksum, Oldpath) \
     VALUES (?1, ?2, ?2, ?3, ?4) \
     ON CONFLICT(ImageID) DO UPDATE SET \
       LastValidateDateTime = excluded.LastValidateDateTime, \
       checksum = excluded.checksum, \
       Oldpath = COALESCE(excluded.Oldpath, Oldpath)";

pub(crate) const VALIDATION_TABLES_SQL: &str = "SELECT COUNT(*) FROM sqlite_master \
     WHERE type = 'table' AND name IN ('LightroomValidateImages', 'LightroomValidateErrors')";
