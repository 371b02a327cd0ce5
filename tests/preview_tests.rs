//! Preview tests: level selection over a synthetic cache container, rotation, cache lookup.

mod common;

use image::{DynamicImage, ImageFormat, RgbImage};
use rusqlite::{Connection, params};
use std::io::Cursor;
use std::path::Path;
use valicat::preview::{Orientation, PreviewCache, extract, extract_from_bytes, scan_levels};
use valicat::{Opts, Validator};

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 120, 200])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// Prologue declaring `declared` edges (square levels), then the JPEG blobs in the same order.
fn container(declared: &[u32], blobs: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"AgHg\x00\x00header\n".to_vec();
    for edge in declared {
        out.extend_from_slice(
            format!("{{\n\tbytes = 1234,\n\theight = {edge},\n\twidth = {edge},\n}},\n").as_bytes(),
        );
    }
    for blob in blobs {
        out.extend_from_slice(b"\x00\x00\x00\x10AgHg");
        out.extend_from_slice(blob);
    }
    out
}

fn three_levels() -> Vec<u8> {
    container(&[100, 300, 900], &[jpeg(1, 1), jpeg(3, 3), jpeg(9, 9)])
}

fn decoded_edge(data: &[u8], target: u32) -> Option<u32> {
    extract_from_bytes(data, target, "AB").map(|img| img.width())
}

#[test]
fn test_scan_finds_three_levels() {
    let data = three_levels();
    let levels = scan_levels(&data);
    let edges: Vec<u32> = levels.iter().map(|l| l.width).collect();
    assert_eq!(edges, vec![100, 300, 900]);
}

#[test]
fn test_selection_by_target_edge() {
    let data = three_levels();
    assert_eq!(decoded_edge(&data, 250), Some(3));
    assert_eq!(decoded_edge(&data, 1), Some(1));
    assert_eq!(decoded_edge(&data, 300), Some(3));
    assert_eq!(decoded_edge(&data, 10_000), Some(9));
}

#[test]
fn test_rotation_codes() {
    let data = container(&[40], &[jpeg(4, 2)]);
    let upright = extract_from_bytes(&data, 10, "AB").unwrap();
    assert_eq!((upright.width(), upright.height()), (4, 2));
    for code in ["BC", "DA"] {
        let img = extract_from_bytes(&data, 10, code).unwrap();
        assert_eq!((img.width(), img.height()), (2, 4), "code {code}");
    }
    let flipped = extract_from_bytes(&data, 10, "CD").unwrap();
    assert_eq!((flipped.width(), flipped.height()), (4, 2));
    let unknown = extract_from_bytes(&data, 10, "ZZ").unwrap();
    assert_eq!((unknown.width(), unknown.height()), (4, 2));

    assert_eq!(Orientation::from_code("BC"), Orientation::Rotate90);
    assert_eq!(Orientation::from_code(""), Orientation::Upright);
}

#[test]
fn test_garbage_and_missing_give_none() {
    assert!(extract_from_bytes(b"", 100, "AB").is_none());
    assert!(extract_from_bytes(b"height = 10,\nwidth = 10,\nno jpeg here", 100, "AB").is_none());
    let broken = container(&[10], &[vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]]);
    assert!(extract_from_bytes(&broken, 100, "AB").is_none());
    let dir = tempfile::tempdir().unwrap();
    assert!(extract(&dir.path().join("none.lrprev"), 100, "AB").is_none());
}

#[test]
fn test_extract_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.lrprev");
    std::fs::write(&path, three_levels()).unwrap();
    assert_eq!(extract(&path, 250, "AB").map(|i| i.width()), Some(3));
}

fn write_preview_index(previews: &Path, image_id: i64, uuid: &str, digest: &str, orientation: &str) {
    std::fs::create_dir_all(previews).unwrap();
    let conn = Connection::open(previews.join("previews.db")).unwrap();
    conn.execute_batch(
        "CREATE TABLE ImageCacheEntry (imageId INTEGER, uuid TEXT, digest TEXT, orientation TEXT)",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ImageCacheEntry (imageId, uuid, digest, orientation) VALUES (?1, ?2, ?3, ?4)",
        params![image_id, uuid, digest, orientation],
    )
    .unwrap();
}

#[test]
fn test_cache_lookup_builds_nested_path() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PreviewCache::at(dir.path());
    assert!(cache.lookup(1).is_none());

    write_preview_index(dir.path(), 7, "ABCD1234", "ff00", "BC");
    let entry = cache.lookup(7).unwrap();
    assert_eq!(
        entry.path,
        dir.path().join("A").join("ABCD").join("ABCD1234-ff00.lrprev")
    );
    assert_eq!(entry.orientation, "BC");
    assert!(cache.lookup(8).is_none());
}

#[test]
fn test_validator_preview_end_to_end() {
    let (mut cat, catalog) = common::TestCatalog::on_disk("Photos.lrcat");
    let id = cat.add_image("a", b"raw");
    let previews = cat.dir.path().join("Photos Previews.lrdata");
    write_preview_index(&previews, id, "EF01", "99", "DA");
    let file = previews.join("E").join("EF01").join("EF01-99.lrprev");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, container(&[40], &[jpeg(4, 2)])).unwrap();
    let dir = cat.dir;
    drop(cat.conn);

    let opts = Opts {
        catalog: catalog.clone(),
        ..Default::default()
    };
    let v = Validator::open(&opts).unwrap();
    let img = v.preview(id, 64).unwrap();
    assert_eq!((img.width(), img.height()), (2, 4));
    assert!(v.preview(id + 1, 64).is_none());
    drop(dir);
}
