//! File hashing utilities

use md5::{Digest as _, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::Digest;
use crate::error::ChecksumFailure;
use crate::utils::config::HashingConsts;

/// MD5 a file by streaming it in fixed-size chunks. Never loads the whole file.
pub fn hash_file(path: &Path) -> Result<Digest, ChecksumFailure> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
    let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
    let mut hasher = Md5::new();
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    Ok(Digest(out))
}

/// Existence check ahead of hashing. Directories and dangling links count as missing.
pub fn file_exists(path: &Path) -> bool {
    !path.as_os_str().is_empty() && std::fs::metadata(path).is_ok_and(|m| m.is_file())
}
