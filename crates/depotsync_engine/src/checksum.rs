//! SHA-256 checksums of package files.

use crate::error::SyncResult;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Computes the lowercase hex SHA-256 digest of an entire file.
///
/// Fails with an I/O error if the file cannot be read in full.
pub fn file_sha256(path: &Path) -> SyncResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(to_hex(&hasher.finalize()))
}

/// Compares two hex digests, ignoring ASCII case.
///
/// Catalogs are free to publish uppercase digests; what matters is the
/// underlying bytes.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
