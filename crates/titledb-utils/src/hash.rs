use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

const READ_CHUNK: usize = 64 * 1024;

/// Byte length and SHA-256 digest of a file, as produced by [`digest_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    /// Lowercase hex encoded SHA-256.
    pub sha256: String,
}

/// Streams a file and computes its total length and SHA-256 digest.
///
/// The file is read in fixed-size chunks, so arbitrarily large packs can be verified
/// without loading them into memory.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be opened or read.
///
/// # Example
///
/// ```no_run
/// use titledb_utils::hash::digest_file;
///
/// let digest = digest_file("/path/to/titles.pack").unwrap();
/// println!("{} bytes, sha256 {}", digest.size, digest.sha256);
/// ```
pub fn digest_file<P: AsRef<Path>>(file_path: P) -> HashResult<FileDigest> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    let file = File::open(file_path).map_err(read_failed)?;
    let mut reader = BufReader::with_capacity(READ_CHUNK, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    let mut size = 0u64;

    loop {
        let n = reader.read(&mut buffer).map_err(read_failed)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        size += n as u64;
    }

    Ok(FileDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Returns `true` if `value` is exactly 64 lowercase hex characters.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
