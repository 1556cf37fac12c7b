//! Checksums: computing them, finding out the remote one, and reusing local
//! files that match.
//!
//! - [`sha1_file`]: SHA-1 of a file on disk, computed by the engine itself.
//! - [`ChecksumCache`]: memoizes file digests keyed on size and mtime.
//! - [`resolve_checksum`]: the remote resource's SHA-1, from a caller hint,
//!   the fetched metadata, or a `.sha1` sidecar, in that order.
//! - [`LocalCandidates`]: caller-supplied files that may already hold the
//!   bytes of a remote resource.

mod candidates;
mod resolver;

pub use candidates::{ChecksumCache, FileCandidates, LocalCandidate, LocalCandidates};
pub use resolver::{parse_sidecar, resolve_checksum};

use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::types::Sha1Hash;
use crate::{CodevError, Result};

const READ_BUFFER: usize = 64 * 1024;

/// SHA-1 of an in-memory buffer.
pub fn sha1_bytes(bytes: &[u8]) -> Sha1Hash {
    Sha1Hash::from_bytes(Sha1::digest(bytes).into())
}

/// SHA-1 of a file, streamed in fixed-size chunks.
pub async fn sha1_file(path: &Path) -> Result<Sha1Hash> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CodevError::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| CodevError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha1Hash::from_bytes(hasher.finalize().into()))
}
