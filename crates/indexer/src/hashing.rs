use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub const HASH_PREFIX: &str = "sha256:";

const READ_BUFFER: usize = 64 * 1024;

/// SHA-256 of the file bytes as `sha256:<hex>`. Streams, so file size does
/// not matter. Blocking; call from a blocking context.
pub fn compute_content_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{HASH_PREFIX}{}", to_hex(&hasher.finalize())))
}

/// Bare hex SHA-256 of a string.
#[must_use]
pub fn hash_text(text: &str) -> String {
    to_hex(&Sha256::digest(text.as_bytes()))
}

/// Downstream record id for one chunk.
///
/// A pure function of its inputs: the same file content processed with the
/// same configuration always lands on the same id, so upserts overwrite.
#[must_use]
pub fn compute_chunk_id(
    content_hash: &str,
    chunk_index: usize,
    parser_id: &str,
    chunker_id: &str,
    embedding_id: &str,
) -> String {
    hash_text(&format!(
        "{content_hash}:{chunk_index}:{parser_id}:{chunker_id}:{embedding_id}"
    ))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
