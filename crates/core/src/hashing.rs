//! SHA-256 helpers for audit chaining and refresh-token storage.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hash `parts` joined by `|` without building the joined string first.
///
/// Equivalent to `sha256_hex(parts.join("|").as_bytes())`.
pub fn sha256_hex_joined(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
