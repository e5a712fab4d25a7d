//! Identity scheme for local and global records.
//!
//! Local ids are salted and therefore unique per creation. Global ids are a
//! pure function of their inputs, which is what makes re-syncing idempotent.

use sha2::{Digest, Sha256};

/// Prefix of every local finding id.
pub const FINDING_ID_PREFIX: &str = "f-";

/// Prefix of every global finding id.
pub const GLOBAL_ID_PREFIX: &str = "g-";

const FINDING_ID_HEX_LEN: usize = 8;
const GLOBAL_ID_HEX_LEN: usize = 12;

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Mints a local finding id: `f-` + first 8 hex chars of sha256(title ++ timestamp ++ salt).
pub fn finding_id(title: &str, timestamp: &str, salt: &str) -> String {
    let digest = sha256_hex(&[title, timestamp, salt]);
    format!("{}{}", FINDING_ID_PREFIX, &digest[..FINDING_ID_HEX_LEN])
}

/// Draws a fresh random salt for [`finding_id`].
pub fn random_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Derives a global id: `g-` + first 12 hex chars of sha256(source_repo ++ local_id ++ title).
pub fn global_id(source_repo: &str, local_id: &str, title: &str) -> String {
    let digest = sha256_hex(&[source_repo, local_id, title]);
    format!("{}{}", GLOBAL_ID_PREFIX, &digest[..GLOBAL_ID_HEX_LEN])
}

/// Checks that `id` has the local id shape.
pub fn is_finding_id(id: &str) -> bool {
    has_shape(id, FINDING_ID_PREFIX, FINDING_ID_HEX_LEN)
}

/// Checks that `id` has the global id shape.
pub fn is_global_id(id: &str) -> bool {
    has_shape(id, GLOBAL_ID_PREFIX, GLOBAL_ID_HEX_LEN)
}

fn has_shape(id: &str, prefix: &str, hex_len: usize) -> bool {
    id.strip_prefix(prefix).is_some_and(|rest| {
        rest.len() == hex_len && rest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    })
}
