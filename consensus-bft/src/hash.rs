//! Content hashing.
//!
//! Every hashed object is reduced to an ordered list of fields. Each field is
//! hashed with SHA-256 and base64 encoded, the encodings are concatenated in
//! field order, and the concatenation is hashed and encoded once more.

use {
    base64::{engine::general_purpose::STANDARD, Engine as _},
    sha2::{Digest, Sha256},
};

/// SHA-256 of `bytes`, base64 encoded (standard alphabet, padded).
pub fn sha256_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}

/// Two-level field hash used for transactions and blocks.
pub fn two_level_hash<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let joined: String = fields.into_iter().map(sha256_base64).collect();
    sha256_base64(joined.as_bytes())
}
