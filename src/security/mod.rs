//! API key generation and hashing
//!
//! Keys are handed out once at creation; only the SHA-256 hex digest is
//! stored, so a leaked database does not leak usable keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const KEY_BYTES: usize = 32;
const KEY_PREFIX: &str = "usl_";

/// Generate a new API key (returned to the caller exactly once)
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 hex digest of a key, the only form persisted
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}
