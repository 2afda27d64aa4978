//! Public order access tokens (guest order lookup).
//!
//! The token itself is returned to the customer exactly once at checkout;
//! only its SHA-256 hash is persisted. Lookup compares hashes.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a fresh access token (64 hex chars, 256 bits of entropy).
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token for storage.
pub fn hash_access_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Check a presented token against a stored hash.
pub fn verify_access_token(token: &str, stored_hash: &str) -> bool {
    hash_access_token(token) == stored_hash
}
