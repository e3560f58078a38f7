//! Credential generation and hashing
//!
//! Partner API credentials: a public client ID and a secret that is
//! surfaced exactly once at creation. Only the SHA-256 of the secret is
//! ever stored.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a partner API client ID (`pk-...`)
pub fn generate_client_id() -> String {
    format!("pk-{}", random_token(20))
}

/// Generate a partner API client secret (`sk-...`)
pub fn generate_client_secret() -> String {
    format!("sk-{}", random_token(40))
}

/// SHA-256 of the input, hex-encoded
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    to_hex(&hasher.finalize())
}

/// Constant-shape comparison of a presented secret against a stored hash
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    sha256_hex(secret) == stored_hash
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
