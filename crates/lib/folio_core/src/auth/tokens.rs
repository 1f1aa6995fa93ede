//! Opaque token generation and digests.

use std::fmt::Write;

use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Random bytes behind each refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 40;

/// Random bytes behind each password-reset token.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Generate a refresh token (40 random bytes, hex-encoded).
pub fn generate_refresh_token() -> String {
    random_hex::<REFRESH_TOKEN_BYTES>()
}

/// Generate a password-reset token (32 random bytes, hex-encoded).
pub fn generate_reset_token() -> String {
    random_hex::<RESET_TOKEN_BYTES>()
}

/// SHA-256 digest of a token, hex-encoded, for storage.
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rng().fill(&mut bytes);
    bytes.iter().fold(String::with_capacity(N * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
