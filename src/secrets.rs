//! Generation and display hygiene for credential material.
//!
//! Generated values are wrapped in [`secrecy::Secret`] wherever they are held
//! in memory for longer than a single call, so an accidental `{:?}` prints
//! `[REDACTED]` instead of the secret. The persisted store keeps plaintext by
//! contract; masking is a display-time transform only.

use rand::distr::Alphanumeric;
use rand::Rng;
use secrecy::Secret;

/// Length for signing/encryption secrets (JWT, session, storage keys).
pub const SECRET_LEN: usize = 48;
/// Length for generated passwords.
pub const PASSWORD_LEN: usize = 32;

/// Random alphanumeric token of the given length.
pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generated_password() -> Secret<String> {
    Secret::new(random_token(PASSWORD_LEN))
}

/// Display form of a stored secret: never the full value.
pub fn masked(secret: &str) -> String {
    if secret.len() <= 4 {
        "***".to_string()
    } else {
        format!("{}***", &secret[..4])
    }
}
