//! Small helpers for session tokens and input validation.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize a username for lookup/uniqueness checks.
pub(crate) fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Usernames are a single non-blank token, bounded like the storage column.
pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^\S{1,256}$").map_or(false, |re| re.is_match(username))
}

pub(crate) fn valid_password(password: &str) -> bool {
    (8..=128).contains(&password.len())
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Random secret for users provisioned from an OAuth callback. It is hashed
/// and discarded, so the local login path can never match it.
pub(super) fn generate_placeholder_password() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate placeholder password")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never touch the database.
/// The hash is used for lookups when the cookie is presented.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
