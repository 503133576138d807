//! # Accesso (Session Authentication & OAuth Linking)
//!
//! `accesso` is a small identity service: local accounts with argon2-hashed
//! passwords, cookie-backed sessions, and federated login through a single
//! configurable OAuth provider.
//!
//! ## Accounts
//!
//! Local accounts carry a unique username and a password hash. Usernames are
//! required for the local login path only; users provisioned from an OAuth
//! callback have no username and a random placeholder credential, so the
//! local path can never be used to enter them.
//!
//! ## Sessions
//!
//! A session stores exactly one claim, the user id, keyed by the SHA-256
//! digest of a random token. The raw token only ever travels in the
//! `HttpOnly` cookie (or an `Authorization: Bearer` header). Sessions for
//! deleted users resolve to anonymous rather than erroring.
//!
//! ## Authorization
//!
//! Handlers resolve the current user once per request and evaluate an
//! ordered list of guard policies (`Authenticated`, `Owner`) before doing
//! any work. Guard rejections are typed: missing identity redirects to
//! login (401), a foreign owner yields 403 with a distinct message.
//!
//! ## OAuth Linking
//!
//! The provider callback reconciles the external identity against local
//! state: an owned link signs its user in, an unowned or missing link is
//! attached to the current session's user, and an anonymous visitor gets a
//! freshly provisioned account. Link and user rows are written in one
//! transaction; a failure rolls both back.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
