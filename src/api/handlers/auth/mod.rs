//! Auth handlers and supporting modules.
//!
//! This module coordinates local credentials, session management, guard
//! policies, and OAuth account linking.
//!
//! ## Sessions
//!
//! Sessions store one claim (the user id) keyed by the SHA-256 digest of a
//! random token. The raw token lives only in the `HttpOnly` cookie or an
//! `Authorization: Bearer` header.
//!
//! ## Guards
//!
//! Protected handlers resolve a [`guard::Principal`] once per request and
//! evaluate an ordered policy chain before running. Rejections are typed and
//! map to distinct responses.
//!
//! ## OAuth Linking
//!
//! The provider callback branches over (link row state, session state); see
//! [`oauth`] for the decision table. Attach and provision are transactional.

pub(crate) mod credentials;
mod error;
pub(crate) mod guard;
pub(crate) mod login;
pub(crate) mod oauth;
pub(crate) mod session;
pub(crate) mod signup;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState, OAuthProviderConfig};

pub(crate) use error::{auth_error_response, AuthError};
pub(crate) use storage::{
    delete_user, list_users, lookup_user, update_profile, UpdateOutcome, UserRecord,
};
pub(crate) use utils::{normalize_username, valid_password, valid_username};

#[cfg(test)]
mod tests;
