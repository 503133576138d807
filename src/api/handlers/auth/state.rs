//! Auth state and configuration.

use secrecy::SecretString;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

/// Endpoints and credentials for the single configured OAuth provider.
#[derive(Clone, Debug)]
pub struct OAuthProviderConfig {
    name: String,
    client_id: String,
    client_secret: SecretString,
    token_url: String,
    identity_url: String,
}

impl OAuthProviderConfig {
    #[must_use]
    pub fn new(
        name: String,
        client_id: String,
        client_secret: SecretString,
        token_url: String,
        identity_url: String,
    ) -> Self {
        Self {
            name,
            client_id,
            client_secret,
            token_url,
            identity_url,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(super) fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub(super) fn token_url(&self) -> &str {
        &self.token_url
    }

    pub(super) fn identity_url(&self) -> &str {
        &self.identity_url
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    provider: OAuthProviderConfig,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, provider: OAuthProviderConfig) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            provider,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    pub(super) fn provider(&self) -> &OAuthProviderConfig {
        &self.provider
    }
}

pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
