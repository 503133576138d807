use secrecy::SecretString;

/// OAuth provider endpoints and credentials shared across the server.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub frontend_url: String,
    pub session_ttl_seconds: i64,
    pub oauth_provider: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: SecretString,
    pub oauth_token_url: String,
    pub oauth_identity_url: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(frontend_url: String) -> Self {
        Self {
            frontend_url,
            session_ttl_seconds: 0,
            oauth_provider: String::new(),
            oauth_client_id: String::new(),
            oauth_client_secret: SecretString::default(),
            oauth_token_url: String::new(),
            oauth_identity_url: String::new(),
        }
    }
}
