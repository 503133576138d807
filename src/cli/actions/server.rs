use crate::api;
use crate::api::handlers::auth::{AuthConfig, OAuthProviderConfig};
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let provider = OAuthProviderConfig::new(
                globals.oauth_provider.clone(),
                globals.oauth_client_id.clone(),
                globals.oauth_client_secret.clone(),
                globals.oauth_token_url.clone(),
                globals.oauth_identity_url.clone(),
            );

            let config = AuthConfig::new(globals.frontend_url.clone(), provider)
                .with_session_ttl_seconds(globals.session_ttl_seconds);

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
