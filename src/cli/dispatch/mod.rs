use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .context("missing required argument: --dsn")?,
    };

    let mut globals = GlobalArgs::new(
        matches
            .get_one("frontend-url")
            .map(|s: &String| s.to_string())
            .context("missing required argument: --frontend-url")?,
    );
    globals.session_ttl_seconds = matches
        .get_one::<i64>("session-ttl")
        .copied()
        .unwrap_or(43200);
    globals.oauth_provider = matches
        .get_one("oauth-provider")
        .map(|s: &String| s.to_string())
        .context("missing required argument: --oauth-provider")?;
    globals.oauth_client_id = matches
        .get_one("oauth-client-id")
        .map(|s: &String| s.to_string())
        .context("missing required argument: --oauth-client-id")?;
    globals.oauth_client_secret = matches
        .get_one("oauth-client-secret")
        .map(|s: &String| SecretString::from(s.to_string()))
        .context("missing required argument: --oauth-client-secret")?;
    globals.oauth_token_url = matches
        .get_one("oauth-token-url")
        .map(|s: &String| s.to_string())
        .context("missing required argument: --oauth-token-url")?;
    globals.oauth_identity_url = matches
        .get_one("oauth-identity-url")
        .map(|s: &String| s.to_string())
        .context("missing required argument: --oauth-identity-url")?;

    Ok((action, globals))
}
