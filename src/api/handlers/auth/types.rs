//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: i64,
    pub username: Option<String>,
}

/// Success body for signup, login and the OAuth callback. The `notice` field
/// carries the user-facing message.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub notice: String,
    pub user_id: i64,
}

/// Plain flash-style message body for mutations with no richer payload.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NoticeResponse {
    pub notice: String,
}

#[derive(IntoParams, Deserialize, Debug)]
pub struct OAuthCallbackQuery {
    /// Authorization code returned by the provider.
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            first_name: Some("Alice".to_string()),
            last_name: None,
            username: "alice".to_string(),
            password: "CorrectHorseBatteryStaple".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let username = value
            .get("username")
            .and_then(serde_json::Value::as_str)
            .context("missing username")?;
        assert_eq!(username, "alice");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.first_name.as_deref(), Some("Alice"));
        Ok(())
    }

    #[test]
    fn session_response_keeps_null_username() -> Result<()> {
        let response = SessionResponse {
            user_id: 7,
            username: None,
        };
        let value = serde_json::to_value(&response)?;
        assert!(value
            .get("username")
            .context("missing username")?
            .is_null());
        Ok(())
    }

    #[test]
    fn oauth_callback_query_decodes_missing_code() -> Result<()> {
        let query: OAuthCallbackQuery = serde_json::from_value(serde_json::json!({}))?;
        assert!(query.code.is_none());
        Ok(())
    }
}
