//! Error taxonomy for the auth core.

use axum::http::StatusCode;

/// Typed failures surfaced by the auth core.
///
/// Every variant is recovered at the request boundary and translated into a
/// status code plus a user-facing message. Store unavailability is not a
/// variant; it is logged and answered with a generic 500.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AuthError {
    DuplicateUsername,
    InvalidCredentials,
    Unauthenticated,
    Unauthorized,
    OAuthFailure,
    OAuthLinkFailure,
}

pub(crate) fn auth_error_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::DuplicateUsername => {
            (StatusCode::CONFLICT, "Username already taken".to_string())
        }
        // Unknown username and wrong password share one message on purpose.
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::Unauthenticated => {
            (StatusCode::UNAUTHORIZED, "Please log in first".to_string())
        }
        AuthError::Unauthorized => (StatusCode::FORBIDDEN, "Not authorized".to_string()),
        AuthError::OAuthFailure => (
            StatusCode::BAD_GATEWAY,
            "Failed to log in with provider".to_string(),
        ),
        AuthError::OAuthLinkFailure => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to link provider account".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{auth_error_response, AuthError};
    use axum::http::StatusCode;

    #[test]
    fn auth_error_response_maps_status() {
        let (status, message) = auth_error_response(&AuthError::DuplicateUsername);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Username already taken");

        let (status, _) = auth_error_response(&AuthError::InvalidCredentials);
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = auth_error_response(&AuthError::Unauthenticated);
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = auth_error_response(&AuthError::Unauthorized);
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = auth_error_response(&AuthError::OAuthFailure);
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = auth_error_response(&AuthError::OAuthLinkFailure);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn guard_rejections_have_distinct_messages() {
        let (_, unauthenticated) = auth_error_response(&AuthError::Unauthenticated);
        let (_, unauthorized) = auth_error_response(&AuthError::Unauthorized);
        assert_ne!(unauthenticated, unauthorized);
    }
}
