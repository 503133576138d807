use axum::response::IntoResponse;

// Undocumented banner route; the OpenAPI document starts at /health.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::root;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn root_returns_banner() {
        let response = root().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
