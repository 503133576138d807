use utoipa::OpenApi;

use super::handlers::{auth, messages, users};

/// The OpenAPI document served at /api-docs/openapi.json.
///
/// Add new endpoints here so they show up in Swagger UI; the root banner
/// route is intentionally undocumented.
#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::health::health,
        auth::signup::signup,
        auth::login::login,
        auth::session::session,
        auth::session::logout,
        auth::oauth::callback,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        messages::list_messages,
        messages::create_message,
        messages::get_message,
        messages::update_message,
        messages::delete_message,
    ),
    components(schemas(
        auth::types::SignupRequest,
        auth::types::LoginRequest,
        auth::types::SessionResponse,
        auth::types::LoginResponse,
        auth::types::NoticeResponse,
        users::UserResponse,
        users::UserUpdateRequest,
        users::UserUpdateResponse,
        messages::MessageResponse,
        messages::MessageRequest,
        messages::MessageMutationResponse,
    )),
    tags(
        (name = "auth", description = "Signup, login, sessions and OAuth linking"),
        (name = "users", description = "User accounts"),
        (name = "messages", description = "User-owned messages"),
        (name = "health", description = "Service health")
    )
)]
pub(super) struct ApiDoc;
