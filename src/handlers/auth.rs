use crate::auth::{AuthenticatedUser, PolicyRouterExt, Resource};
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

/// Routes for registration, login and the admin flows. Each path is gated on
/// its own capability-table resource; nesting keeps the trailing-slash form
/// of every path working.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/register",
            Router::new()
                .route("/", post(register))
                .with_access(Resource::Register),
        )
        .nest(
            "/login",
            Router::new()
                .route("/", post(login))
                .with_access(Resource::Login),
        )
        .nest(
            "/admin-login",
            Router::new()
                .route("/", post(admin_login).get(admin_status))
                .with_access(Resource::AdminLogin),
        )
        .nest(
            "/admin-register",
            Router::new()
                .route("/", post(admin_register))
                .with_access(Resource::AdminRegister),
        )
}

/// Registration payload. Role fields are not part of the contract; unknown
/// fields in the body are ignored, so nothing a caller sends here can grant
/// privileges.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"))]
    pub username: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminRegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be between 1 and 150 characters"))]
    pub username: String,
    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Server-side invite code; admin registration refuses without it.
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub message: String,
    pub is_admin: bool,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminRegisterResponse {
    pub message: String,
    pub is_admin: bool,
    pub username: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Register a non-privileged account. No token is issued here; callers log in
/// separately.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    info!("User registered: {}", user.username);
    Ok(created_response(
        json!({ "message": "User created successfully" }),
    ))
}

/// Credential login. Unknown email and wrong password produce the same
/// generic 401.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;
    let token = state.services.auth.issue_token(&user)?;

    info!("User logged in: {}", user.username);
    Ok(success_response(LoginResponse {
        message: "Logged in successfully".to_string(),
        username: user.username,
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
    }))
}

/// Credential login that additionally requires an elevated role. Valid
/// credentials without the role answer 403, which is distinct from the
/// generic 401 for bad credentials.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;

    if !user.is_admin() {
        return Err(ServiceError::Forbidden("Not an admin user".to_string()));
    }

    let token = state.services.auth.issue_token(&user)?;

    info!("Admin logged in: {}", user.username);
    Ok(success_response(AdminLoginResponse {
        message: "Admin login successful".to_string(),
        is_admin: true,
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
    }))
}

/// Report whether the authenticated caller is an admin.
pub async fn admin_status(AuthenticatedUser(caller): AuthenticatedUser) -> impl IntoResponse {
    if caller.is_admin() {
        (StatusCode::OK, Json(json!({ "is_admin": true })))
    } else {
        (StatusCode::FORBIDDEN, Json(json!({ "is_admin": false })))
    }
}

/// Register an elevated account. Gated behind a server-side invite code; the
/// created account is always staff+superuser regardless of the payload, and a
/// token is issued immediately.
pub async fn admin_register(
    State(state): State<AppState>,
    Json(payload): Json<AdminRegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let expected = state
        .config
        .admin_invite_code
        .as_deref()
        .ok_or_else(|| ServiceError::Forbidden("Admin registration is disabled".to_string()))?;
    if payload.invite_code != expected {
        return Err(ServiceError::Forbidden("Invalid invite code".to_string()));
    }

    let user = state
        .services
        .users
        .register_admin(&payload.username, &payload.email, &payload.password)
        .await?;
    let token = state.services.auth.issue_token(&user)?;

    info!("Admin registered: {}", user.username);
    Ok(created_response(AdminRegisterResponse {
        message: "Admin registered successfully".to_string(),
        is_admin: true,
        username: user.username,
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
    }))
}
