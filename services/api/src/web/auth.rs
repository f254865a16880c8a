//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for login, self-registration and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bitacora_core::domain::{SessionContext, User, UserRole};
use bitacora_core::identity::Registration;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::middleware::{session_cookie, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Employee id, case-insensitive.
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    /// `ADMIN` or `OPERATOR`.
    pub role: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub avatar: String,
    pub employee_id: Option<String>,
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            avatar: user.avatar.clone(),
            employee_id: user.employee_id.clone(),
        }
    }
}

//=========================================================================================
// Session Cookie Helpers
//=========================================================================================

fn session_cookie_header(auth_session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        ttl.num_seconds()
    )
}

/// Opens an auth session for `user` and returns the `Set-Cookie` value.
async fn open_session(state: &AppState, user: &User) -> Result<String, HttpError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    let ctx = SessionContext::from(user);

    state
        .db
        .create_auth_session(&auth_session_id, &ctx, Utc::now() + ttl)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "No se pudo iniciar la sesión")
        })?;

    Ok(session_cookie_header(&auth_session_id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with an employee id and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Unknown account or wrong password"),
        (status = 422, description = "Blank credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let user = state.identity.login(&req.username, &req.password).await?;
    let cookie = open_session(&state, &user).await?;
    info!("User {} ({}) logged in", user.id, user.role);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(&user)),
    ))
}

/// POST /auth/register - Create a new profile and log in as it
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Profile created successfully", body = AuthResponse),
        (status = 409, description = "Employee id already registered"),
        (status = 422, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let role = req
        .role
        .parse::<UserRole>()
        .map_err(|e| HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let registration = Registration {
        name: req.name,
        username: req.username,
        password: req.password,
        role,
    };

    let user = state.identity.register(&registration).await?;
    let cookie = open_session(&state, &user).await?;
    info!("Registered profile {} as {}", user.id, user.role);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(&user)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let auth_session_id = session_cookie(&headers).ok_or_else(HttpError::unauthorized)?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "No se pudo cerrar la sesión")
        })?;

    // Clear the cookie.
    let cookie = session_cookie_header("", Duration::zero());
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_carries_ttl_and_flags() {
        let cookie = session_cookie_header("abc", Duration::days(30));
        assert_eq!(
            cookie,
            "session=abc; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=2592000"
        );
        assert!(session_cookie_header("", Duration::zero()).ends_with("Max-Age=0"));
    }
}
