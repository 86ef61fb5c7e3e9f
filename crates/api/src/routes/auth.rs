//! Account route handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::RequireAuth;
use crate::models::user::User;
use crate::services::auth::{AuthService, ProfileUpdateRequest};
use crate::state::AppState;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `PUT /api/auth/password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// A user and a fresh bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Create an account.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (user, token) = AuthService::new(state.pool(), state.jwt())
        .register(&body.name, &body.email, &body.password)
        .await?;

    info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// Exchange email and password for a token.
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = AuthService::new(state.pool(), state.jwt())
        .login(&body.email, &body.password)
        .await?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { user, token }))
}

/// Current user's profile.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.jwt())
        .get_user(user.id)
        .await?;
    Ok(Json(user))
}

/// Update the current user's profile.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ProfileUpdateRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.jwt())
        .update_profile(user.id, body)
        .await?;
    Ok(Json(user))
}

/// Change the current user's password.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.jwt())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    info!("Password changed");

    Ok(StatusCode::NO_CONTENT)
}
