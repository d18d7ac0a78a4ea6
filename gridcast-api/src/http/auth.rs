// Authentication HTTP handlers

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use gridcast_core::models::{Role, SourceId};
use serde::{Deserialize, Serialize};

use super::middleware::AuthUser;
use super::{AppError, AppResult, AppState};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub role: Role,
    pub home_source: Option<SourceId>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Log in with a configured account, receiving a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if req.username.is_empty() {
        return Err(AppError::bad_request("Username cannot be empty"));
    }

    let issued = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse {
        token: issued.token,
        name: issued.identity.name,
        role: issued.identity.role,
        home_source: issued.identity.home_source,
        expires_at: issued.expires_at,
    }))
}

/// Revoke the presented bearer token
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(&user.token);
    Ok(Json(MessageResponse {
        message: "logged out".to_string(),
    }))
}
