// HTTP middleware

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use gridcast_core::models::Identity;
use gridcast_core::service::AuthGate;

use super::{AppError, AppState};

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    /// The raw token, kept so logout can revoke it.
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
        let value = header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Expected a bearer token"))?;

        let identity = app_state
            .auth
            .authenticate(token)
            .await
            .map_err(AppError::from)?;

        Ok(Self {
            identity,
            token: token.to_string(),
        })
    }
}

/// An [`AuthUser`] that must hold the operator role
#[derive(Debug, Clone)]
pub struct RequireOperator(pub AuthUser);

impl<S> FromRequestParts<S> for RequireOperator
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.identity.role.is_operator() {
            return Err(AppError::forbidden("Operator role required"));
        }
        Ok(Self(user))
    }
}
