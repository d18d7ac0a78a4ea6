// Media join-credential HTTP handler

use axum::{extract::State, Json};
use gridcast_core::models::{Role, SourceId};
use gridcast_media::JoinCredential;
use serde::Deserialize;

use super::middleware::AuthUser;
use super::{AppError, AppResult, AppState};

/// Join-credential request
#[derive(Debug, Deserialize)]
pub struct MediaTokenRequest {
    pub target: SourceId,
    #[serde(default)]
    pub publish: bool,
    #[serde(default = "default_true")]
    pub subscribe: bool,
}

fn default_true() -> bool {
    true
}

/// Issue a transport credential scoped to the caller's role.
///
/// Operators publish and subscribe anywhere. A source account is confined to
/// its own home source. Viewers only subscribe, and only to the composite
/// feed of the currently active session.
pub async fn issue_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<MediaTokenRequest>,
) -> AppResult<Json<JoinCredential>> {
    let identity = &user.identity;

    if !req.publish && !req.subscribe {
        return Err(AppError::bad_request("Request publish, subscribe, or both"));
    }

    if req.publish && identity.publishable_source(&req.target).is_none() {
        return Err(AppError::forbidden(format!(
            "{} may not publish {}",
            identity.name, req.target
        )));
    }

    if req.subscribe
        && !may_subscribe(
            &state,
            identity.role,
            identity.home_source.as_ref(),
            &req.target,
        )
        .await
    {
        return Err(AppError::forbidden(format!(
            "{} may not subscribe to {}",
            identity.name, req.target
        )));
    }

    let credential = state
        .transport
        .issue_join_credential(&req.target, &identity.name, req.publish, req.subscribe)
        .await?;
    tracing::debug!(
        identity = %identity.name,
        target = %req.target,
        publish = req.publish,
        subscribe = req.subscribe,
        "join credential issued"
    );
    Ok(Json(credential))
}

async fn may_subscribe(
    state: &AppState,
    role: Role,
    home_source: Option<&SourceId>,
    target: &SourceId,
) -> bool {
    match role {
        Role::Operator => true,
        Role::Source => home_source == Some(target),
        Role::Viewer => match state.registry.get_active().await {
            Some(session) => &session.composite_source_id == target,
            None => false,
        },
    }
}
