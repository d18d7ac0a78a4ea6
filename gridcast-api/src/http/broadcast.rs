// Broadcast session HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use gridcast_compositor::CompositorStats;
use gridcast_core::models::{
    CompositionSession, CreateSessionRequest, SessionId, UpdateSessionRequest,
};

use super::middleware::{AuthUser, RequireOperator};
use super::{AppError, AppResult, AppState};

/// Create a session and go live with it
pub async fn create_broadcast(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Json(req): Json<CreateSessionRequest>,
) -> AppResult<Json<CompositionSession>> {
    let session = state.controller.create_broadcast(req.selection).await?;
    tracing::info!(
        operator = %user.identity.name,
        session = %session.id,
        "broadcast created"
    );
    Ok(Json(session))
}

/// Change a session's selection or active flag
pub async fn update_broadcast(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> AppResult<Json<CompositionSession>> {
    let id = SessionId::from_string(id);
    let session = state.controller.update_broadcast(&id, req).await?;
    tracing::info!(
        operator = %user.identity.name,
        session = %session.id,
        "broadcast updated"
    );
    Ok(Json(session))
}

/// Stop a session
pub async fn stop_broadcast(
    State(state): State<AppState>,
    RequireOperator(user): RequireOperator,
    Path(id): Path<String>,
) -> AppResult<Json<CompositionSession>> {
    let id = SessionId::from_string(id);
    let session = state.controller.stop_broadcast(&id).await?;
    tracing::info!(
        operator = %user.identity.name,
        session = %session.id,
        "broadcast stopped"
    );
    Ok(Json(session))
}

/// The most recently created active session, or null
pub async fn get_active(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Option<CompositionSession>>> {
    Ok(Json(state.registry.get_active().await))
}

/// Runtime counters of the live compositor
pub async fn active_stats(
    State(state): State<AppState>,
    RequireOperator(_user): RequireOperator,
) -> AppResult<Json<CompositorStats>> {
    let stats = state
        .controller
        .active_stats()
        .await
        .ok_or_else(|| AppError::not_found("No live broadcast"))?;
    Ok(Json(stats))
}

/// All sessions ever created, newest last
pub async fn list_broadcasts(
    State(state): State<AppState>,
    RequireOperator(_user): RequireOperator,
) -> AppResult<Json<Vec<CompositionSession>>> {
    Ok(Json(state.registry.list().await))
}

/// One session by id
pub async fn get_broadcast(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<CompositionSession>> {
    let id = SessionId::from_string(id);
    Ok(Json(state.registry.get(&id).await?))
}
