//! Therapy session handlers

use abcledger_common::{
    api::ApiResponse,
    auth::Caller,
    errors::Result,
    sessions::{self, SessionRequest, SessionWithAbcs},
};
use axum::extract::State;
use uuid::Uuid;

use crate::{
    extract::{JsonBody, PathIds},
    handlers::catalog::Deleted,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    PathIds(client_id): PathIds<Uuid>,
) -> Result<ApiResponse<Vec<SessionWithAbcs>>> {
    let sessions = sessions::list_sessions(state.store.as_ref(), &caller, client_id).await?;
    Ok(ApiResponse::ok(sessions))
}

/// Create a session and fan its form out into ABC rows
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    PathIds(client_id): PathIds<Uuid>,
    JsonBody(request): JsonBody<SessionRequest>,
) -> Result<ApiResponse<SessionWithAbcs>> {
    let session =
        sessions::create_session(state.store.as_ref(), &caller, client_id, request).await?;
    Ok(ApiResponse::ok(session))
}

pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
) -> Result<ApiResponse<SessionWithAbcs>> {
    let session =
        sessions::get_session(state.store.as_ref(), &caller, client_id, session_id).await?;
    Ok(ApiResponse::ok(session))
}

/// Replace the session form; ABC rows are rebuilt from scratch
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
    JsonBody(request): JsonBody<SessionRequest>,
) -> Result<ApiResponse<SessionWithAbcs>> {
    let session = sessions::update_session(
        state.store.as_ref(),
        &caller,
        client_id,
        session_id,
        request,
    )
    .await?;
    Ok(ApiResponse::ok(session))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
) -> Result<ApiResponse<Deleted>> {
    sessions::delete_session(state.store.as_ref(), &caller, client_id, session_id).await?;
    Ok(ApiResponse::ok(Deleted { id: session_id }))
}
