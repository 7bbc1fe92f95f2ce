//! Session notes handlers

use abcledger_common::{
    api::ApiResponse,
    auth::Caller,
    db::models::SessionNote,
    errors::Result,
    notes::{self, NotesEdit},
};
use axum::extract::State;
use uuid::Uuid;

use crate::{
    extract::{JsonBody, PathIds},
    AppState,
};

pub async fn latest(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
) -> Result<ApiResponse<SessionNote>> {
    let note = notes::latest_notes(state.store.as_ref(), &caller, client_id, session_id).await?;
    Ok(ApiResponse::ok(note))
}

/// Generate a narrative from the stored session form
pub async fn generate(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
) -> Result<ApiResponse<SessionNote>> {
    let note = notes::generate_notes(
        state.store.as_ref(),
        state.generator.as_ref(),
        state.notes_mode(),
        &caller,
        client_id,
        session_id,
    )
    .await?;
    Ok(ApiResponse::ok(note))
}

/// Overwrite the latest notes with hand-edited content
pub async fn edit(
    State(state): State<AppState>,
    caller: Caller,
    PathIds((client_id, session_id)): PathIds<(Uuid, Uuid)>,
    JsonBody(edit): JsonBody<NotesEdit>,
) -> Result<ApiResponse<SessionNote>> {
    let note =
        notes::edit_notes(state.store.as_ref(), &caller, client_id, session_id, edit).await?;
    Ok(ApiResponse::ok(note))
}
