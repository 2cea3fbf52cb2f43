use super::{
    auth::CookieSession,
    autosave::SaveStatus,
    errors::ServerError,
    models::{AppState, Note, NoteDraft},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

pub async fn list_notes(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
) -> Result<Json<Vec<Note>>, ServerError> {
    Ok(Json(notes.list(&session).await?))
}

pub async fn create_note(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Json(draft): Json<NoteDraft>,
) -> Result<(StatusCode, Json<Note>), ServerError> {
    let note = notes.create(&session, draft).await?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, ServerError> {
    Ok(Json(notes.get(&session, id).await?))
}

pub async fn delete_note(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    notes.delete(&session, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn open_editor(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveStatus>, ServerError> {
    let editor = notes.open_editor(&session, id).await?;

    Ok(Json(editor.status()))
}

pub async fn editor_status(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveStatus>, ServerError> {
    let editor = notes.editor(&session, id).await?;

    Ok(Json(editor.status()))
}

/// The editing surface calls this on every change; it never waits on the
/// store.
pub async fn update_draft(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
    Json(draft): Json<NoteDraft>,
) -> Result<Json<SaveStatus>, ServerError> {
    let editor = notes.editor(&session, id).await?;

    Ok(Json(editor.on_draft_changed(draft)))
}

pub async fn save_note(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveStatus>, ServerError> {
    let editor = notes.editor(&session, id).await?;

    Ok(Json(editor.save_now().await?))
}

pub async fn close_editor(
    State(AppState { notes, .. }): State<AppState>,
    session: CookieSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    notes.close_editor(&session, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
