use super::{autosave::SaveError, notes::NoteError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ServerError(NoteError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            NoteError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.0.to_string())
            }
            NoteError::NotFound(_) | NoteError::NotEditing(_) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            NoteError::Invalid(reason)
            | NoteError::Save(SaveError::Invalid(reason)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, reason.to_string())
            }
            NoteError::Save(SaveError::Persistence(_)) => {
                error!(error = ?self.0, "manual save failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to save note".to_string(),
                )
            }
            NoteError::Store(_) => {
                error!(error = ?self.0, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, NoteError>`
// (or anything that converts into one) to turn them into
// `Result<_, ServerError>`.
impl<E> From<E> for ServerError
where
    E: Into<NoteError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
