use super::{controllers, models};
use axum::routing::{get, post, put, Router};

#[rustfmt::skip]
pub fn get_routes() -> Router<models::AppState> {
    Router::new()
        .route("/notes", get(controllers::list_notes).post(controllers::create_note))
        .route("/notes/:id", get(controllers::get_note).delete(controllers::delete_note))
        .route("/notes/:id/editor", post(controllers::open_editor)
            .get(controllers::editor_status)
            .delete(controllers::close_editor))
        .route("/notes/:id/editor/draft", put(controllers::update_draft))
        .route("/notes/:id/editor/save", post(controllers::save_note))
}
