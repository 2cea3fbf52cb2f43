use super::{crypto::SessionKey, notes::Notes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Field values as the user is typing them. Nothing here has been validated
/// or persisted yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// What actually gets written to the store.
    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            content: self.content.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn draft(&self) -> NoteDraft {
        NoteDraft::new(&self.title[..], &self.content[..])
    }
}

/// Whoever the session cookie says is on the other end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<Notes>,
    pub session_key: Arc<SessionKey>,
}
