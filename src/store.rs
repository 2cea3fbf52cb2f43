//! The store is where notes live once they are saved. Every operation is
//! scoped to the owning user: a note that belongs to someone else behaves
//! exactly like a note that doesn't exist.
//!
//! [crate::db_ops::PgNoteStore] is the real thing; [MemoryStore] backs tests
//! and `NOTES_STORE=memory`.

use super::models::{Note, NoteDraft};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        draft: &NoteDraft,
    ) -> Result<Note, StoreError>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Note, StoreError>;
    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Note>, StoreError>;
    /// Replaces title and content together.
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &NoteDraft,
    ) -> Result<(), StoreError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: RwLock<HashMap<Uuid, Note>>,
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        draft: &NoteDraft,
    ) -> Result<Note, StoreError> {
        let note = Note {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: Utc::now(),
        };
        self.notes.write().await.insert(note.id, note.clone());

        Ok(note)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Note, StoreError> {
        self.notes
            .read()
            .await
            .get(&id)
            .filter(|n| n.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = self
            .notes
            .read()
            .await
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(notes)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &NoteDraft,
    ) -> Result<(), StoreError> {
        let mut notes = self.notes.write().await;
        match notes.get_mut(&id).filter(|n| n.user_id == user_id) {
            Some(note) => {
                note.title = draft.title.clone();
                note.content = draft.content.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut notes = self.notes.write().await;
        match notes.get(&id) {
            Some(note) if note.user_id == user_id => {
                notes.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }
}
