//! Note CRUD plus the bookkeeping for open editors. Everything here wants a
//! [SessionProvider] and refuses to do anything for an anonymous caller; the
//! user id the session yields is the only owner id that ever reaches the
//! store.
//!
//! Open editors are kept in memory until the client closes them. Clients
//! that vanish without saying so are cleaned up by [spawn_editor_reaper],
//! which drops editors nobody has touched for a while.

use super::{
    auth::SessionProvider,
    autosave::{AutoSave, AutoSaveConfig, SaveError, SaveNote},
    config,
    models::{Note, NoteDraft, User},
    store::{NoteStore, StoreError},
    validation::{Rules, ValidationError},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("note {0} not found")]
    NotFound(Uuid),
    #[error("note {0} is not open for editing")]
    NotEditing(Uuid),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Save(SaveError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<SaveError> for NoteError {
    fn from(err: SaveError) -> Self {
        match err {
            // deleted from under an open editor
            SaveError::Persistence(StoreError::NotFound(id)) => {
                Self::NotFound(id)
            }
            err => Self::Save(err),
        }
    }
}

impl From<StoreError> for NoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            err => Self::Store(err),
        }
    }
}

/// Auto-save's persistence callback: updates go to one user's notes only.
struct OwnedNotes {
    store: Arc<dyn NoteStore>,
    user_id: Uuid,
}

#[async_trait]
impl SaveNote for OwnedNotes {
    async fn save(
        &self,
        note_id: Uuid,
        draft: &NoteDraft,
    ) -> Result<(), StoreError> {
        self.store.update(self.user_id, note_id, draft).await
    }
}

type EditorKey = (Uuid, Uuid);

struct Editor {
    autosave: Arc<AutoSave>,
    touched: Instant,
}

impl Editor {
    fn touch(&mut self) -> Arc<AutoSave> {
        self.touched = Instant::now();
        self.autosave.clone()
    }
}

pub struct Notes {
    store: Arc<dyn NoteStore>,
    autosave_delay: Duration,
    idle_timeout: Duration,
    rules: Rules,
    editors: Mutex<HashMap<EditorKey, Editor>>,
}

impl Notes {
    pub fn new(store: Arc<dyn NoteStore>, autosave_delay: Duration) -> Self {
        Self {
            store,
            autosave_delay,
            idle_timeout: config::EDITOR_IDLE_TIMEOUT,
            rules: Rules::default(),
            editors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn editors(&self) -> MutexGuard<'_, HashMap<EditorKey, Editor>> {
        self.editors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn user(
        &self,
        session: &dyn SessionProvider,
    ) -> Result<User, NoteError> {
        session
            .current_user()
            .await
            .ok_or(NoteError::Unauthenticated)
    }

    pub async fn list(
        &self,
        session: &dyn SessionProvider,
    ) -> Result<Vec<Note>, NoteError> {
        let user = self.user(session).await?;
        Ok(self.store.list(user.id).await?)
    }

    pub async fn get(
        &self,
        session: &dyn SessionProvider,
        id: Uuid,
    ) -> Result<Note, NoteError> {
        let user = self.user(session).await?;
        Ok(self.store.get(user.id, id).await?)
    }

    pub async fn create(
        &self,
        session: &dyn SessionProvider,
        draft: NoteDraft,
    ) -> Result<Note, NoteError> {
        let user = self.user(session).await?;
        self.rules.validate(&draft)?;
        let note = self.store.insert(user.id, &draft.trimmed()).await?;
        info!(note_id = %note.id, user_id = %user.id, "note created");

        Ok(note)
    }

    /// The note's editor is only closed once the row is gone; if the delete
    /// fails, pending edits still get saved.
    pub async fn delete(
        &self,
        session: &dyn SessionProvider,
        id: Uuid,
    ) -> Result<(), NoteError> {
        let user = self.user(session).await?;
        self.store.delete(user.id, id).await?;
        self.remove_editor(user.id, id);
        info!(note_id = %id, user_id = %user.id, "note deleted");

        Ok(())
    }

    /// Starts auto-saving edits to the note. Opening a note that already has
    /// an editor hands back that same editor.
    pub async fn open_editor(
        &self,
        session: &dyn SessionProvider,
        id: Uuid,
    ) -> Result<Arc<AutoSave>, NoteError> {
        let user = self.user(session).await?;
        let open = self.editors().get_mut(&(user.id, id)).map(Editor::touch);
        if let Some(editor) = open {
            return Ok(editor);
        }
        let note = self.store.get(user.id, id).await?;

        // Someone else may have opened it while we were at the store.
        let editor = self
            .editors()
            .entry((user.id, id))
            .or_insert_with(|| {
                debug!(note_id = %id, user_id = %user.id, "opening editor");
                Editor {
                    autosave: Arc::new(AutoSave::new(
                        AutoSaveConfig {
                            note_id: id,
                            delay: self.autosave_delay,
                            rules: self.rules,
                        },
                        note.draft(),
                        Arc::new(OwnedNotes {
                            store: self.store.clone(),
                            user_id: user.id,
                        }),
                    )),
                    touched: Instant::now(),
                }
            })
            .touch();

        Ok(editor)
    }

    pub async fn editor(
        &self,
        session: &dyn SessionProvider,
        id: Uuid,
    ) -> Result<Arc<AutoSave>, NoteError> {
        let user = self.user(session).await?;
        self.editors()
            .get_mut(&(user.id, id))
            .map(Editor::touch)
            .ok_or(NoteError::NotEditing(id))
    }

    pub async fn close_editor(
        &self,
        session: &dyn SessionProvider,
        id: Uuid,
    ) -> Result<(), NoteError> {
        let user = self.user(session).await?;
        if self.remove_editor(user.id, id) {
            Ok(())
        } else {
            Err(NoteError::NotEditing(id))
        }
    }

    fn remove_editor(&self, user_id: Uuid, id: Uuid) -> bool {
        let removed = self.editors().remove(&(user_id, id));
        match removed {
            Some(Editor { autosave, .. }) => {
                // Other holders of the Arc (a request mid-flight) would
                // otherwise keep the timer alive.
                autosave.dispose();
                debug!(note_id = %autosave.note_id(), %user_id, "closed editor");
                true
            }
            None => false,
        }
    }

    /// Close every editor nobody has used for the idle timeout. Editors with
    /// a save in flight are left for the next sweep.
    pub fn evict_idle_editors(&self) -> usize {
        let mut evicted = Vec::new();
        self.editors().retain(|_, editor| {
            let idle = editor.touched.elapsed() >= self.idle_timeout
                && !editor.autosave.status().is_saving;
            if idle {
                evicted.push(editor.autosave.clone());
            }
            !idle
        });
        for autosave in &evicted {
            autosave.dispose();
            debug!(note_id = %autosave.note_id(), "evicted idle editor");
        }

        evicted.len()
    }
}

/// Sweeps idle editors out of `notes` until it is dropped.
pub fn spawn_editor_reaper(notes: &Arc<Notes>) -> JoinHandle<()> {
    let every = (notes.idle_timeout / 2).max(Duration::from_secs(1));
    let notes: Weak<Notes> = Arc::downgrade(notes);
    tokio::spawn(async move {
        let mut ticks = time::interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let Some(notes) = notes.upgrade() else {
                break;
            };
            let evicted = notes.evict_idle_editors();
            if evicted > 0 {
                info!(evicted, "closed idle editors");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::StaticSession, store::MemoryStore};
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(2000);

    fn signed_in() -> StaticSession {
        StaticSession(Some(User {
            id: Uuid::new_v4(),
            email: "jack@jack.com".to_string(),
        }))
    }

    fn setup() -> (Notes, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (Notes::new(store.clone(), DELAY), store)
    }

    /// Everything works except deleting.
    struct FailingDeletes(MemoryStore);

    #[async_trait]
    impl NoteStore for FailingDeletes {
        async fn insert(
            &self,
            user_id: Uuid,
            draft: &NoteDraft,
        ) -> Result<Note, StoreError> {
            self.0.insert(user_id, draft).await
        }
        async fn get(
            &self,
            user_id: Uuid,
            id: Uuid,
        ) -> Result<Note, StoreError> {
            self.0.get(user_id, id).await
        }
        async fn list(&self, user_id: Uuid) -> Result<Vec<Note>, StoreError> {
            self.0.list(user_id).await
        }
        async fn update(
            &self,
            user_id: Uuid,
            id: Uuid,
            draft: &NoteDraft,
        ) -> Result<(), StoreError> {
            self.0.update(user_id, id, draft).await
        }
        async fn delete(&self, _: Uuid, _: Uuid) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn groceries() -> NoteDraft {
        NoteDraft::new("Groceries", "milk, eggs, coffee")
    }

    #[tokio::test]
    async fn test_anonymous_callers_are_refused() {
        let (notes, _) = setup();
        let anon = StaticSession(None);

        assert!(matches!(
            notes.list(&anon).await,
            Err(NoteError::Unauthenticated)
        ));
        assert!(matches!(
            notes.create(&anon, groceries()).await,
            Err(NoteError::Unauthenticated)
        ));
        assert!(matches!(
            notes.delete(&anon, Uuid::new_v4()).await,
            Err(NoteError::Unauthenticated)
        ));
        assert!(matches!(
            notes.open_editor(&anon, Uuid::new_v4()).await,
            Err(NoteError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_create_validates_and_trims() {
        let (notes, _) = setup();
        let session = signed_in();

        assert!(matches!(
            notes.create(&session, NoteDraft::new("ab", "long enough content")).await,
            Err(NoteError::Invalid(ValidationError::TitleTooShort(3)))
        ));
        assert!(notes.list(&session).await.expect("list").is_empty());

        let note = notes
            .create(&session, NoteDraft::new(" Groceries ", " milk, eggs, coffee\n"))
            .await
            .expect("create");
        assert_eq!(note.draft(), groceries());
        assert_eq!(
            notes.get(&session, note.id).await.expect("get").draft(),
            groceries()
        );
    }

    #[tokio::test]
    async fn test_notes_are_private() {
        let (notes, _) = setup();
        let owner = signed_in();
        let stranger = signed_in();
        let note = notes.create(&owner, groceries()).await.expect("create");

        assert!(matches!(
            notes.get(&stranger, note.id).await,
            Err(NoteError::NotFound(_))
        ));
        assert!(matches!(
            notes.open_editor(&stranger, note.id).await,
            Err(NoteError::NotFound(_))
        ));
        assert!(matches!(
            notes.delete(&stranger, note.id).await,
            Err(NoteError::NotFound(_))
        ));
        assert_eq!(notes.list(&owner).await.expect("list").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_editor_auto_saves_to_store() {
        let (notes, store) = setup();
        let session = signed_in();
        let user_id = session.0.as_ref().expect("user").id;
        let note = notes.create(&session, groceries()).await.expect("create");

        let editor = notes.open_editor(&session, note.id).await.expect("open");
        assert!(!editor.status().has_unsaved_changes);
        editor.on_draft_changed(NoteDraft::new(
            "Groceries",
            "milk, eggs, coffee, bread",
        ));
        sleep(DELAY + Duration::from_millis(100)).await;

        let saved = store.get(user_id, note.id).await.expect("get");
        assert_eq!(saved.content, "milk, eggs, coffee, bread");
        assert!(!editor.status().has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_reopening_returns_same_editor() {
        let (notes, _) = setup();
        let session = signed_in();
        let note = notes.create(&session, groceries()).await.expect("create");

        let first = notes.open_editor(&session, note.id).await.expect("open");
        let second = notes.open_editor(&session, note.id).await.expect("open");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(
            &first,
            &notes.editor(&session, note.id).await.expect("editor")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_editor_drops_pending_save() {
        let (notes, store) = setup();
        let session = signed_in();
        let user_id = session.0.as_ref().expect("user").id;
        let note = notes.create(&session, groceries()).await.expect("create");

        let editor = notes.open_editor(&session, note.id).await.expect("open");
        editor.on_draft_changed(NoteDraft::new("Groceries", "never saved, sadly"));
        notes.close_editor(&session, note.id).await.expect("close");
        sleep(DELAY * 2).await;

        assert_eq!(
            store.get(user_id, note.id).await.expect("get").draft(),
            groceries()
        );
        assert!(matches!(
            notes.editor(&session, note.id).await,
            Err(NoteError::NotEditing(_))
        ));
        assert!(matches!(
            notes.close_editor(&session, note.id).await,
            Err(NoteError::NotEditing(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_closes_editor() {
        let (notes, _) = setup();
        let session = signed_in();
        let note = notes.create(&session, groceries()).await.expect("create");

        let editor = notes.open_editor(&session, note.id).await.expect("open");
        editor.on_draft_changed(NoteDraft::new("Groceries", "about to vanish"));
        notes.delete(&session, note.id).await.expect("delete");

        assert!(matches!(
            notes.editor(&session, note.id).await,
            Err(NoteError::NotEditing(_))
        ));
        assert!(matches!(
            notes.get(&session, note.id).await,
            Err(NoteError::NotFound(_))
        ));
        // the cancelled timer never fires a save against the deleted row
        sleep(DELAY * 2).await;
        assert!(!editor.status().is_saving);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_keeps_pending_save() {
        let store = Arc::new(FailingDeletes(MemoryStore::default()));
        let notes = Notes::new(store.clone(), DELAY);
        let session = signed_in();
        let user_id = session.0.as_ref().expect("user").id;
        let note = notes.create(&session, groceries()).await.expect("create");

        let editor = notes.open_editor(&session, note.id).await.expect("open");
        let edited = NoteDraft::new("Groceries", "milk, eggs, coffee, jam");
        editor.on_draft_changed(edited.clone());
        assert!(matches!(
            notes.delete(&session, note.id).await,
            Err(NoteError::Store(_))
        ));

        assert!(notes.editor(&session, note.id).await.is_ok());
        sleep(DELAY + Duration::from_millis(100)).await;
        assert_eq!(
            store.get(user_id, note.id).await.expect("get").draft(),
            edited
        );
        assert!(!editor.status().has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_saving_note_deleted_elsewhere_is_not_found() {
        let (notes, store) = setup();
        let session = signed_in();
        let user_id = session.0.as_ref().expect("user").id;
        let note = notes.create(&session, groceries()).await.expect("create");

        let editor = notes.open_editor(&session, note.id).await.expect("open");
        store.delete(user_id, note.id).await.expect("delete");
        editor.on_draft_changed(NoteDraft::new("Groceries", "gone already"));

        let err = editor.save_now().await.expect_err("note is gone");
        assert!(matches!(
            NoteError::from(err),
            NoteError::NotFound(id) if id == note.id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_editors_are_evicted() {
        let (notes, _) = setup();
        let notes = notes.with_idle_timeout(Duration::from_secs(60));
        let session = signed_in();
        let stale = notes.create(&session, groceries()).await.expect("create");
        let fresh = notes.create(&session, groceries()).await.expect("create");

        notes.open_editor(&session, stale.id).await.expect("open");
        notes.open_editor(&session, fresh.id).await.expect("open");
        sleep(Duration::from_secs(40)).await;
        notes.editor(&session, fresh.id).await.expect("still open");
        assert_eq!(notes.evict_idle_editors(), 0);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(notes.evict_idle_editors(), 1);
        assert!(matches!(
            notes.editor(&session, stale.id).await,
            Err(NoteError::NotEditing(_))
        ));
        assert!(notes.editor(&session, fresh.id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_closes_abandoned_editors() {
        let (notes, _) = setup();
        let notes = Arc::new(notes.with_idle_timeout(Duration::from_secs(60)));
        let session = signed_in();
        let note = notes.create(&session, groceries()).await.expect("create");

        let reaper = spawn_editor_reaper(&notes);
        let editor = notes.open_editor(&session, note.id).await.expect("open");
        editor.on_draft_changed(NoteDraft::new("Groceries", "left behind"));
        sleep(Duration::from_secs(100)).await;

        assert!(matches!(
            notes.editor(&session, note.id).await,
            Err(NoteError::NotEditing(_))
        ));

        // the reaper goes away with the registry
        drop(notes);
        sleep(Duration::from_secs(60)).await;
        assert!(reaper.is_finished());
    }
}
