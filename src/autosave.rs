//! Auto-save for a note that is being edited.
//!
//! The editing surface reports every change with [AutoSave::on_draft_changed].
//! Changes are coalesced by a [Debouncer]; once the user has been quiet for
//! the configured delay, the current draft is validated and handed to the
//! injected [SaveNote]. A draft that fails validation is simply not saved; the
//! user is still typing, and the next change will try again. Failed
//! background saves are logged and otherwise only show up as
//! `has_unsaved_changes` staying true.
//!
//! [AutoSave::save_now] is the explicit path (a submit button, say). It skips
//! the timer and hands any error back to the caller, who is expected to tell
//! the user about it.
//!
//! ```text
//!  Idle ──edit──▶ Dirty ──timer fires, draft valid──▶ Saving ──ok──▶ Idle
//!                   ▲  └──────────save_now()─────────────▲  │
//!                   └────────────────failed────────────────┘
//! ```
//!
//! An edit back to the acknowledged draft cancels any pending save and
//! clears `has_unsaved_changes`, rather than leaving the flag alone. While a
//! save is in flight such an edit is treated like any other and scheduled,
//! since the in-flight save is about to overwrite the store.
//!
//! Scheduled and manual saves are not mutually exclusive. If they overlap,
//! both calls go out and whichever completes last decides what we consider
//! saved; the store is last-write-wins anyway.

use super::{
    debounce::Debouncer,
    models::NoteDraft,
    store::StoreError,
    validation::{Rules, ValidationError},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where drafts go once they pass validation. Implementations should be
/// safe to call repeatedly with the same draft.
#[async_trait]
pub trait SaveNote: Send + Sync {
    async fn save(
        &self,
        note_id: Uuid,
        draft: &NoteDraft,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("failed to persist note: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaveStatus {
    pub is_saving: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub has_unsaved_changes: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct AutoSaveConfig {
    pub note_id: Uuid,
    pub delay: Duration,
    pub rules: Rules,
}

#[derive(Debug)]
struct State {
    /// Whatever the editing surface last told us.
    draft: NoteDraft,
    /// Last draft known to be in the store; the initial draft until then.
    acknowledged: NoteDraft,
    in_flight: usize,
    last_saved_at: Option<DateTime<Utc>>,
    has_unsaved_changes: bool,
}

impl State {
    fn status(&self) -> SaveStatus {
        SaveStatus {
            is_saving: self.in_flight > 0,
            last_saved_at: self.last_saved_at,
            has_unsaved_changes: self.has_unsaved_changes,
        }
    }
}

struct Shared {
    note_id: Uuid,
    rules: Rules,
    saver: Arc<dyn SaveNote>,
    state: Mutex<State>,
}

/// Counts a save as in flight until [InFlight::settle] is called under the
/// same lock that records the outcome. Dropping it unsettled (say, the HTTP
/// client went away during a manual save) still decrements the count.
struct InFlight<'a> {
    shared: &'a Shared,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, state: &mut State) {
        state.in_flight -= 1;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.state().in_flight -= 1;
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        // State is plain data and every critical section leaves it
        // consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate the current draft, persist it, record the outcome.
    async fn persist(&self) -> Result<SaveStatus, SaveError> {
        let draft = {
            let mut state = self.state();
            let draft = state.draft.clone();
            self.rules.validate(&draft)?;
            state.in_flight += 1;
            draft
        };
        let in_flight = InFlight {
            shared: self,
            settled: false,
        };
        let result = self.saver.save(self.note_id, &draft.trimmed()).await;

        let mut state = self.state();
        // Leave flight under the same lock that records the outcome, or an
        // edit could see no save running next to a stale snapshot.
        in_flight.settle(&mut state);
        if result.is_ok() {
            state.last_saved_at = Some(Utc::now());
            state.acknowledged = draft;
        }
        // The user may have kept typing while we were waiting on the store.
        state.has_unsaved_changes = state.draft != state.acknowledged;
        let status = state.status();
        drop(state);

        result?;
        debug!(note_id = %self.note_id, "note saved");
        Ok(status)
    }

    async fn scheduled_save(&self) {
        match self.persist().await {
            Ok(_) => {}
            Err(SaveError::Invalid(reason)) => {
                debug!(note_id = %self.note_id, %reason, "not auto-saving invalid draft");
            }
            Err(err) => {
                warn!(note_id = %self.note_id, error = %err, "auto-save failed");
            }
        }
    }
}

/// One editing session's worth of auto-save. Dropping it is the same as
/// [AutoSave::dispose].
pub struct AutoSave {
    shared: Arc<Shared>,
    timer: Mutex<Debouncer>,
}

impl AutoSave {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: AutoSaveConfig,
        initial: NoteDraft,
        saver: Arc<dyn SaveNote>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                note_id: config.note_id,
                rules: config.rules,
                saver,
                state: Mutex::new(State {
                    draft: initial.clone(),
                    acknowledged: initial,
                    in_flight: 0,
                    last_saved_at: None,
                    has_unsaved_changes: false,
                }),
            }),
            timer: Mutex::new(Debouncer::new(config.delay)),
        }
    }

    fn timer(&self) -> MutexGuard<'_, Debouncer> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn note_id(&self) -> Uuid {
        self.shared.note_id
    }

    pub fn status(&self) -> SaveStatus {
        self.shared.state().status()
    }

    pub fn on_draft_changed(&self, draft: NoteDraft) -> SaveStatus {
        let mut state = self.shared.state();
        // Editing back to what's already saved needs no save. The exception
        // is a save still in flight: it will overwrite the store with
        // something else, so the reverted draft has to go out after it.
        if draft == state.acknowledged && state.in_flight == 0 {
            state.draft = draft;
            state.has_unsaved_changes = false;
            let status = state.status();
            drop(state);
            self.timer().cancel();
            return status;
        }
        state.draft = draft;
        state.has_unsaved_changes = true;
        let status = state.status();
        drop(state);

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.timer().schedule(async move {
            if let Some(shared) = shared.upgrade() {
                shared.scheduled_save().await;
            }
        });

        status
    }

    /// Save right away. Unlike the scheduled path, validation and store
    /// errors come back to the caller.
    pub async fn save_now(&self) -> Result<SaveStatus, SaveError> {
        self.timer().cancel();
        self.shared.persist().await.map_err(|err| {
            debug!(note_id = %self.shared.note_id, error = %err, "manual save failed");
            err
        })
    }

    /// Drop any pending save. A save that is already running is left to
    /// finish on its own.
    pub fn dispose(&self) {
        let mut timer = self.timer();
        if timer.is_pending() {
            debug!(note_id = %self.shared.note_id, "discarding pending auto-save");
        }
        timer.cancel();
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        self.dispose();
    }
}
