//! Length rules for note titles and content. The same rules gate note
//! creation, manual saves and background auto-saves, so a draft that is
//! rejected here never reaches the store.

use super::{config, models::NoteDraft};
use thiserror::Error;

/// Only the first failing check is reported, in declaration order.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,
    #[error("Title must be at least {0} characters long")]
    TitleTooShort(usize),
    #[error("Title must be at most {0} characters long")]
    TitleTooLong(usize),
    #[error("Content is required")]
    ContentRequired,
    #[error("Content must be at least {0} characters long")]
    ContentTooShort(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    pub min_title_len: usize,
    pub max_title_len: usize,
    pub min_content_len: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_title_len: config::MIN_TITLE_LEN,
            max_title_len: config::MAX_TITLE_LEN,
            min_content_len: config::MIN_CONTENT_LEN,
        }
    }
}

impl Rules {
    pub fn validate(&self, draft: &NoteDraft) -> Result<(), ValidationError> {
        let title = draft.title.trim();
        let content = draft.content.trim();
        // Lengths are counted in characters, not bytes, so "Café" is four
        // long like the user would expect.
        let title_len = title.chars().count();
        let content_len = content.chars().count();

        if title.is_empty() {
            Err(ValidationError::TitleRequired)
        } else if title_len < self.min_title_len {
            Err(ValidationError::TitleTooShort(self.min_title_len))
        } else if title_len > self.max_title_len {
            Err(ValidationError::TitleTooLong(self.max_title_len))
        } else if content.is_empty() {
            Err(ValidationError::ContentRequired)
        } else if content_len < self.min_content_len {
            Err(ValidationError::ContentTooShort(self.min_content_len))
        } else {
            Ok(())
        }
    }
}
