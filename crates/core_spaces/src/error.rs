//! Error taxonomy for the space engine.
//!
//! None of these are fatal. Callers log them and fall back to the current
//! space, the generic "Desktop" label or a no-op.

use crate::{NoteId, SpaceId};
use thiserror::Error;

/// Errors that can occur while querying spaces or placing windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    /// The OS capability surface is unreachable or returned a malformed response.
    #[error("Space query unavailable: {0}")]
    QueryUnavailable(String),

    /// The space id no longer exists (desktop removed or stale id).
    #[error("Space {0} not found")]
    NotFound(SpaceId),

    /// No open window is registered for the note.
    #[error("No window registered for note {0}")]
    WindowUnresolved(NoteId),

    /// The note record is missing from the store.
    #[error("Note {0} not found")]
    NoteNotFound(NoteId),
}

impl SpaceError {
    /// Create a `QueryUnavailable` error from any displayable reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::QueryUnavailable(reason.into())
    }
}
