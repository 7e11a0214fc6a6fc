//! Window Registry
//!
//! Process-local map from note id to the window currently showing it.
//! Nothing here is persisted.

use crate::{NoteId, SpaceId, WindowNumber, UNSET_SPACE_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Opaque handle of an open note window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(WindowNumber);

impl WindowHandle {
    /// Wrap a window-server window number.
    pub fn new(number: WindowNumber) -> Self {
        Self(number)
    }

    /// The window-server window number.
    pub fn number(self) -> WindowNumber {
        self.0
    }
}

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Association between an open window and the note it shows.
///
/// `last_known_space_id` and `is_pinned` mirror the persisted note and are
/// kept eventually consistent with it by the placement controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteWindowBinding {
    pub note_id: NoteId,
    pub window: WindowHandle,
    pub last_known_space_id: SpaceId,
    pub is_pinned: bool,
}

/// Map of open note windows.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    bindings: HashMap<NoteId, NoteWindowBinding>,
}

impl WindowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `window` to `note_id`.
    ///
    /// Re-registering a note replaces its handle (last write wins). If the
    /// handle is still bound to a different note, that stale binding is
    /// dropped so one window never serves two notes.
    pub fn register(&mut self, note_id: NoteId, window: WindowHandle) -> &NoteWindowBinding {
        let stale: Vec<NoteId> = self
            .bindings
            .values()
            .filter(|b| b.window == window && b.note_id != note_id)
            .map(|b| b.note_id)
            .collect();
        for other in stale {
            warn!(
                "{} re-registered for note {}, dropping stale binding for note {}",
                window, note_id, other
            );
            self.bindings.remove(&other);
        }

        let binding = self
            .bindings
            .entry(note_id)
            .and_modify(|b| {
                if b.window != window {
                    debug!("Note {} window replaced: {} -> {}", note_id, b.window, window);
                }
                b.window = window;
            })
            .or_insert(NoteWindowBinding {
                note_id,
                window,
                last_known_space_id: UNSET_SPACE_ID,
                is_pinned: false,
            });
        &*binding
    }

    /// Remove the binding for `note_id`, returning it if present.
    pub fn unregister(&mut self, note_id: NoteId) -> Option<NoteWindowBinding> {
        self.bindings.remove(&note_id)
    }

    /// The window currently showing `note_id`.
    pub fn lookup(&self, note_id: NoteId) -> Option<WindowHandle> {
        self.bindings.get(&note_id).map(|b| b.window)
    }

    /// The full binding for `note_id`.
    pub fn binding(&self, note_id: NoteId) -> Option<&NoteWindowBinding> {
        self.bindings.get(&note_id)
    }

    /// Mirror the note's recorded space onto its binding.
    pub fn record_space(&mut self, note_id: NoteId, space_id: SpaceId) {
        if let Some(binding) = self.bindings.get_mut(&note_id) {
            binding.last_known_space_id = space_id;
        }
    }

    /// Mirror the note's pin flag onto its binding.
    pub fn record_pinned(&mut self, note_id: NoteId, is_pinned: bool) {
        if let Some(binding) = self.bindings.get_mut(&note_id) {
            binding.is_pinned = is_pinned;
        }
    }

    /// Ids of all notes with an open window.
    pub fn note_ids(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.bindings.keys().copied()
    }

    /// Number of open note windows.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no note windows are open.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = WindowRegistry::new();
        let note = Uuid::new_v4();
        registry.register(note, WindowHandle::new(10));

        assert_eq!(registry.lookup(note), Some(WindowHandle::new(10)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.binding(note).unwrap().last_known_space_id, UNSET_SPACE_ID);
    }

    #[test]
    fn test_unregister() {
        let mut registry = WindowRegistry::new();
        let note = Uuid::new_v4();
        registry.register(note, WindowHandle::new(10));

        let removed = registry.unregister(note).unwrap();
        assert_eq!(removed.window, WindowHandle::new(10));
        assert_eq!(registry.lookup(note), None);
        assert!(registry.is_empty());
        assert!(registry.unregister(note).is_none());
    }

    #[test]
    fn test_reregister_same_note_last_write_wins() {
        let mut registry = WindowRegistry::new();
        let note = Uuid::new_v4();
        registry.register(note, WindowHandle::new(10));
        registry.record_space(note, 42);
        registry.register(note, WindowHandle::new(11));

        assert_eq!(registry.lookup(note), Some(WindowHandle::new(11)));
        // Mirror fields survive a handle swap
        assert_eq!(registry.binding(note).unwrap().last_known_space_id, 42);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_handle_never_serves_two_notes() {
        let mut registry = WindowRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.register(first, WindowHandle::new(10));
        registry.register(second, WindowHandle::new(10));

        assert_eq!(registry.lookup(first), None);
        assert_eq!(registry.lookup(second), Some(WindowHandle::new(10)));
    }

    #[test]
    fn test_mirror_fields() {
        let mut registry = WindowRegistry::new();
        let note = Uuid::new_v4();
        registry.register(note, WindowHandle::new(3));
        registry.record_space(note, 7);
        registry.record_pinned(note, true);

        let binding = registry.binding(note).unwrap();
        assert_eq!(binding.last_known_space_id, 7);
        assert!(binding.is_pinned);

        // Unknown notes are ignored
        registry.record_pinned(Uuid::new_v4(), true);
        assert_eq!(registry.len(), 1);
    }
}
