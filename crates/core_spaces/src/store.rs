//! Note records and the store boundary.
//!
//! The engine reads and writes only `space_id`, `space_name`, `is_pinned`
//! and `updated_at`; everything else on [`Note`] belongs to the UI layer.

use crate::naming::FALLBACK_SPACE_NAME;
use crate::{NoteId, SpaceId, UNSET_SPACE_ID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Background colors offered for new notes, as (name, hex) pairs.
pub const PRESET_COLORS: &[(&str, &str)] = &[
    ("Lemon", "#FFFACD"),
    ("Mint", "#98FB98"),
    ("Sky", "#87CEEB"),
    ("Blossom", "#FFB6C1"),
    ("Lavender", "#E6E6FA"),
    ("Peach", "#FFDAB9"),
    ("White", "#FFFFFF"),
];

/// Window frame of a note, in screen points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for NoteGeometry {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 100.0,
            width: 300.0,
            height: 300.0,
        }
    }
}

/// A persisted note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Rich-text payload, opaque to the engine.
    #[serde(default)]
    pub content: Vec<u8>,
    /// Space the note belongs to; [`UNSET_SPACE_ID`] until first placed.
    pub space_id: SpaceId,
    /// Label shown in the note header; auto-generated or user supplied.
    pub space_name: String,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub geometry: NoteGeometry,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Kept behind normal windows, just above the desktop.
    #[serde(default)]
    pub is_pinned: bool,
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

impl Note {
    /// Create an empty, unplaced note.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: NoteId::new_v4(),
            content: Vec::new(),
            space_id: UNSET_SPACE_ID,
            space_name: FALLBACK_SPACE_NAME.to_string(),
            background_color: default_background(),
            geometry: NoteGeometry::default(),
            created_at: now,
            updated_at: now,
            is_pinned: false,
        }
    }

    /// Create a note already placed on a space.
    pub fn on_space(space_id: SpaceId, space_name: impl Into<String>) -> Self {
        Self {
            space_id,
            space_name: space_name.into(),
            ..Self::new()
        }
    }

    /// Whether the note has never been assigned a space.
    pub fn is_unplaced(&self) -> bool {
        self.space_id == UNSET_SPACE_ID
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence for note records.
///
/// Only ever mutated from the engine's owning thread.
pub trait NoteStore {
    /// Insert or replace a note.
    fn save(&mut self, note: &Note);

    /// Remove a note. Unknown ids are ignored.
    fn delete(&mut self, id: NoteId);

    /// Look up a note by id.
    fn note(&self, id: NoteId) -> Option<Note>;

    /// All notes recorded on `space_id`.
    fn notes_for_space(&self, space_id: SpaceId) -> Vec<Note>;

    /// All notes in insertion order.
    fn all(&self) -> Vec<Note>;
}

/// In-memory store preserving insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryNoteStore {
    notes: Vec<Note>,
    saves: usize,
}

impl MemoryNoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `notes`.
    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self { notes, saves: 0 }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl NoteStore for MemoryNoteStore {
    fn save(&mut self, note: &Note) {
        self.saves += 1;
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => self.notes.push(note.clone()),
        }
    }

    fn delete(&mut self, id: NoteId) {
        self.notes.retain(|n| n.id != id);
    }

    fn note(&self, id: NoteId) -> Option<Note> {
        self.notes.iter().find(|n| n.id == id).cloned()
    }

    fn notes_for_space(&self, space_id: SpaceId) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|n| n.space_id == space_id)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<Note> {
        self.notes.clone()
    }
}
