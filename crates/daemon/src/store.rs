//! JSON-file note store.
//!
//! All notes live in one pretty-printed JSON array. The whole file is
//! rewritten on every change through a temp file and a rename, so a crash
//! never leaves a half-written store behind.

use spacenotes_core::{Note, NoteId, NoteStore, SpaceId};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that can occur while persisting notes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Note store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode notes: {0}")]
    Encode(#[from] serde_json::Error),
}

/// [`NoteStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct JsonNoteStore {
    path: PathBuf,
    notes: Vec<Note>,
}

impl JsonNoteStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. A corrupt file is moved aside to
    /// `notes.json.corrupt` before starting empty, so the next save cannot
    /// destroy it. An unreadable file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notes = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<Vec<Note>>(&json) {
                Ok(notes) => {
                    info!("Loaded {} notes from {}", notes.len(), path.display());
                    notes
                }
                Err(e) => {
                    error!("Failed to parse notes file {}: {}", path.display(), e);
                    quarantine(&path);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No notes file at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read notes file {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self { path, notes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every note to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.notes)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!("Saved {} notes to {}", self.notes.len(), self.path.display());
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            error!("{}", e);
        }
    }
}

/// Move an unparseable notes file out of the way.
fn quarantine(path: &Path) {
    let target = path.with_extension("json.corrupt");
    match std::fs::rename(path, &target) {
        Ok(()) => error!("Moved corrupt notes file to {}", target.display()),
        Err(e) => error!(
            "Failed to move corrupt notes file {} aside: {}",
            path.display(),
            e
        ),
    }
}

impl NoteStore for JsonNoteStore {
    fn save(&mut self, note: &Note) {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => self.notes.push(note.clone()),
        }
        self.persist();
    }

    fn delete(&mut self, id: NoteId) {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() != before {
            self.persist();
        }
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
