//! SpaceNotes IPC Protocol
//!
//! Shared types for daemon-client communication over a local Unix domain
//! socket. Each connection carries one newline-terminated JSON command and
//! one newline-terminated JSON response.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// File name of the daemon socket.
pub const SOCKET_FILE_NAME: &str = "spacenotes.sock";

/// Environment variable overriding the socket location.
pub const SOCKET_ENV_VAR: &str = "SPACENOTES_SOCKET";

/// Maximum size of a single IPC message, in bytes.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Peers must send their message within this period.
pub const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while encoding or decoding IPC messages.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed IPC message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IPC message exceeds the 64 KiB limit")]
    MessageTooLarge,

    #[error("Peer closed the connection without a message")]
    Empty,

    #[error("Timed out waiting for peer")]
    Timeout,
}

/// Socket path: an explicit path wins, then [`SOCKET_ENV_VAR`], then the default.
pub fn socket_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve_socket_path(explicit.or_else(|| std::env::var_os(SOCKET_ENV_VAR).map(PathBuf::from)))
}

/// Socket path given an optional override.
///
/// Falls back to the per-user runtime directory, then the data directory,
/// then the system temp directory.
pub fn resolve_socket_path(override_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path;
    }
    ProjectDirs::from("", "", "spacenotes")
        .map(|dirs| {
            dirs.runtime_dir()
                .unwrap_or_else(|| dirs.data_local_dir())
                .join(SOCKET_FILE_NAME)
        })
        .unwrap_or_else(|| std::env::temp_dir().join(SOCKET_FILE_NAME))
}

/// Serialize `message` as one protocol line, including the trailing newline.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let mut line = serde_json::to_string(message)?;
    if line.len() >= MAX_IPC_MESSAGE_SIZE {
        return Err(IpcError::MessageTooLarge);
    }
    line.push('\n');
    Ok(line)
}

/// Parse one protocol line. Surrounding whitespace is ignored.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, IpcError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(IpcError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Commands sent from UI clients and the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// A note window was realized on screen.
    WindowCreated { note_id: Uuid, window_number: i64 },
    /// A note window was closed.
    WindowClosed { note_id: Uuid },
    /// A note window moved to another display.
    WindowChangedScreen { note_id: Uuid },
    /// A note window finished a drag or move.
    WindowMoved { note_id: Uuid },

    /// Toggle a note's pin.
    TogglePin { note_id: Uuid },
    /// Set a user label on a note's space.
    RenameSpace { note_id: Uuid, name: String },
    /// Raise a note's window (header click).
    Activate { note_id: Uuid },

    /// Create a note, on the active space unless one is given.
    CreateNote {
        #[serde(default)]
        space_id: Option<i64>,
    },
    /// Delete a note.
    DeleteNote { note_id: Uuid },
    /// Bring a note's window forward so the OS switches to its desktop.
    OpenNote { note_id: Uuid },
    /// List notes, optionally only those on one space.
    ListNotes {
        #[serde(default)]
        space_id: Option<i64>,
    },

    /// Query the display and desktop topology.
    QuerySpaces,
    /// Query the active space.
    QueryCurrentSpace,

    /// Drain pending window directives and events.
    Poll,
    /// Stop the daemon.
    Stop,
}

/// Responses from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed.
    Error { message: String },
    /// New pin state after a toggle.
    Pinned { note_id: Uuid, pinned: bool },
    /// A single note.
    Note { note: NoteInfo },
    /// A list of notes.
    Notes { notes: Vec<NoteInfo> },
    /// Display and desktop topology. Empty when unknown.
    Spaces { displays: Vec<DisplayInfo> },
    /// The active space, if it could be read.
    CurrentSpace { space_id: Option<i64>, name: String },
    /// Pending work for UI clients.
    Updates {
        directives: Vec<WindowDirective>,
        events: Vec<IpcEvent>,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Note metadata as exposed to clients. Content is not transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub id: Uuid,
    pub space_id: i64,
    pub space_name: String,
    pub is_pinned: bool,
    pub background_color: String,
    pub updated_at: DateTime<Utc>,
}

/// One display and the spaces it hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub identifier: String,
    /// "Main" or "Secondary N".
    pub name: String,
    pub is_primary: bool,
    pub desktops: Vec<DesktopInfo>,
    /// Ids of full-screen application spaces.
    pub fullscreen: Vec<i64>,
}

/// One user desktop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopInfo {
    pub space_id: i64,
    /// 1-based position on its display.
    pub index: usize,
    /// Default name, e.g. "Main Desktop 2".
    pub name: String,
    pub is_current: bool,
}

/// A window operation for the UI process to apply to one of its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WindowDirective {
    /// Set the window level, as an offset from the normal window level.
    SetLevel { window_number: i64, level_offset: i32 },
    /// `managed` joins normal desktop management without following space switches.
    SetCollectionBehavior { window_number: i64, managed: bool },
    OrderBack { window_number: i64 },
    OrderFrontRegardless { window_number: i64 },
    MakeKeyAndOrderFront { window_number: i64 },
    ActivateApplication,
}

/// Engine events forwarded to UI clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IpcEvent {
    SpaceChanged { space_id: i64 },
    PinToggled { note_id: Uuid, pinned: bool },
    SpaceRenamed { note_id: Uuid, name: String },
}
