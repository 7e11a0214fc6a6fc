//! SpaceNotes Platform macOS
//!
//! macOS window-server integration for the space engine.
//!
//! This crate handles:
//! - Active space and display/space topology queries via private CGS calls
//! - Window-to-space lookups
//! - A polling watcher that reports desktop switches
//!
//! On other targets the oracle reports every query as unavailable, so the
//! engine degrades to its generic fallbacks instead of failing to build.

#[cfg(target_os = "macos")]
mod cgs;
mod oracle;
mod watcher;

use spacenotes_core::SpaceError;
use thiserror::Error;

pub use oracle::{native_oracle, NativeOracle, UnsupportedOracle};
#[cfg(target_os = "macos")]
pub use oracle::MacSpaceOracle;
pub use watcher::{install_space_watcher, PlatformEvent, SpaceWatcherHandle, SwitchDetector, WatcherConfig};

/// Errors that can occur while talking to the window server.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Window server query failed: {0}")]
    QueryFailed(String),

    #[error("Failed to start space watcher: {0}")]
    WatcherFailed(String),

    #[error("Space queries are not supported on this platform")]
    Unsupported,
}

impl From<PlatformError> for SpaceError {
    fn from(err: PlatformError) -> Self {
        SpaceError::QueryUnavailable(err.to_string())
    }
}
