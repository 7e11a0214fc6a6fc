//! SpaceNotes Core
//!
//! Platform-agnostic space-aware window state engine.
//!
//! This crate keeps every open note window associated with the virtual
//! desktop ("Space") it actually lives on:
//! - The [`SpaceDirectory`] answers "which desktop is active" and "what does
//!   the display × desktop topology look like"
//! - The [`SpaceChangeNotifier`] fans desktop switches out to subscribers
//! - The [`WindowRegistry`] maps note ids to their open window handles
//! - One [`PlacementController`] per open window reconciles the recorded
//!   desktop against the real one and drives the pin/z-order state machine
//! - The [`SpaceEngine`] owns all of the above plus a virtual-time
//!   [`Scheduler`] for the settle-delay re-checks
//!
//! All OS access goes through the [`SpaceOracle`] and [`WindowControl`]
//! traits, so the whole engine runs against mocks in tests.

pub mod directory;
pub mod engine;
pub mod error;
pub mod naming;
pub mod notifier;
pub mod oracle;
pub mod placement;
pub mod registry;
pub mod scheduler;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use directory::{
    is_primary_display, DisplayDescriptor, DisplaySpaces, FullscreenSpace, SpaceDescriptor,
    SpaceDirectory, SpaceLookup, SpaceTopologySnapshot,
};
pub use engine::{EngineEvent, SettleDelays, SpaceEngine};
pub use error::SpaceError;
pub use naming::{display_name, is_auto_generated_name, FALLBACK_SPACE_NAME, FULLSCREEN_SPACE_NAME};
pub use notifier::{SpaceChangeNotifier, SpaceEvent, SubscriptionId};
pub use oracle::{
    CollectionBehavior, RawDisplay, RawSpace, RawTopology, SpaceOracle, WindowControl, WindowLevel,
};
pub use placement::{PinState, PlacementContext, PlacementController, PlacementState, ReconcileOutcome};
pub use registry::{NoteWindowBinding, WindowHandle, WindowRegistry};
pub use scheduler::{Deferred, Scheduler};
pub use store::{MemoryNoteStore, Note, NoteGeometry, NoteStore, PRESET_COLORS};

/// Identifier of a virtual desktop as reported by the window server.
pub type SpaceId = i64;

/// Window-server number of an on-screen window.
pub type WindowNumber = i64;

/// Unique identifier of a note.
pub type NoteId = uuid::Uuid;

/// Space id stored on notes that have never been placed on a desktop.
pub const UNSET_SPACE_ID: SpaceId = 0;
