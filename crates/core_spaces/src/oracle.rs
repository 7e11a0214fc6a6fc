//! Capability boundary to the OS window server.
//!
//! The space-query calls are private, version-specific window-server
//! interfaces. Everything above this module depends only on these traits;
//! each OS version gets its own implementation and tests use
//! [`crate::testing::MockOracle`].

use crate::registry::WindowHandle;
use crate::{SpaceError, SpaceId, WindowNumber};
use serde::{Deserialize, Serialize};

/// Space type tag the window server uses for ordinary user desktops.
pub const USER_DESKTOP_TYPE: i64 = 0;

/// One space entry exactly as enumerated by the window server.
///
/// Fields are optional because the dictionaries behind them are untyped;
/// validation happens in [`crate::SpaceDirectory::topology`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpace {
    /// Preferred 64-bit space id (`id64`).
    pub id64: Option<i64>,
    /// Legacy id key (`ManagedSpaceID`), used when `id64` is absent.
    pub managed_space_id: Option<i64>,
    /// Space type tag; 0 is a user desktop, anything else is full screen.
    pub space_type: Option<i64>,
    /// Space UUID, only used for diagnostics.
    pub uuid: Option<String>,
}

impl RawSpace {
    /// Build a well-formed user desktop entry.
    pub fn desktop(id: SpaceId) -> Self {
        Self {
            id64: Some(id),
            managed_space_id: None,
            space_type: Some(USER_DESKTOP_TYPE),
            uuid: None,
        }
    }

    /// Build a well-formed full-screen space entry.
    pub fn fullscreen(id: SpaceId) -> Self {
        Self {
            id64: Some(id),
            managed_space_id: None,
            space_type: Some(4),
            uuid: None,
        }
    }

    /// The space id, preferring `id64` over `ManagedSpaceID`.
    pub fn id(&self) -> Option<SpaceId> {
        self.id64.or(self.managed_space_id)
    }

    /// Whether this entry is tagged as a user desktop.
    pub fn is_user_desktop(&self) -> bool {
        self.space_type == Some(USER_DESKTOP_TYPE)
    }
}

/// One display entry exactly as enumerated by the window server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDisplay {
    /// Display identifier string (`Display Identifier`), "Main" on some setups.
    pub identifier: Option<String>,
    /// Spaces on this display in window-server order. `None` means malformed.
    pub spaces: Option<Vec<RawSpace>>,
}

impl RawDisplay {
    /// Build a display entry with the given spaces.
    pub fn new(identifier: impl Into<String>, spaces: Vec<RawSpace>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            spaces: Some(spaces),
        }
    }
}

/// Untyped topology as returned by one enumeration call.
pub type RawTopology = Vec<RawDisplay>;

/// Read-only queries against the window server's space state.
pub trait SpaceOracle {
    /// The id of the currently active space.
    fn current_active_space_id(&self) -> Result<SpaceId, SpaceError>;

    /// All displays and their spaces, in window-server order.
    fn enumerate_displays_and_spaces(&self) -> Result<RawTopology, SpaceError>;

    /// The space containing the given window, if the window server knows it.
    fn space_id_for_window(&self, window: WindowNumber) -> Option<SpaceId>;
}

/// Window stacking level used by note windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowLevel {
    /// The ordinary application window level.
    Normal,
    /// One below normal: above the desktop background, under every app window.
    Pinned,
}

impl WindowLevel {
    /// Offset from the window server's normal window level.
    pub fn offset_from_normal(self) -> i32 {
        match self {
            WindowLevel::Normal => 0,
            WindowLevel::Pinned => -1,
        }
    }
}

/// How the window participates in space switching and Exposé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionBehavior {
    /// No explicit behavior flags.
    Default,
    /// Participates in normal desktop management but is not pulled forward
    /// by space switches.
    Managed,
}

/// Setters for window level, collection behavior and ordering.
///
/// Implementations may apply these in-process or forward them to whichever
/// process owns the window.
pub trait WindowControl {
    fn set_level(&mut self, window: WindowHandle, level: WindowLevel) -> Result<(), SpaceError>;

    fn set_collection_behavior(
        &mut self,
        window: WindowHandle,
        behavior: CollectionBehavior,
    ) -> Result<(), SpaceError>;

    /// Order the window behind all other windows at its level.
    fn order_back(&mut self, window: WindowHandle) -> Result<(), SpaceError>;

    /// Order the window to the front even when the app is inactive.
    fn order_front_regardless(&mut self, window: WindowHandle) -> Result<(), SpaceError>;

    /// Make the window key and order it front.
    fn make_key_and_order_front(&mut self, window: WindowHandle) -> Result<(), SpaceError>;

    /// Ask the owning application to take foreground focus.
    fn activate_application(&mut self) -> Result<(), SpaceError>;
}
