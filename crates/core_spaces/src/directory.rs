//! Space Directory
//!
//! Turns the window server's untyped display/space enumeration into typed
//! snapshots, classifies space ids and produces default names.
//!
//! Desktop indices are positional: they are recomputed from the
//! enumeration order on every call and may shift when the OS reorders
//! desktops. Only the space id is stable across a session.

use crate::naming::{self, FALLBACK_SPACE_NAME, FULLSCREEN_SPACE_NAME};
use crate::oracle::{RawTopology, SpaceOracle};
use crate::{SpaceError, SpaceId, WindowNumber};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::{debug, warn};

/// A physical display as seen in one topology query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    /// Window-server display identifier (usually a UUID string).
    pub identifier: String,
    /// Whether this display is considered primary (see [`is_primary_display`]).
    pub is_primary: bool,
    /// 0 for the primary display, 1..N for secondaries in discovery order.
    pub display_index: usize,
}

/// A user-switchable desktop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDescriptor {
    pub space_id: SpaceId,
    pub display: DisplayDescriptor,
    /// 1-based position among the user desktops of `display`.
    pub index_on_display: usize,
}

/// A full-screen application space. Carries no index or display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullscreenSpace {
    pub space_id: SpaceId,
}

/// The spaces hosted by one display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySpaces {
    pub display: DisplayDescriptor,
    /// User desktops in window-server order.
    pub desktops: Vec<SpaceDescriptor>,
    /// Full-screen application spaces on this display.
    pub fullscreen: Vec<FullscreenSpace>,
}

/// Displays and their spaces, taken from a single enumeration.
///
/// Only valid until the next topology change. An empty snapshot means the
/// topology is unknown, not that there are no desktops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceTopologySnapshot {
    pub displays: Vec<DisplaySpaces>,
}

/// Result of classifying a space id against a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceLookup {
    Desktop(SpaceDescriptor),
    Fullscreen(FullscreenSpace),
    NotFound,
}

impl SpaceTopologySnapshot {
    /// Check if the snapshot holds no displays.
    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    /// All user desktops across all displays, in display order.
    pub fn desktops(&self) -> impl Iterator<Item = &SpaceDescriptor> {
        self.displays.iter().flat_map(|d| d.desktops.iter())
    }

    /// Number of user desktops across all displays.
    pub fn desktop_count(&self) -> usize {
        self.displays.iter().map(|d| d.desktops.len()).sum()
    }

    /// Classify a space id.
    pub fn lookup(&self, space_id: SpaceId) -> SpaceLookup {
        for entry in &self.displays {
            if let Some(desktop) = entry.desktops.iter().find(|s| s.space_id == space_id) {
                return SpaceLookup::Desktop(desktop.clone());
            }
            if let Some(fullscreen) = entry.fullscreen.iter().find(|s| s.space_id == space_id) {
                return SpaceLookup::Fullscreen(*fullscreen);
            }
        }
        SpaceLookup::NotFound
    }

    /// Build a typed snapshot from the raw enumeration.
    ///
    /// Fails on the first malformed display or space so callers never see a
    /// partially parsed topology.
    pub fn from_raw(raw: &RawTopology) -> Result<Self, String> {
        let mut displays = Vec::with_capacity(raw.len());
        let mut secondary_index = 1;

        for (index, raw_display) in raw.iter().enumerate() {
            let identifier = raw_display
                .identifier
                .clone()
                .unwrap_or_else(|| format!("unknown-{index}"));

            let is_primary = is_primary_display(index, &identifier);
            let display_index = if is_primary {
                0
            } else {
                secondary_index += 1;
                secondary_index - 1
            };

            let display = DisplayDescriptor {
                identifier,
                is_primary,
                display_index,
            };

            let raw_spaces = raw_display
                .spaces
                .as_ref()
                .ok_or_else(|| format!("display {} has no space list", display.identifier))?;

            let mut desktops = Vec::new();
            let mut fullscreen = Vec::new();
            for (space_pos, raw_space) in raw_spaces.iter().enumerate() {
                let space_id = raw_space.id().ok_or_else(|| {
                    format!(
                        "space #{space_pos} on display {} has no id",
                        display.identifier
                    )
                })?;
                if raw_space.space_type.is_none() {
                    return Err(format!("space {space_id} has no type tag"));
                }

                if raw_space.is_user_desktop() {
                    desktops.push(SpaceDescriptor {
                        space_id,
                        display: display.clone(),
                        index_on_display: desktops.len() + 1,
                    });
                } else {
                    fullscreen.push(FullscreenSpace { space_id });
                }
            }

            displays.push(DisplaySpaces {
                display,
                desktops,
                fullscreen,
            });
        }

        Ok(Self { displays })
    }
}

/// Decide whether the display at `enumeration_index` is the primary display.
///
/// Heuristic, not an OS guarantee: the window server has listed the main
/// display first on every version seen so far, and some setups label it
/// "Main" in the identifier. Multi-GPU setups may break either assumption.
pub fn is_primary_display(enumeration_index: usize, identifier: &str) -> bool {
    enumeration_index == 0 || identifier.to_lowercase().contains("main")
}

/// Typed access to the window server's space state.
pub struct SpaceDirectory {
    oracle: Box<dyn SpaceOracle>,
    /// Last snapshot handed out by [`Self::cached_topology`]; cleared on space switches.
    cache: RefCell<Option<SpaceTopologySnapshot>>,
}

impl SpaceDirectory {
    /// Create a directory backed by the given oracle.
    pub fn new(oracle: Box<dyn SpaceOracle>) -> Self {
        Self {
            oracle,
            cache: RefCell::new(None),
        }
    }

    /// The currently active space id. One synchronous native call.
    pub fn current_space_id(&self) -> Result<SpaceId, SpaceError> {
        self.oracle.current_active_space_id()
    }

    /// The space that currently contains `window`, if resolvable.
    pub fn space_id_for_window(&self, window: WindowNumber) -> Option<SpaceId> {
        self.oracle.space_id_for_window(window)
    }

    /// Take a fresh topology snapshot.
    ///
    /// Returns an empty snapshot when any display's data is malformed.
    pub fn topology(&self) -> Result<SpaceTopologySnapshot, SpaceError> {
        let raw = self.oracle.enumerate_displays_and_spaces()?;
        match SpaceTopologySnapshot::from_raw(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(reason) => {
                warn!("Discarding malformed space topology: {}", reason);
                Ok(SpaceTopologySnapshot::default())
            }
        }
    }

    /// Topology snapshot that may be reused until the next space switch.
    ///
    /// Only for listing and diagnostics; classification always uses a
    /// fresh [`Self::topology`].
    pub fn cached_topology(&self) -> Result<SpaceTopologySnapshot, SpaceError> {
        if let Some(snapshot) = self.cache.borrow().as_ref() {
            return Ok(snapshot.clone());
        }
        let snapshot = self.topology()?;
        if !snapshot.is_empty() {
            *self.cache.borrow_mut() = Some(snapshot.clone());
        }
        Ok(snapshot)
    }

    /// Drop the cached topology.
    pub fn invalidate(&self) {
        self.cache.borrow_mut().take();
    }

    /// Classify `space_id` against a freshly taken topology.
    ///
    /// Query failures are logged and reported as `NotFound`.
    pub fn describe(&self, space_id: SpaceId) -> SpaceLookup {
        match self.topology() {
            Ok(snapshot) => snapshot.lookup(space_id),
            Err(e) => {
                warn!("Cannot describe space {}: {}", space_id, e);
                SpaceLookup::NotFound
            }
        }
    }

    /// Default display name for a space: "Main Desktop 2", "Fullscreen App" or "Desktop".
    pub fn default_name(&self, space_id: SpaceId) -> String {
        match self.describe(space_id) {
            SpaceLookup::Desktop(space) => naming::desktop_name(&space),
            SpaceLookup::Fullscreen(_) => FULLSCREEN_SPACE_NAME.to_string(),
            SpaceLookup::NotFound => FALLBACK_SPACE_NAME.to_string(),
        }
    }

    /// 1-based index of the desktop on its display, or 1 when unknown.
    pub fn space_index(&self, space_id: SpaceId) -> usize {
        match self.describe(space_id) {
            SpaceLookup::Desktop(space) => space.index_on_display,
            _ => 1,
        }
    }

    /// Number of user desktops, or 1 when the topology is unknown.
    pub fn space_count(&self) -> usize {
        match self.topology() {
            Ok(snapshot) if !snapshot.is_empty() => snapshot.desktop_count(),
            _ => 1,
        }
    }

    /// All user desktops across all displays.
    pub fn all_desktops(&self) -> Result<Vec<SpaceDescriptor>, SpaceError> {
        Ok(self.topology()?.desktops().cloned().collect())
    }

    /// Emit the current topology at debug level.
    pub fn log_topology(&self) {
        let current = self.current_space_id().ok();
        debug!("Active space: {:?}", current);

        let raw = match self.oracle.enumerate_displays_and_spaces() {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Cannot enumerate spaces: {}", e);
                return;
            }
        };
        let snapshot = match SpaceTopologySnapshot::from_raw(&raw) {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                debug!("Space topology malformed: {}", reason);
                return;
            }
        };

        for (entry, raw_display) in snapshot.displays.iter().zip(raw.iter()) {
            debug!(
                "{} ({:.20}...): {} desktop(s), {} full-screen space(s)",
                naming::display_name(&entry.display),
                entry.display.identifier,
                entry.desktops.len(),
                entry.fullscreen.len()
            );
            for desktop in &entry.desktops {
                let uuid = raw_display
                    .spaces
                    .iter()
                    .flatten()
                    .find(|s| s.id() == Some(desktop.space_id))
                    .and_then(|s| s.uuid.as_deref())
                    .unwrap_or("unknown");
                debug!(
                    "  Desktop {}: id={} uuid={:.8}...{}",
                    desktop.index_on_display,
                    desktop.space_id,
                    uuid,
                    if Some(desktop.space_id) == current { " <-- current" } else { "" }
                );
            }
        }
    }
}
