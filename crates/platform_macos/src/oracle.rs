//! [`SpaceOracle`] implementations for the host OS.

use crate::PlatformError;
use spacenotes_core::{RawTopology, SpaceError, SpaceId, SpaceOracle, WindowNumber};
use tracing::warn;

#[cfg(target_os = "macos")]
use crate::cgs;

/// Oracle backed by the window server's private space calls.
#[cfg(target_os = "macos")]
#[derive(Debug, Clone, Copy)]
pub struct MacSpaceOracle {
    connection: cgs::ConnectionId,
}

#[cfg(target_os = "macos")]
impl MacSpaceOracle {
    /// Connect to the window server's main connection.
    pub fn new() -> Self {
        Self {
            connection: cgs::main_connection(),
        }
    }
}

#[cfg(target_os = "macos")]
impl Default for MacSpaceOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl SpaceOracle for MacSpaceOracle {
    fn current_active_space_id(&self) -> Result<SpaceId, SpaceError> {
        Ok(cgs::active_space(self.connection)?)
    }

    fn enumerate_displays_and_spaces(&self) -> Result<RawTopology, SpaceError> {
        Ok(cgs::managed_display_spaces(self.connection)?)
    }

    fn space_id_for_window(&self, window: WindowNumber) -> Option<SpaceId> {
        cgs::space_for_window(self.connection, window)
    }
}

/// Oracle for targets without a window-server space API.
///
/// Every query fails with `QueryUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedOracle;

impl UnsupportedOracle {
    pub fn new() -> Self {
        warn!("{}; space tracking disabled", PlatformError::Unsupported);
        Self
    }
}

impl SpaceOracle for UnsupportedOracle {
    fn current_active_space_id(&self) -> Result<SpaceId, SpaceError> {
        Err(PlatformError::Unsupported.into())
    }

    fn enumerate_displays_and_spaces(&self) -> Result<RawTopology, SpaceError> {
        Err(PlatformError::Unsupported.into())
    }

    fn space_id_for_window(&self, _window: WindowNumber) -> Option<SpaceId> {
        None
    }
}

/// The oracle type for the current target.
#[cfg(target_os = "macos")]
pub type NativeOracle = MacSpaceOracle;

/// The oracle type for the current target.
#[cfg(not(target_os = "macos"))]
pub type NativeOracle = UnsupportedOracle;

/// Create the oracle for the current target.
pub fn native_oracle() -> NativeOracle {
    NativeOracle::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_oracle_reports_unavailable() {
        let oracle = UnsupportedOracle;
        assert!(matches!(
            oracle.current_active_space_id(),
            Err(SpaceError::QueryUnavailable(_))
        ));
        assert!(matches!(
            oracle.enumerate_displays_and_spaces(),
            Err(SpaceError::QueryUnavailable(_))
        ));
        assert_eq!(oracle.space_id_for_window(12), None);
    }
}
