//! Desktop-switch watcher.
//!
//! Polls the active space on a background thread and reports changes.
//! Works with any [`SpaceOracle`], so tests drive it with a mock.

use crate::PlatformError;
use spacenotes_core::{SpaceError, SpaceId, SpaceOracle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Events reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The active space changed to the given id.
    SpaceSwitched(SpaceId),
}

/// Watcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// How often the active space is sampled.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Turns a stream of active-space samples into switch notifications.
#[derive(Debug, Default)]
pub struct SwitchDetector {
    last: Option<SpaceId>,
    failing: bool,
}

impl SwitchDetector {
    /// Create a detector that treats `initial` as the starting space.
    pub fn new(initial: Option<SpaceId>) -> Self {
        Self {
            last: initial,
            failing: false,
        }
    }

    /// Feed one sample. Returns the new space id if it differs from the last one seen.
    ///
    /// Failed samples are logged once per failure streak and never
    /// reported as switches.
    pub fn observe(&mut self, sample: Result<SpaceId, SpaceError>) -> Option<SpaceId> {
        match sample {
            Ok(space_id) => {
                self.failing = false;
                if self.last == Some(space_id) {
                    return None;
                }
                self.last = Some(space_id);
                Some(space_id)
            }
            Err(e) => {
                if !self.failing {
                    warn!("Active space unavailable: {}", e);
                    self.failing = true;
                }
                None
            }
        }
    }
}

/// Handle for a running watcher. Dropping it stops the thread.
pub struct SpaceWatcherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SpaceWatcherHandle {
    /// Stop the watcher and wait for its thread to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                warn!("Space watcher thread panicked");
            }
        }
    }
}

impl Drop for SpaceWatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start watching for desktop switches.
///
/// The starting space is sampled before this returns and is not reported.
/// Every later change is passed to `callback` from the watcher thread.
pub fn install_space_watcher<O, F>(
    oracle: O,
    config: WatcherConfig,
    callback: F,
) -> Result<SpaceWatcherHandle, PlatformError>
where
    O: SpaceOracle + Send + 'static,
    F: Fn(PlatformEvent) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let mut detector = SwitchDetector::new(oracle.current_active_space_id().ok());

    let thread = std::thread::Builder::new()
        .name("space-watcher".to_string())
        .spawn(move || {
            debug!("Space watcher polling every {:?}", config.poll_interval);
            while !thread_stop.load(Ordering::SeqCst) {
                std::thread::park_timeout(config.poll_interval);
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(space_id) = detector.observe(oracle.current_active_space_id()) {
                    callback(PlatformEvent::SpaceSwitched(space_id));
                }
            }
            debug!("Space watcher stopped");
        })
        .map_err(|e| PlatformError::WatcherFailed(e.to_string()))?;

    Ok(SpaceWatcherHandle {
        stop,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacenotes_core::testing::MockOracle;
    use spacenotes_core::{RawDisplay, RawSpace};
    use std::sync::mpsc;

    fn oracle() -> MockOracle {
        MockOracle::new(
            1,
            vec![RawDisplay::new("Main", vec![RawSpace::desktop(1), RawSpace::desktop(2)])],
        )
    }

    #[test]
    fn test_detector_reports_changes_only() {
        let mut detector = SwitchDetector::new(Some(1));
        assert_eq!(detector.observe(Ok(1)), None);
        assert_eq!(detector.observe(Ok(2)), Some(2));
        assert_eq!(detector.observe(Ok(2)), None);
        assert_eq!(detector.observe(Ok(1)), Some(1));
    }

    #[test]
    fn test_detector_ignores_failures() {
        let mut detector = SwitchDetector::new(None);
        assert_eq!(detector.observe(Err(SpaceError::unavailable("offline"))), None);
        assert_eq!(detector.observe(Err(SpaceError::unavailable("offline"))), None);
        assert_eq!(detector.observe(Ok(5)), Some(5));
        // Recovering to the same space is not a switch
        assert_eq!(detector.observe(Err(SpaceError::unavailable("offline"))), None);
        assert_eq!(detector.observe(Ok(5)), None);
    }

    #[test]
    fn test_watcher_reports_switch() {
        let oracle = oracle();
        let (tx, rx) = mpsc::channel();
        let config = WatcherConfig {
            poll_interval: Duration::from_millis(5),
        };
        let mut handle = install_space_watcher(oracle.clone(), config, move |event| {
            let _ = tx.send(event);
        })
        .unwrap();

        oracle.set_current_space(2);
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, PlatformEvent::SpaceSwitched(2));

        handle.stop();
        // The callback's sender is dropped with the thread
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_default_poll_interval() {
        assert_eq!(WatcherConfig::default().poll_interval, Duration::from_millis(250));
    }
}
