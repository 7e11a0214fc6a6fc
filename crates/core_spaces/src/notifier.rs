//! Space Change Notifier
//!
//! Typed publish/subscribe for space-related events. Subscribers are called
//! synchronously on the thread that owns the engine, in no particular
//! order, and must tolerate repeated delivery of an unchanged id.

use crate::directory::SpaceDirectory;
use crate::{NoteId, SpaceId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Events published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceEvent {
    /// The active space changed (or was re-announced).
    SpaceChanged(SpaceId),
    /// A note's pin flag was toggled.
    PinToggled { note_id: NoteId, pinned: bool },
    /// A note's space label changed, automatically or by the user.
    SpaceRenamed { note_id: NoteId, name: String },
}

/// Handle returned by [`SpaceChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&SpaceEvent)>;

/// Explicit subscriber list for [`SpaceEvent`]s.
#[derive(Default)]
pub struct SpaceChangeNotifier {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
    current_space: Option<SpaceId>,
}

impl SpaceChangeNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for all future events.
    pub fn subscribe(&mut self, callback: impl FnMut(&SpaceEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Last space id published, if any.
    pub fn current_space(&self) -> Option<SpaceId> {
        self.current_space
    }

    /// Deliver `event` to every subscriber.
    pub fn publish(&mut self, event: &SpaceEvent) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(event);
        }
    }

    /// Handle the OS desktop-switch signal.
    ///
    /// Invalidates the directory's cached topology, re-reads the active
    /// space and publishes it. Returns the new id, or `None` when the OS
    /// query failed (nothing is published in that case).
    pub fn handle_space_switch(&mut self, directory: &SpaceDirectory) -> Option<SpaceId> {
        directory.invalidate();

        let space_id = match directory.current_space_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("Space switch detected but active space unknown: {}", e);
                return None;
            }
        };

        if self.current_space == Some(space_id) {
            debug!("Space switch re-announced unchanged space {}", space_id);
        } else {
            debug!("Active space -> {} ({})", space_id, directory.default_name(space_id));
        }
        self.current_space = Some(space_id);
        self.publish(&SpaceEvent::SpaceChanged(space_id));
        Some(space_id)
    }
}
