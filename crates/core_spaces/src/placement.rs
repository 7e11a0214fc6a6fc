//! Window Placement Controller
//!
//! One controller per open note window. It reconciles the note's recorded
//! space against the space its window is actually on, and drives the
//! pin/z-order state machine:
//!
//! ```text
//! Unbound ──reconcile──▶ Bound(space) ──reconcile──▶ Bound(space')
//! Unpinned ◀──toggle──▶ Pinned
//! ```
//!
//! Controllers hold no service references. Every call receives a
//! [`PlacementContext`] borrowing the engine's services for its duration.

use crate::directory::SpaceDirectory;
use crate::engine::SettleDelays;
use crate::naming::is_auto_generated_name;
use crate::notifier::{SpaceChangeNotifier, SpaceEvent};
use crate::oracle::{CollectionBehavior, WindowControl, WindowLevel};
use crate::registry::{WindowHandle, WindowRegistry};
use crate::scheduler::{Deferred, Scheduler};
use crate::store::{Note, NoteStore};
use crate::{NoteId, SpaceError, SpaceId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placement attempts for a note whose window appeared before any space
/// could be resolved.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 5;

/// Borrowed services for one controller call.
pub struct PlacementContext<'a> {
    pub directory: &'a SpaceDirectory,
    pub registry: &'a mut WindowRegistry,
    pub store: &'a mut dyn NoteStore,
    pub windows: &'a mut dyn WindowControl,
    pub scheduler: &'a mut Scheduler<Deferred>,
    pub notifier: &'a mut SpaceChangeNotifier,
    pub delays: &'a SettleDelays,
}

/// Whether the controller has resolved its window to a space yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    Unbound,
    Bound(SpaceId),
}

/// Pin/z-order state of a note window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Unpinned,
    Pinned,
}

impl PinState {
    fn from_flag(is_pinned: bool) -> Self {
        if is_pinned {
            PinState::Pinned
        } else {
            PinState::Unpinned
        }
    }

    /// Whether this is [`PinState::Pinned`].
    pub fn is_pinned(self) -> bool {
        self == PinState::Pinned
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Recorded space already matches; nothing was written.
    Unchanged(SpaceId),
    /// The note was moved to a new space and persisted.
    Moved {
        from: SpaceId,
        to: SpaceId,
        renamed: bool,
    },
    /// The window is no longer registered.
    WindowGone,
    /// The note record no longer exists.
    NoteMissing,
    /// Neither the window's space nor the active space could be determined.
    Unresolved,
}

/// Per-window placement and pin state.
#[derive(Debug, Clone)]
pub struct PlacementController {
    note_id: NoteId,
    state: PlacementState,
    pin: PinState,
}

impl PlacementController {
    /// Create an unbound, unpinned controller for `note_id`.
    pub fn new(note_id: NoteId) -> Self {
        Self {
            note_id,
            state: PlacementState::Unbound,
            pin: PinState::Unpinned,
        }
    }

    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn pin_state(&self) -> PinState {
        self.pin
    }

    /// Handle the window's first appearance.
    ///
    /// A note that was never placed is assigned the active space right
    /// away. The saved pin level is applied once the window has settled.
    pub fn on_window_appeared(&mut self, ctx: &mut PlacementContext<'_>) {
        let Some(window) = self.window(ctx) else {
            return;
        };
        let Some(mut note) = ctx.store.note(self.note_id) else {
            warn!("{} appeared for unknown note {}", window, self.note_id);
            return;
        };

        self.pin = PinState::from_flag(note.is_pinned);
        ctx.registry.record_pinned(self.note_id, note.is_pinned);

        if note.is_unplaced() {
            let resolved = ctx
                .directory
                .current_space_id()
                .ok()
                .or_else(|| ctx.directory.space_id_for_window(window.number()));
            match resolved {
                Some(space_id) => {
                    let renamed = assign_space(&mut note, space_id, ctx.directory);
                    note.touch();
                    ctx.store.save(&note);
                    self.bind(ctx, space_id);
                    info!("Note {} placed on space {} ({})", self.note_id, space_id, note.space_name);
                    if renamed {
                        self.publish_rename(ctx, &note);
                    }
                }
                None => {
                    warn!("Cannot place note {}: no space resolvable, retrying", self.note_id);
                    ctx.scheduler.schedule_after(
                        ctx.delays.space_change_first,
                        Deferred::Place(self.note_id, 1),
                    );
                }
            }
        } else {
            self.bind(ctx, note.space_id);
        }

        ctx.scheduler
            .schedule_after(ctx.delays.initial_pin, Deferred::ApplyPinLevel(self.note_id));
    }

    /// Retry placing a note that could not be placed when its window appeared.
    ///
    /// Gives up after [`MAX_PLACEMENT_ATTEMPTS`]; the next space switch or
    /// move re-checks the window anyway.
    pub fn retry_placement(
        &mut self,
        ctx: &mut PlacementContext<'_>,
        attempt: u32,
    ) -> ReconcileOutcome {
        let outcome = self.reconcile(ctx);
        if outcome != ReconcileOutcome::Unresolved {
            return outcome;
        }
        if attempt >= MAX_PLACEMENT_ATTEMPTS {
            warn!(
                "Giving up placing note {} after {} attempts",
                self.note_id, attempt
            );
        } else {
            ctx.scheduler.schedule_after(
                ctx.delays.space_change_second,
                Deferred::Place(self.note_id, attempt + 1),
            );
        }
        outcome
    }

    /// The active space changed: re-check after both settle delays.
    pub fn on_space_changed(&mut self, ctx: &mut PlacementContext<'_>) {
        let first = ctx.delays.space_change_first;
        let second = ctx.delays.space_change_second;
        self.schedule_reconcile(ctx, first);
        self.schedule_reconcile(ctx, second);
    }

    /// The window moved to another display: re-check immediately.
    pub fn on_screen_changed(&mut self, ctx: &mut PlacementContext<'_>) -> ReconcileOutcome {
        self.reconcile(ctx)
    }

    /// A drag or move finished: re-check after the drag settle delay.
    pub fn on_moved(&mut self, ctx: &mut PlacementContext<'_>) {
        let delay = ctx.delays.drag;
        self.schedule_reconcile(ctx, delay);
    }

    fn schedule_reconcile(&self, ctx: &mut PlacementContext<'_>, delay: Duration) {
        ctx.scheduler
            .schedule_after(delay, Deferred::Reconcile(self.note_id));
    }

    /// Bring the note's recorded space in line with where its window is.
    ///
    /// Safe to run any number of times: nothing is written unless the
    /// space actually changed, and a closed window makes this a no-op.
    pub fn reconcile(&mut self, ctx: &mut PlacementContext<'_>) -> ReconcileOutcome {
        let Some(window) = self.window(ctx) else {
            return ReconcileOutcome::WindowGone;
        };
        let Some(mut note) = ctx.store.note(self.note_id) else {
            warn!("Reconcile skipped, note {} no longer stored", self.note_id);
            return ReconcileOutcome::NoteMissing;
        };

        let actual = match ctx.directory.space_id_for_window(window.number()) {
            Some(space_id) => space_id,
            None => match ctx.directory.current_space_id() {
                Ok(space_id) => {
                    debug!("{} unresolved, assuming active space {}", window, space_id);
                    space_id
                }
                Err(e) => {
                    warn!("Cannot reconcile note {}: {}", self.note_id, e);
                    return ReconcileOutcome::Unresolved;
                }
            },
        };

        self.bind(ctx, actual);
        if note.space_id == actual {
            return ReconcileOutcome::Unchanged(actual);
        }

        let from = note.space_id;
        let renamed = assign_space(&mut note, actual, ctx.directory);
        note.touch();
        ctx.store.save(&note);
        info!(
            "Note {} moved from space {} to {} ({})",
            self.note_id, from, actual, note.space_name
        );
        if renamed {
            self.publish_rename(ctx, &note);
        }

        ReconcileOutcome::Moved {
            from,
            to: actual,
            renamed,
        }
    }

    /// Flip the pin flag, persist it and apply the matching window level.
    ///
    /// Returns the new pin flag. If the window is gone nothing changes and
    /// the current flag is returned.
    pub fn toggle_pinned(&mut self, ctx: &mut PlacementContext<'_>) -> Result<bool, SpaceError> {
        let Some(window) = self.window(ctx) else {
            warn!("Pin toggle ignored, note {} has no open window", self.note_id);
            return Ok(self.pin.is_pinned());
        };
        let mut note = ctx
            .store
            .note(self.note_id)
            .ok_or(SpaceError::NoteNotFound(self.note_id))?;

        note.is_pinned = !note.is_pinned;
        note.touch();
        ctx.store.save(&note);

        self.pin = PinState::from_flag(note.is_pinned);
        ctx.registry.record_pinned(self.note_id, note.is_pinned);
        ctx.notifier.publish(&SpaceEvent::PinToggled {
            note_id: self.note_id,
            pinned: note.is_pinned,
        });
        debug!("Note {} pinned={}", self.note_id, note.is_pinned);

        apply_level(ctx.windows, window, self.pin)?;
        Ok(note.is_pinned)
    }

    /// Set a user-chosen label for the note's space.
    pub fn update_space_name(
        &mut self,
        ctx: &mut PlacementContext<'_>,
        name: &str,
    ) -> Result<(), SpaceError> {
        let mut note = ctx
            .store
            .note(self.note_id)
            .ok_or(SpaceError::NoteNotFound(self.note_id))?;
        if note.space_name == name {
            return Ok(());
        }

        note.space_name = name.to_string();
        note.touch();
        ctx.store.save(&note);
        self.publish_rename(ctx, &note);
        Ok(())
    }

    /// Raise the window for interaction.
    ///
    /// A pinned window is lowered again after the pin-restore delay.
    pub fn activate_window(&mut self, ctx: &mut PlacementContext<'_>) -> Result<(), SpaceError> {
        let Some(window) = self.window(ctx) else {
            warn!("Activate ignored, note {} has no open window", self.note_id);
            return Ok(());
        };

        ctx.windows.set_level(window, WindowLevel::Normal)?;
        ctx.windows.make_key_and_order_front(window)?;
        ctx.windows.activate_application()?;

        if self.pin.is_pinned() {
            ctx.scheduler
                .schedule_after(ctx.delays.pin_restore, Deferred::RestorePinnedLevel(self.note_id));
        }
        Ok(())
    }

    /// Apply the level, collection behavior and ordering for the current pin state.
    pub fn apply_window_level(&mut self, ctx: &mut PlacementContext<'_>) -> Result<(), SpaceError> {
        match self.window(ctx) {
            Some(window) => apply_level(ctx.windows, window, self.pin),
            None => Ok(()),
        }
    }

    /// Re-lower a temporarily activated window if it is still pinned.
    pub fn restore_pinned_level(&mut self, ctx: &mut PlacementContext<'_>) -> Result<(), SpaceError> {
        if !self.pin.is_pinned() {
            return Ok(());
        }
        let Some(window) = self.window(ctx) else {
            return Ok(());
        };
        ctx.windows.set_level(window, WindowLevel::Pinned)?;
        ctx.windows.order_back(window)
    }

    fn bind(&mut self, ctx: &mut PlacementContext<'_>, space_id: SpaceId) {
        self.state = PlacementState::Bound(space_id);
        ctx.registry.record_space(self.note_id, space_id);
    }

    fn publish_rename(&self, ctx: &mut PlacementContext<'_>, note: &Note) {
        ctx.notifier.publish(&SpaceEvent::SpaceRenamed {
            note_id: self.note_id,
            name: note.space_name.clone(),
        });
    }

    fn window(&self, ctx: &PlacementContext<'_>) -> Option<WindowHandle> {
        let window = ctx.registry.lookup(self.note_id);
        if window.is_none() {
            debug!("No window for note {}, skipping", self.note_id);
        }
        window
    }
}

/// Move `note` to `space_id`, replacing an auto-generated name with the
/// new default. Returns true if the name changed.
fn assign_space(note: &mut Note, space_id: SpaceId, directory: &SpaceDirectory) -> bool {
    note.space_id = space_id;
    if !is_auto_generated_name(&note.space_name) {
        return false;
    }
    let name = directory.default_name(space_id);
    if name == note.space_name {
        return false;
    }
    note.space_name = name;
    true
}

fn apply_level(
    windows: &mut dyn WindowControl,
    window: WindowHandle,
    pin: PinState,
) -> Result<(), SpaceError> {
    match pin {
        PinState::Pinned => {
            windows.set_level(window, WindowLevel::Pinned)?;
            windows.set_collection_behavior(window, CollectionBehavior::Managed)?;
            windows.order_back(window)
        }
        PinState::Unpinned => {
            windows.set_level(window, WindowLevel::Normal)?;
            windows.set_collection_behavior(window, CollectionBehavior::Default)?;
            windows.order_front_regardless(window)?;
            windows.activate_application()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{RawDisplay, RawSpace};
    use crate::store::MemoryNoteStore;
    use crate::testing::{MockOracle, Ordering, RecordingWindowControl};
    use crate::UNSET_SPACE_ID;

    struct Fixture {
        oracle: MockOracle,
        directory: SpaceDirectory,
        registry: WindowRegistry,
        store: MemoryNoteStore,
        windows: RecordingWindowControl,
        scheduler: Scheduler<Deferred>,
        notifier: SpaceChangeNotifier,
        delays: SettleDelays,
    }

    impl Fixture {
        fn new() -> Self {
            let oracle = MockOracle::new(
                42,
                vec![RawDisplay::new(
                    "37D8832A",
                    vec![RawSpace::desktop(41), RawSpace::desktop(42), RawSpace::desktop(43)],
                )],
            );
            Self {
                directory: SpaceDirectory::new(Box::new(oracle.clone())),
                oracle,
                registry: WindowRegistry::new(),
                store: MemoryNoteStore::new(),
                windows: RecordingWindowControl::new(),
                scheduler: Scheduler::new(),
                notifier: SpaceChangeNotifier::new(),
                delays: SettleDelays::default(),
            }
        }

        fn ctx(&mut self) -> PlacementContext<'_> {
            PlacementContext {
                directory: &self.directory,
                registry: &mut self.registry,
                store: &mut self.store,
                windows: &mut self.windows,
                scheduler: &mut self.scheduler,
                notifier: &mut self.notifier,
                delays: &self.delays,
            }
        }

        fn open(&mut self, note: Note, window: i64) -> PlacementController {
            self.store.save(&note);
            self.registry.register(note.id, WindowHandle::new(window));
            PlacementController::new(note.id)
        }
    }

    #[test]
    fn test_unplaced_note_takes_active_space_on_appear() {
        let mut fx = Fixture::new();
        let note = Note::new();
        let mut controller = fx.open(note.clone(), 7);

        controller.on_window_appeared(&mut fx.ctx());

        let stored = fx.store.note(note.id).unwrap();
        assert_eq!(stored.space_id, 42);
        assert_eq!(stored.space_name, "Main Desktop 2");
        assert_eq!(controller.state(), PlacementState::Bound(42));
        assert_eq!(fx.registry.binding(note.id).unwrap().last_known_space_id, 42);
        // Pin level is applied after the initial delay
        assert_eq!(fx.scheduler.next_deadline(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_placed_note_binds_without_write() {
        let mut fx = Fixture::new();
        let note = Note::on_space(41, "Work");
        let mut controller = fx.open(note, 7);
        let saves = fx.store.save_count();

        controller.on_window_appeared(&mut fx.ctx());

        assert_eq!(controller.state(), PlacementState::Bound(41));
        assert_eq!(fx.store.save_count(), saves);
    }

    #[test]
    fn test_unplaced_note_with_no_space_stays_unbound() {
        let mut fx = Fixture::new();
        fx.oracle.set_available(false);
        let note = Note::new();
        let mut controller = fx.open(note.clone(), 7);

        controller.on_window_appeared(&mut fx.ctx());

        assert_eq!(controller.state(), PlacementState::Unbound);
        assert_eq!(fx.store.note(note.id).unwrap().space_id, UNSET_SPACE_ID);
        // A retry and the pin level are both queued
        assert_eq!(fx.scheduler.len(), 2);
    }

    #[test]
    fn test_reconcile_follows_window_and_renames_auto_name() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Desktop 3");
        let mut controller = fx.open(note.clone(), 7);
        fx.oracle.set_window_space(7, 43);

        let outcome = controller.reconcile(&mut fx.ctx());

        assert_eq!(
            outcome,
            ReconcileOutcome::Moved {
                from: 42,
                to: 43,
                renamed: true
            }
        );
        let stored = fx.store.note(note.id).unwrap();
        assert_eq!(stored.space_id, 43);
        assert_eq!(stored.space_name, "Main Desktop 3");
    }

    #[test]
    fn test_reconcile_keeps_user_name() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Focus Zone");
        let mut controller = fx.open(note.clone(), 7);
        fx.oracle.set_window_space(7, 43);

        controller.reconcile(&mut fx.ctx());

        let stored = fx.store.note(note.id).unwrap();
        assert_eq!(stored.space_id, 43);
        assert_eq!(stored.space_name, "Focus Zone");
    }

    #[test]
    fn test_reconcile_falls_back_to_active_space() {
        let mut fx = Fixture::new();
        let note = Note::on_space(41, "Main Desktop 1");
        let mut controller = fx.open(note.clone(), 7);
        fx.oracle.set_window_space(7, 41);
        assert_eq!(controller.reconcile(&mut fx.ctx()), ReconcileOutcome::Unchanged(41));

        // The window server loses track of the window mid-transition
        fx.oracle.clear_window_space(7);
        fx.oracle.set_current_space(43);
        let outcome = controller.reconcile(&mut fx.ctx());

        assert!(matches!(outcome, ReconcileOutcome::Moved { to: 43, .. }));
    }

    #[test]
    fn test_reconcile_twice_writes_once() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note, 7);
        fx.oracle.set_window_space(7, 43);
        let saves = fx.store.save_count();

        controller.reconcile(&mut fx.ctx());
        assert_eq!(controller.reconcile(&mut fx.ctx()), ReconcileOutcome::Unchanged(43));

        assert_eq!(fx.store.save_count(), saves + 1);
    }

    #[test]
    fn test_reconcile_unresolved_when_oracle_offline() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note, 7);
        fx.oracle.set_available(false);
        let saves = fx.store.save_count();

        assert_eq!(controller.reconcile(&mut fx.ctx()), ReconcileOutcome::Unresolved);
        assert_eq!(fx.store.save_count(), saves);
    }

    #[test]
    fn test_reconcile_after_close_is_noop() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note.clone(), 7);
        fx.registry.unregister(note.id);

        assert_eq!(controller.reconcile(&mut fx.ctx()), ReconcileOutcome::WindowGone);
    }

    #[test]
    fn test_space_change_schedules_two_rechecks() {
        let mut fx = Fixture::new();
        let mut controller = fx.open(Note::on_space(42, "x"), 7);

        controller.on_space_changed(&mut fx.ctx());
        controller.on_moved(&mut fx.ctx());

        assert_eq!(fx.scheduler.len(), 3);
        let mut due = Vec::new();
        for ms in [100, 300, 500] {
            fx.scheduler.set_now(Duration::from_millis(ms));
            due.push(fx.scheduler.pop_due());
        }
        assert!(due.iter().all(|task| *task == Some(Deferred::Reconcile(controller.note_id()))));
    }

    #[test]
    fn test_toggle_pin_round_trip() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note.clone(), 7);
        let window = WindowHandle::new(7);

        assert_eq!(controller.toggle_pinned(&mut fx.ctx()), Ok(true));
        assert!(fx.store.note(note.id).unwrap().is_pinned);
        assert_eq!(fx.windows.level(window), Some(WindowLevel::Pinned));
        assert_eq!(fx.windows.collection_behavior(window), Some(CollectionBehavior::Managed));
        assert_eq!(fx.windows.ordering(window), Some(Ordering::Back));
        assert!(fx.registry.binding(note.id).unwrap().is_pinned);

        assert_eq!(controller.toggle_pinned(&mut fx.ctx()), Ok(false));
        assert!(!fx.store.note(note.id).unwrap().is_pinned);
        assert_eq!(fx.windows.level(window), Some(WindowLevel::Normal));
        assert_eq!(fx.windows.collection_behavior(window), Some(CollectionBehavior::Default));
        assert_eq!(fx.windows.ordering(window), Some(Ordering::Front));
        assert_eq!(fx.windows.activations(), 1);
    }

    #[test]
    fn test_toggle_pin_on_closed_window_leaves_store_untouched() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note.clone(), 7);
        fx.registry.unregister(note.id);
        let saves = fx.store.save_count();

        assert_eq!(controller.toggle_pinned(&mut fx.ctx()), Ok(false));
        assert_eq!(fx.store.save_count(), saves);
        assert!(!fx.store.note(note.id).unwrap().is_pinned);
        assert_eq!(controller.pin_state(), PinState::Unpinned);
        assert!(fx.windows.calls().is_empty());
    }

    #[test]
    fn test_window_calls_on_closed_window_are_noops() {
        let mut fx = Fixture::new();
        let mut note = Note::on_space(42, "Main Desktop 2");
        note.is_pinned = true;
        let mut controller = fx.open(note.clone(), 7);
        controller.on_window_appeared(&mut fx.ctx());
        controller.apply_window_level(&mut fx.ctx()).unwrap();
        assert!(!fx.windows.calls().is_empty());
        fx.windows.clear_calls();
        fx.registry.unregister(note.id);

        assert_eq!(controller.activate_window(&mut fx.ctx()), Ok(()));
        assert_eq!(controller.apply_window_level(&mut fx.ctx()), Ok(()));
        assert_eq!(controller.restore_pinned_level(&mut fx.ctx()), Ok(()));

        assert!(fx.windows.calls().is_empty());
        assert_eq!(fx.windows.activations(), 0);
    }

    #[test]
    fn test_unplaced_note_placed_when_retry_resolves() {
        let mut fx = Fixture::new();
        fx.oracle.set_available(false);
        let note = Note::new();
        let mut controller = fx.open(note.clone(), 7);
        controller.on_window_appeared(&mut fx.ctx());

        fx.oracle.set_available(true);
        fx.oracle.set_window_space(7, 43);
        fx.scheduler.set_now(Duration::from_millis(100));
        assert_eq!(fx.scheduler.pop_due(), Some(Deferred::Place(note.id, 1)));
        let outcome = controller.retry_placement(&mut fx.ctx(), 1);

        assert_eq!(
            outcome,
            ReconcileOutcome::Moved {
                from: UNSET_SPACE_ID,
                to: 43,
                renamed: true
            }
        );
        let stored = fx.store.note(note.id).unwrap();
        assert_eq!(stored.space_id, 43);
        assert_eq!(stored.space_name, "Main Desktop 3");
        assert_eq!(controller.state(), PlacementState::Bound(43));

        assert_eq!(fx.scheduler.pop_due(), Some(Deferred::ApplyPinLevel(note.id)));
        controller.apply_window_level(&mut fx.ctx()).unwrap();
        assert_eq!(fx.windows.level(WindowHandle::new(7)), Some(WindowLevel::Normal));
        assert!(fx.scheduler.is_empty());
    }

    #[test]
    fn test_placement_retries_are_bounded() {
        let mut fx = Fixture::new();
        fx.oracle.set_available(false);
        let note = Note::new();
        let mut controller = fx.open(note.clone(), 7);

        for attempt in 1..MAX_PLACEMENT_ATTEMPTS {
            assert_eq!(
                controller.retry_placement(&mut fx.ctx(), attempt),
                ReconcileOutcome::Unresolved
            );
            assert_eq!(fx.scheduler.len(), attempt as usize);
        }
        controller.retry_placement(&mut fx.ctx(), MAX_PLACEMENT_ATTEMPTS);

        assert_eq!(fx.scheduler.len(), (MAX_PLACEMENT_ATTEMPTS - 1) as usize);
        assert!(fx.store.note(note.id).unwrap().is_unplaced());
    }

    #[test]
    fn test_activate_pinned_window_schedules_restore() {
        let mut fx = Fixture::new();
        let mut note = Note::on_space(42, "Main Desktop 2");
        note.is_pinned = true;
        let mut controller = fx.open(note.clone(), 7);
        controller.on_window_appeared(&mut fx.ctx());
        let window = WindowHandle::new(7);

        controller.activate_window(&mut fx.ctx()).unwrap();
        assert_eq!(fx.windows.level(window), Some(WindowLevel::Normal));
        assert_eq!(fx.windows.ordering(window), Some(Ordering::Front));

        controller.restore_pinned_level(&mut fx.ctx()).unwrap();
        assert_eq!(fx.windows.level(window), Some(WindowLevel::Pinned));
        assert_eq!(fx.windows.ordering(window), Some(Ordering::Back));
    }

    #[test]
    fn test_activate_unpinned_window_schedules_nothing() {
        let mut fx = Fixture::new();
        let mut controller = fx.open(Note::on_space(42, "x"), 7);

        controller.activate_window(&mut fx.ctx()).unwrap();

        assert!(fx.scheduler.is_empty());
        assert_eq!(fx.windows.activations(), 1);
    }

    #[test]
    fn test_update_space_name_publishes_rename() {
        let mut fx = Fixture::new();
        let note = Note::on_space(42, "Main Desktop 2");
        let mut controller = fx.open(note.clone(), 7);
        let renamed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&renamed);
        fx.notifier.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        controller.update_space_name(&mut fx.ctx(), "Work").unwrap();
        // Same name again is not a write
        let saves = fx.store.save_count();
        controller.update_space_name(&mut fx.ctx(), "Work").unwrap();

        assert_eq!(fx.store.save_count(), saves);
        assert_eq!(fx.store.note(note.id).unwrap().space_name, "Work");
        assert_eq!(
            renamed.borrow().as_slice(),
            &[SpaceEvent::SpaceRenamed {
                note_id: note.id,
                name: "Work".to_string()
            }]
        );
    }
}
