//! Space Engine
//!
//! Owns the directory, notifier, registry, one placement controller per
//! open window, the deferred-task scheduler and the injected store and
//! window control. Every state change goes through [`SpaceEngine::handle`]
//! or one of the note lifecycle methods, on a single owner.

use crate::directory::SpaceDirectory;
use crate::naming::FALLBACK_SPACE_NAME;
use crate::notifier::{SpaceChangeNotifier, SpaceEvent, SubscriptionId};
use crate::oracle::{SpaceOracle, WindowControl};
use crate::placement::{PlacementContext, PlacementController};
use crate::registry::{WindowHandle, WindowRegistry};
use crate::scheduler::{Deferred, Scheduler};
use crate::store::{Note, NoteStore, PRESET_COLORS};
use crate::{NoteId, SpaceError, SpaceId, UNSET_SPACE_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delays before re-checking a window's space after OS events.
///
/// Space membership of a freshly moved window is not immediately
/// queryable, so re-checks wait for the window server to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    /// First re-check after a space switch.
    pub space_change_first: Duration,
    /// Second, later re-check after a space switch.
    pub space_change_second: Duration,
    /// Re-check after a drag or move finishes.
    pub drag: Duration,
    /// Re-lower a pinned window this long after a temporary activation.
    pub pin_restore: Duration,
    /// Apply the saved pin level this long after a window first appears.
    pub initial_pin: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            space_change_first: Duration::from_millis(100),
            space_change_second: Duration::from_millis(500),
            drag: Duration::from_millis(300),
            pin_restore: Duration::from_millis(100),
            initial_pin: Duration::from_millis(100),
        }
    }
}

/// Inputs to the engine from the OS and the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A note window was realized on screen.
    WindowCreated { note_id: NoteId, window: WindowHandle },
    /// A note window was closed or destroyed.
    WindowClosed { note_id: NoteId },
    /// A note window moved to a different display.
    WindowChangedScreen { note_id: NoteId },
    /// A note window finished a drag or move.
    WindowMoved { note_id: NoteId },
    /// The OS reported a desktop switch.
    SpaceSwitched,
    /// The user toggled a note's pin.
    TogglePin { note_id: NoteId },
    /// The user typed a new label for a note's space.
    RenameSpace { note_id: NoteId, name: String },
    /// The user clicked a note's header.
    Activate { note_id: NoteId },
}

/// The space-aware window state engine.
pub struct SpaceEngine {
    directory: SpaceDirectory,
    notifier: SpaceChangeNotifier,
    registry: WindowRegistry,
    controllers: HashMap<NoteId, PlacementController>,
    scheduler: Scheduler<Deferred>,
    store: Box<dyn NoteStore>,
    windows: Box<dyn WindowControl>,
    delays: SettleDelays,
}

impl SpaceEngine {
    /// Create an engine from its injected services.
    pub fn new(
        oracle: Box<dyn SpaceOracle>,
        store: Box<dyn NoteStore>,
        windows: Box<dyn WindowControl>,
        delays: SettleDelays,
    ) -> Self {
        Self {
            directory: SpaceDirectory::new(oracle),
            notifier: SpaceChangeNotifier::new(),
            registry: WindowRegistry::new(),
            controllers: HashMap::new(),
            scheduler: Scheduler::new(),
            store,
            windows,
            delays,
        }
    }

    pub fn directory(&self) -> &SpaceDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn controller(&self, note_id: NoteId) -> Option<&PlacementController> {
        self.controllers.get(&note_id)
    }

    pub fn delays(&self) -> SettleDelays {
        self.delays
    }

    /// Register a callback for engine events.
    pub fn subscribe(&mut self, callback: impl FnMut(&SpaceEvent) + 'static) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Apply one event.
    ///
    /// Events for a note without an open window are logged and ignored.
    /// Errors are informational: a missing note leaves all state unchanged.
    pub fn handle(&mut self, event: EngineEvent) -> Result<(), SpaceError> {
        match event {
            EngineEvent::WindowCreated { note_id, window } => {
                self.window_created(note_id, window);
                Ok(())
            }
            EngineEvent::WindowClosed { note_id } => {
                self.window_closed(note_id);
                Ok(())
            }
            EngineEvent::WindowChangedScreen { note_id } => skip_unresolved(
                self.with_controller(note_id, |controller, ctx| {
                    controller.on_screen_changed(ctx);
                }),
                (),
            ),
            EngineEvent::WindowMoved { note_id } => skip_unresolved(
                self.with_controller(note_id, |controller, ctx| controller.on_moved(ctx)),
                (),
            ),
            EngineEvent::SpaceSwitched => {
                self.space_switched();
                Ok(())
            }
            EngineEvent::TogglePin { note_id } => self.toggle_pin(note_id).map(|_| ()),
            EngineEvent::RenameSpace { note_id, name } => self.rename_space(note_id, &name),
            EngineEvent::Activate { note_id } => skip_unresolved(
                self.with_controller(note_id, |controller, ctx| controller.activate_window(ctx))
                    .and_then(|result| result),
                (),
            ),
        }
    }

    fn window_created(&mut self, note_id: NoteId, window: WindowHandle) {
        debug!("{} created for note {}", window, note_id);
        self.registry.register(note_id, window);
        // Drop controllers whose binding the registry just evicted
        let registry = &self.registry;
        self.controllers
            .retain(|id, _| *id == note_id || registry.lookup(*id).is_some());
        self.controllers
            .insert(note_id, PlacementController::new(note_id));

        // The closure cannot fail once the controller is inserted
        let _ = self.with_controller(note_id, |controller, ctx| {
            controller.on_window_appeared(ctx);
        });
    }

    fn window_closed(&mut self, note_id: NoteId) {
        match self.registry.unregister(note_id) {
            Some(binding) => debug!("{} closed for note {}", binding.window, note_id),
            None => debug!("Close for note {} without a registered window", note_id),
        }
        self.controllers.remove(&note_id);
    }

    fn space_switched(&mut self) {
        // Controllers re-check even when the active space could not be read
        let _ = self.notifier.handle_space_switch(&self.directory);
        let ids: Vec<NoteId> = self.registry.note_ids().collect();
        for note_id in ids {
            let _ = self.with_controller(note_id, |controller, ctx| controller.on_space_changed(ctx));
        }
    }

    /// Toggle a note's pin. Returns the new pin flag.
    ///
    /// Without an open window nothing changes and the stored flag is returned.
    pub fn toggle_pin(&mut self, note_id: NoteId) -> Result<bool, SpaceError> {
        let note = self
            .store
            .note(note_id)
            .ok_or(SpaceError::NoteNotFound(note_id))?;
        skip_unresolved(
            self.with_controller(note_id, |controller, ctx| controller.toggle_pinned(ctx))
                .and_then(|result| result),
            note.is_pinned,
        )
    }

    /// Set a user label on a note's space. Works whether or not the note is open.
    pub fn rename_space(&mut self, note_id: NoteId, name: &str) -> Result<(), SpaceError> {
        if !self.controllers.contains_key(&note_id) {
            let mut detached = PlacementController::new(note_id);
            let mut ctx = self.context();
            return detached.update_space_name(&mut ctx, name);
        }
        self.with_controller(note_id, |controller, ctx| controller.update_space_name(ctx, name))?
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Virtual time of the next deferred task, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Number of deferred tasks still queued.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Advance virtual time to `now` and run every task that became due.
    pub fn advance_to(&mut self, now: Duration) {
        self.scheduler.set_now(now);
        while let Some(task) = self.scheduler.pop_due() {
            self.run_deferred(task);
        }
    }

    /// Advance virtual time by `delta`.
    pub fn advance_by(&mut self, delta: Duration) {
        let now = self.scheduler.now() + delta;
        self.advance_to(now);
    }

    fn run_deferred(&mut self, task: Deferred) {
        let note_id = task.note_id();
        let result = self.with_controller(note_id, |controller, ctx| match task {
            Deferred::Reconcile(_) => {
                controller.reconcile(ctx);
                Ok(())
            }
            Deferred::Place(_, attempt) => {
                controller.retry_placement(ctx, attempt);
                Ok(())
            }
            Deferred::RestorePinnedLevel(_) => controller.restore_pinned_level(ctx),
            Deferred::ApplyPinLevel(_) => controller.apply_window_level(ctx),
        });
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) | Err(e) => debug!("Deferred {:?} absorbed: {}", task, e),
        }
    }

    /// Create and persist a new note.
    ///
    /// Without an explicit space the note goes to the active one. If that
    /// cannot be read the note stays unplaced until its window appears.
    pub fn create_note(&mut self, space_id: Option<SpaceId>) -> Note {
        let space_id = match space_id {
            Some(id) => id,
            None => self.directory.current_space_id().unwrap_or_else(|e| {
                warn!("Creating unplaced note: {}", e);
                UNSET_SPACE_ID
            }),
        };

        let mut note = Note::new();
        note.space_id = space_id;
        note.space_name = if space_id == UNSET_SPACE_ID {
            FALLBACK_SPACE_NAME.to_string()
        } else {
            self.directory.default_name(space_id)
        };
        note.background_color = preset_color_for(note.id).to_string();
        self.store.save(&note);
        info!("Created note {} on space {} ({})", note.id, note.space_id, note.space_name);
        note
    }

    /// Delete a note and forget any window showing it. Returns false if it did not exist.
    pub fn delete_note(&mut self, note_id: NoteId) -> bool {
        let existed = self.store.note(note_id).is_some();
        self.store.delete(note_id);
        self.window_closed(note_id);
        if existed {
            info!("Deleted note {}", note_id);
        }
        existed
    }

    /// Bring a note's window forward so the OS switches to its desktop.
    ///
    /// A note without an open window is logged and left alone.
    pub fn open_note(&mut self, note_id: NoteId) -> Result<(), SpaceError> {
        if self.store.note(note_id).is_none() {
            warn!("Cannot open unknown note {}", note_id);
            return Err(SpaceError::NoteNotFound(note_id));
        }
        skip_unresolved(
            self.with_controller(note_id, |controller, ctx| controller.activate_window(ctx))
                .and_then(|result| result),
            (),
        )
    }

    /// Notes on `space_id`, or all notes when `None`.
    pub fn notes(&self, space_id: Option<SpaceId>) -> Vec<Note> {
        match space_id {
            Some(id) => self.store.notes_for_space(id),
            None => self.store.all(),
        }
    }

    pub fn note(&self, note_id: NoteId) -> Option<Note> {
        self.store.note(note_id)
    }

    fn context(&mut self) -> PlacementContext<'_> {
        PlacementContext {
            directory: &self.directory,
            registry: &mut self.registry,
            store: &mut *self.store,
            windows: &mut *self.windows,
            scheduler: &mut self.scheduler,
            notifier: &mut self.notifier,
            delays: &self.delays,
        }
    }

    /// Run `f` on the controller for `note_id`.
    ///
    /// A missing controller means the window is closed: logged and
    /// reported as `WindowUnresolved`.
    fn with_controller<R>(
        &mut self,
        note_id: NoteId,
        f: impl FnOnce(&mut PlacementController, &mut PlacementContext<'_>) -> R,
    ) -> Result<R, SpaceError> {
        let Self {
            directory,
            notifier,
            registry,
            controllers,
            scheduler,
            store,
            windows,
            delays,
        } = self;

        let Some(controller) = controllers.get_mut(&note_id) else {
            debug!("No open window for note {}", note_id);
            return Err(SpaceError::WindowUnresolved(note_id));
        };
        let mut ctx = PlacementContext {
            directory,
            registry,
            store: &mut **store,
            windows: &mut **windows,
            scheduler,
            notifier,
            delays,
        };
        Ok(f(controller, &mut ctx))
    }
}

/// Turn a missing window into a logged no-op returning `fallback`.
fn skip_unresolved<R>(result: Result<R, SpaceError>, fallback: R) -> Result<R, SpaceError> {
    match result {
        Err(SpaceError::WindowUnresolved(note_id)) => {
            warn!("No open window for note {}, ignoring", note_id);
            Ok(fallback)
        }
        other => other,
    }
}

/// Pick a preset background color from the note id's random bits.
fn preset_color_for(note_id: NoteId) -> &'static str {
    let index = note_id.as_bytes()[15] as usize % PRESET_COLORS.len();
    PRESET_COLORS[index].1
}
