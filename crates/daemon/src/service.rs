//! Engine host.
//!
//! Owns the [`SpaceEngine`] and translates between it and the IPC protocol:
//! - Incoming [`IpcCommand`]s become engine calls
//! - Window operations become [`WindowDirective`]s queued for the UI process
//! - Engine events are buffered as [`IpcEvent`]s until a client polls

use spacenotes_core::{
    naming, CollectionBehavior, EngineEvent, Note, NoteStore, SettleDelays, SpaceEngine,
    SpaceError, SpaceEvent, SpaceOracle, SpaceTopologySnapshot, WindowControl, WindowHandle,
    WindowLevel, FALLBACK_SPACE_NAME,
};
use spacenotes_ipc::{
    DesktopInfo, DisplayInfo, IpcCommand, IpcEvent, IpcResponse, NoteInfo, WindowDirective,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Queued items kept while no client polls. Oldest entries are dropped first.
const MAX_PENDING: usize = 1024;

/// Bounded FIFO shared between the engine side and the poll handler.
#[derive(Debug)]
struct Outbox<T> {
    items: Rc<RefCell<VecDeque<T>>>,
    label: &'static str,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
            label: self.label,
        }
    }
}

impl<T> Outbox<T> {
    fn new(label: &'static str) -> Self {
        Self {
            items: Rc::new(RefCell::new(VecDeque::new())),
            label,
        }
    }

    fn push(&self, item: T) {
        let mut items = self.items.borrow_mut();
        if items.len() >= MAX_PENDING {
            items.pop_front();
            warn!("No client is polling; dropped oldest pending {}", self.label);
        }
        items.push_back(item);
    }

    fn drain(&self) -> Vec<T> {
        self.items.borrow_mut().drain(..).collect()
    }

    fn len(&self) -> usize {
        self.items.borrow().len()
    }
}

/// [`WindowControl`] that queues every operation as a [`WindowDirective`].
///
/// Note windows live in the UI process, which drains the queue with `poll`.
#[derive(Debug, Clone)]
pub struct DirectiveQueue {
    outbox: Outbox<WindowDirective>,
}

impl DirectiveQueue {
    pub fn new() -> Self {
        Self {
            outbox: Outbox::new("window directive"),
        }
    }

    /// Take every queued directive, oldest first.
    pub fn drain(&self) -> Vec<WindowDirective> {
        self.outbox.drain()
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DirectiveQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowControl for DirectiveQueue {
    fn set_level(&mut self, window: WindowHandle, level: WindowLevel) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::SetLevel {
            window_number: window.number(),
            level_offset: level.offset_from_normal(),
        });
        Ok(())
    }

    fn set_collection_behavior(
        &mut self,
        window: WindowHandle,
        behavior: CollectionBehavior,
    ) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::SetCollectionBehavior {
            window_number: window.number(),
            managed: behavior == CollectionBehavior::Managed,
        });
        Ok(())
    }

    fn order_back(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::OrderBack {
            window_number: window.number(),
        });
        Ok(())
    }

    fn order_front_regardless(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::OrderFrontRegardless {
            window_number: window.number(),
        });
        Ok(())
    }

    fn make_key_and_order_front(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::MakeKeyAndOrderFront {
            window_number: window.number(),
        });
        Ok(())
    }

    fn activate_application(&mut self) -> Result<(), SpaceError> {
        self.outbox.push(WindowDirective::ActivateApplication);
        Ok(())
    }
}

fn ipc_event(event: &SpaceEvent) -> IpcEvent {
    match event {
        SpaceEvent::SpaceChanged(space_id) => IpcEvent::SpaceChanged {
            space_id: *space_id,
        },
        SpaceEvent::PinToggled { note_id, pinned } => IpcEvent::PinToggled {
            note_id: *note_id,
            pinned: *pinned,
        },
        SpaceEvent::SpaceRenamed { note_id, name } => IpcEvent::SpaceRenamed {
            note_id: *note_id,
            name: name.clone(),
        },
    }
}

fn note_info(note: &Note) -> NoteInfo {
    NoteInfo {
        id: note.id,
        space_id: note.space_id,
        space_name: note.space_name.clone(),
        is_pinned: note.is_pinned,
        background_color: note.background_color.clone(),
        updated_at: note.updated_at,
    }
}

fn display_infos(snapshot: &SpaceTopologySnapshot, current: Option<i64>) -> Vec<DisplayInfo> {
    snapshot
        .displays
        .iter()
        .map(|entry| DisplayInfo {
            identifier: entry.display.identifier.clone(),
            name: naming::display_name(&entry.display),
            is_primary: entry.display.is_primary,
            desktops: entry
                .desktops
                .iter()
                .map(|space| DesktopInfo {
                    space_id: space.space_id,
                    index: space.index_on_display,
                    name: naming::desktop_name(space),
                    is_current: current == Some(space.space_id),
                })
                .collect(),
            fullscreen: entry.fullscreen.iter().map(|f| f.space_id).collect(),
        })
        .collect()
}

fn error_response(err: SpaceError) -> IpcResponse {
    IpcResponse::error(err.to_string())
}

/// The engine plus the queues that carry its output to UI clients.
pub struct NoteService {
    engine: SpaceEngine,
    directives: DirectiveQueue,
    events: Outbox<IpcEvent>,
}

impl NoteService {
    /// Build the engine around `oracle` and `store`.
    pub fn new(
        oracle: Box<dyn SpaceOracle>,
        store: Box<dyn NoteStore>,
        delays: SettleDelays,
    ) -> Self {
        let directives = DirectiveQueue::new();
        let events = Outbox::new("event");
        let mut engine = SpaceEngine::new(oracle, store, Box::new(directives.clone()), delays);

        let sink = events.clone();
        engine.subscribe(move |event| sink.push(ipc_event(event)));

        Self {
            engine,
            directives,
            events,
        }
    }

    pub fn engine(&self) -> &SpaceEngine {
        &self.engine
    }

    /// Virtual time of the next deferred re-check, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.engine.next_deadline()
    }

    /// Run every deferred task due at `elapsed` since startup.
    pub fn advance_to(&mut self, elapsed: Duration) {
        self.engine.advance_to(elapsed);
    }

    /// The OS reported a desktop switch.
    pub fn space_switched(&mut self) {
        let _ = self.engine.handle(EngineEvent::SpaceSwitched);
    }

    /// Execute one IPC command.
    pub fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        debug!("Handling {:?}", cmd);
        match cmd {
            IpcCommand::WindowCreated {
                note_id,
                window_number,
            } => self.dispatch(EngineEvent::WindowCreated {
                note_id,
                window: WindowHandle::new(window_number),
            }),
            IpcCommand::WindowClosed { note_id } => {
                self.dispatch(EngineEvent::WindowClosed { note_id })
            }
            IpcCommand::WindowChangedScreen { note_id } => {
                self.dispatch(EngineEvent::WindowChangedScreen { note_id })
            }
            IpcCommand::WindowMoved { note_id } => {
                self.dispatch(EngineEvent::WindowMoved { note_id })
            }

            IpcCommand::TogglePin { note_id } => match self.engine.toggle_pin(note_id) {
                Ok(pinned) => IpcResponse::Pinned { note_id, pinned },
                Err(e) => error_response(e),
            },
            IpcCommand::RenameSpace { note_id, name } => {
                self.dispatch(EngineEvent::RenameSpace { note_id, name })
            }
            IpcCommand::Activate { note_id } => self.dispatch(EngineEvent::Activate { note_id }),

            IpcCommand::CreateNote { space_id } => {
                let note = self.engine.create_note(space_id);
                IpcResponse::Note {
                    note: note_info(&note),
                }
            }
            IpcCommand::DeleteNote { note_id } => {
                if self.engine.delete_note(note_id) {
                    IpcResponse::Ok
                } else {
                    error_response(SpaceError::NoteNotFound(note_id))
                }
            }
            IpcCommand::OpenNote { note_id } => match self.engine.open_note(note_id) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => error_response(e),
            },
            IpcCommand::ListNotes { space_id } => IpcResponse::Notes {
                notes: self.engine.notes(space_id).iter().map(note_info).collect(),
            },

            IpcCommand::QuerySpaces => self.query_spaces(),
            IpcCommand::QueryCurrentSpace => self.query_current_space(),

            IpcCommand::Poll => IpcResponse::Updates {
                directives: self.directives.drain(),
                events: self.events.drain(),
            },
            IpcCommand::Stop => IpcResponse::Ok,
        }
    }

    fn dispatch(&mut self, event: EngineEvent) -> IpcResponse {
        match self.engine.handle(event) {
            Ok(()) => IpcResponse::Ok,
            Err(e) => error_response(e),
        }
    }

    fn query_spaces(&self) -> IpcResponse {
        let directory = self.engine.directory();
        let current = directory.current_space_id().ok();
        match directory.cached_topology() {
            Ok(snapshot) => IpcResponse::Spaces {
                displays: display_infos(&snapshot, current),
            },
            Err(e) => error_response(e),
        }
    }

    fn query_current_space(&self) -> IpcResponse {
        let directory = self.engine.directory();
        match directory.current_space_id() {
            Ok(space_id) => IpcResponse::CurrentSpace {
                space_id: Some(space_id),
                name: directory.default_name(space_id),
            },
            Err(e) => {
                warn!("Current space unavailable: {}", e);
                IpcResponse::CurrentSpace {
                    space_id: None,
                    name: FALLBACK_SPACE_NAME.to_string(),
                }
            }
        }
    }
}
