//! Test doubles for the capability traits.
//!
//! All doubles are cheap to clone and share their state, so a test can
//! keep one handle while the engine owns the other.

use crate::oracle::{CollectionBehavior, RawTopology, SpaceOracle, WindowControl, WindowLevel};
use crate::registry::WindowHandle;
use crate::store::{MemoryNoteStore, Note, NoteStore};
use crate::{NoteId, SpaceError, SpaceId, WindowNumber};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct OracleState {
    current: SpaceId,
    topology: RawTopology,
    available: bool,
    windows: HashMap<WindowNumber, SpaceId>,
}

/// Scriptable [`SpaceOracle`].
#[derive(Debug, Clone)]
pub struct MockOracle {
    state: Arc<Mutex<OracleState>>,
}

impl MockOracle {
    /// Oracle reporting `current` as active and `topology` as the layout.
    pub fn new(current: SpaceId, topology: RawTopology) -> Self {
        Self {
            state: Arc::new(Mutex::new(OracleState {
                current,
                topology,
                available: true,
                windows: HashMap::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, OracleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_current_space(&self, space_id: SpaceId) {
        self.state().current = space_id;
    }

    pub fn set_topology(&self, topology: RawTopology) {
        self.state().topology = topology;
    }

    /// When false, every query fails with `QueryUnavailable` and no window resolves.
    pub fn set_available(&self, available: bool) {
        self.state().available = available;
    }

    pub fn set_window_space(&self, window: WindowNumber, space_id: SpaceId) {
        self.state().windows.insert(window, space_id);
    }

    pub fn clear_window_space(&self, window: WindowNumber) {
        self.state().windows.remove(&window);
    }
}

impl SpaceOracle for MockOracle {
    fn current_active_space_id(&self) -> Result<SpaceId, SpaceError> {
        let state = self.state();
        if !state.available {
            return Err(SpaceError::unavailable("mock oracle offline"));
        }
        Ok(state.current)
    }

    fn enumerate_displays_and_spaces(&self) -> Result<RawTopology, SpaceError> {
        let state = self.state();
        if !state.available {
            return Err(SpaceError::unavailable("mock oracle offline"));
        }
        Ok(state.topology.clone())
    }

    fn space_id_for_window(&self, window: WindowNumber) -> Option<SpaceId> {
        let state = self.state();
        if !state.available {
            return None;
        }
        state.windows.get(&window).copied()
    }
}

/// One call made against a [`RecordingWindowControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCall {
    SetLevel(WindowHandle, WindowLevel),
    SetCollectionBehavior(WindowHandle, CollectionBehavior),
    OrderBack(WindowHandle),
    OrderFrontRegardless(WindowHandle),
    MakeKeyAndOrderFront(WindowHandle),
    ActivateApplication,
}

/// Where a window was last ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Back,
    Front,
}

#[derive(Debug, Default)]
struct ControlState {
    calls: Vec<WindowCall>,
    levels: HashMap<WindowHandle, WindowLevel>,
    behaviors: HashMap<WindowHandle, CollectionBehavior>,
    ordering: HashMap<WindowHandle, Ordering>,
    activations: usize,
}

/// [`WindowControl`] that records every call and tracks resulting window state.
#[derive(Debug, Clone, Default)]
pub struct RecordingWindowControl {
    state: Arc<Mutex<ControlState>>,
}

impl RecordingWindowControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<WindowCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls, keeping window state.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn level(&self, window: WindowHandle) -> Option<WindowLevel> {
        self.state().levels.get(&window).copied()
    }

    pub fn collection_behavior(&self, window: WindowHandle) -> Option<CollectionBehavior> {
        self.state().behaviors.get(&window).copied()
    }

    pub fn ordering(&self, window: WindowHandle) -> Option<Ordering> {
        self.state().ordering.get(&window).copied()
    }

    pub fn activations(&self) -> usize {
        self.state().activations
    }
}

impl WindowControl for RecordingWindowControl {
    fn set_level(&mut self, window: WindowHandle, level: WindowLevel) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::SetLevel(window, level));
        state.levels.insert(window, level);
        Ok(())
    }

    fn set_collection_behavior(
        &mut self,
        window: WindowHandle,
        behavior: CollectionBehavior,
    ) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::SetCollectionBehavior(window, behavior));
        state.behaviors.insert(window, behavior);
        Ok(())
    }

    fn order_back(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::OrderBack(window));
        state.ordering.insert(window, Ordering::Back);
        Ok(())
    }

    fn order_front_regardless(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::OrderFrontRegardless(window));
        state.ordering.insert(window, Ordering::Front);
        Ok(())
    }

    fn make_key_and_order_front(&mut self, window: WindowHandle) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::MakeKeyAndOrderFront(window));
        state.ordering.insert(window, Ordering::Front);
        Ok(())
    }

    fn activate_application(&mut self) -> Result<(), SpaceError> {
        let mut state = self.state();
        state.calls.push(WindowCall::ActivateApplication);
        state.activations += 1;
        Ok(())
    }
}

/// [`MemoryNoteStore`] behind a shared handle, for inspecting an engine-owned store.
#[derive(Debug, Clone, Default)]
pub struct SharedNoteStore {
    inner: Arc<Mutex<MemoryNoteStore>>,
}

impl SharedNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryNoteStore::with_notes(notes))),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MemoryNoteStore> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn save_count(&self) -> usize {
        self.inner().save_count()
    }
}

impl NoteStore for SharedNoteStore {
    fn save(&mut self, note: &Note) {
        self.inner().save(note);
    }

    fn delete(&mut self, id: NoteId) {
        self.inner().delete(id);
    }

    fn note(&self, id: NoteId) -> Option<Note> {
        self.inner().note(id)
    }

    fn notes_for_space(&self, space_id: SpaceId) -> Vec<Note> {
        self.inner().notes_for_space(space_id)
    }

    fn all(&self) -> Vec<Note> {
        self.inner().all()
    }
}
