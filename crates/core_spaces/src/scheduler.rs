//! Delayed-task queue driven by virtual time.
//!
//! The engine never sleeps. Deferred work is pushed here with a delay and
//! the host advances the clock: the daemon maps it onto tokio timers, tests
//! step it by hand.

use crate::NoteId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Work the engine defers until after a settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Re-check which space the note's window is on.
    Reconcile(NoteId),
    /// Retry placing an unplaced note; carries the attempt number.
    Place(NoteId, u32),
    /// Re-lower a pinned window after a temporary activation.
    RestorePinnedLevel(NoteId),
    /// Apply the note's saved pin level once its window has settled.
    ApplyPinLevel(NoteId),
}

impl Deferred {
    /// The note this task belongs to.
    pub fn note_id(&self) -> NoteId {
        match *self {
            Deferred::Reconcile(id)
            | Deferred::Place(id, _)
            | Deferred::RestorePinnedLevel(id)
            | Deferred::ApplyPinLevel(id) => id,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    due: Duration,
    /// Insertion order, so tasks due at the same instant run FIFO.
    seq: u64,
}

/// Min-heap of tasks keyed by virtual due time.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_seq: u64,
    heap: BinaryHeap<Reverse<Entry>>,
    tasks: HashMap<u64, T>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    /// Create an empty scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Queue `task` to run `delay` from now.
    pub fn schedule_after(&mut self, delay: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            due: self.now + delay,
            seq,
        }));
        self.tasks.insert(seq, task);
    }

    /// Virtual time of the earliest pending task.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Move the clock to `now` without running anything.
    ///
    /// The clock never goes backwards.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Pop the earliest task due at or before the current time.
    pub fn pop_due(&mut self) -> Option<T> {
        let due = self.next_deadline()?;
        if due > self.now {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.tasks.remove(&entry.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scheduler() {
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(scheduler.pop_due(), None);
    }

    #[test]
    fn test_tasks_run_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(Duration::from_millis(500), "late");
        scheduler.schedule_after(Duration::from_millis(100), "early");
        assert_eq!(scheduler.next_deadline(), Some(Duration::from_millis(100)));

        scheduler.set_now(Duration::from_millis(99));
        assert_eq!(scheduler.pop_due(), None);

        scheduler.set_now(Duration::from_millis(100));
        assert_eq!(scheduler.pop_due(), Some("early"));
        assert_eq!(scheduler.pop_due(), None);

        scheduler.set_now(Duration::from_secs(1));
        assert_eq!(scheduler.pop_due(), Some("late"));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_same_deadline_is_fifo() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(Duration::from_millis(10), 1);
        scheduler.schedule_after(Duration::from_millis(10), 2);
        scheduler.schedule_after(Duration::from_millis(10), 3);
        scheduler.set_now(Duration::from_millis(10));

        let order: Vec<_> = std::iter::from_fn(|| scheduler.pop_due()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut scheduler = Scheduler::new();
        scheduler.set_now(Duration::from_secs(5));
        scheduler.schedule_after(Duration::from_millis(300), ());
        assert_eq!(scheduler.next_deadline(), Some(Duration::from_millis(5300)));
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        scheduler.set_now(Duration::from_secs(2));
        scheduler.set_now(Duration::from_secs(1));
        assert_eq!(scheduler.now(), Duration::from_secs(2));
    }
}
