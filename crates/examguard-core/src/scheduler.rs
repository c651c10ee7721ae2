//! Virtual-time task queue.
//!
//! The session never reads a wall clock. Recurring activities (the countdown
//! tick, the proctoring signal check) and one-shot deferred work (warning
//! auto-clear) are entries in this queue, each with its own handle, and fire
//! only when the owner advances time. Tests drive it with arbitrary jumps;
//! the live driver advances it as real time passes.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Identifies one scheduled entry. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    handle: TaskHandle,
    period: Option<Duration>,
    task: T,
}

/// Queue key: due time, then insertion order for ties.
type Slot = (Duration, u64);

/// Smallest allowed period for recurring entries.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A deterministic timer queue over a virtual clock starting at zero.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<Slot, Entry<T>>,
    slots: HashMap<TaskHandle, Slot>,
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
            slots: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `task` once, `delay` from now.
    pub fn schedule_once(&mut self, delay: Duration, task: T) -> TaskHandle {
        self.insert(self.now.saturating_add(delay), None, task)
    }

    /// Run `task` every `period`, first at `now + period`.
    pub fn schedule_every(&mut self, period: Duration, task: T) -> TaskHandle {
        let period = period.max(MIN_PERIOD);
        self.insert(self.now.saturating_add(period), Some(period), task)
    }

    /// Cancel one entry. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.slots.remove(&handle) {
            Some(slot) => self.queue.remove(&slot).is_some(),
            None => false,
        }
    }

    /// Drop every pending entry.
    pub fn cancel_all(&mut self) {
        self.queue.clear();
        self.slots.clear();
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.slots.contains_key(&handle)
    }

    /// Number of pending entries.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pop the earliest entry due at or before `until`, moving the clock to
    /// its due time. Recurring entries are re-queued before returning, so the
    /// caller may cancel them while handling the task.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TaskHandle, T)> {
        let slot = *self.queue.keys().next()?;
        if slot.0 > until {
            return None;
        }
        let entry = self.queue.remove(&slot)?;
        self.slots.remove(&entry.handle);
        self.now = self.now.max(slot.0);

        // A recurrence that would land past the end of time is dropped.
        if let Some(due) = entry.period.and_then(|p| slot.0.checked_add(p)) {
            let next = (due, slot.1);
            self.slots.insert(entry.handle, next);
            self.queue.insert(
                next,
                Entry {
                    handle: entry.handle,
                    period: entry.period,
                    task: entry.task.clone(),
                },
            );
        }

        Some((entry.handle, entry.task))
    }

    /// Move the clock forward to `until` without firing anything. Call after
    /// draining `pop_due`.
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    fn insert(&mut self, due: Duration, period: Option<Duration>, task: T) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        let slot = (due, self.next_id);
        self.next_id += 1;
        self.queue.insert(
            slot,
            Entry {
                handle,
                period,
                task,
            },
        );
        self.slots.insert(handle, slot);
        handle
    }
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
