//! De-duplicating FIFO of pending index tasks.
//!
//! Entries live in an arena of slots linked in arrival order, with a
//! path -> slot map on the side. Both push and pop are O(1), and the map
//! guarantees at most one queued task per file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::task::IndexTask;

/// Result of merging a task into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// No entry existed for the path; appended at the tail.
    Appended,
    /// Incoming task was older than the queued one.
    Stale,
    /// Same polarity; the queued entry's timestamp was refreshed.
    Refreshed,
    /// A queued insert met a remove; both cancel out.
    Cancelled,
    /// A queued remove was replaced by the insert, keeping its position.
    Replaced,
}

#[derive(Debug)]
struct Slot {
    task: IndexTask,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    slots: Vec<Option<Slot>>,
    /// Vacant slot indices for reuse.
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    by_path: HashMap<PathBuf, usize>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `task` into the queue, keyed by its file path.
    pub fn push(&mut self, task: IndexTask) -> PushOutcome {
        let Some(&index) = self.by_path.get(&task.filepath) else {
            self.append(task);
            return PushOutcome::Appended;
        };

        let existing = &mut self.slot_mut(index).task;
        if task.start_time < existing.start_time {
            return PushOutcome::Stale;
        }

        match (existing.is_insert, task.is_insert) {
            (true, true) | (false, false) => {
                existing.start_time = task.start_time;
                PushOutcome::Refreshed
            }
            (true, false) => {
                self.unlink(index);
                PushOutcome::Cancelled
            }
            (false, true) => {
                *existing = task;
                PushOutcome::Replaced
            }
        }
    }

    /// Remove and return the oldest task.
    pub fn pop(&mut self) -> Option<IndexTask> {
        let head = self.head?;
        Some(self.unlink(head))
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// The queued task for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&IndexTask> {
        let index = *self.by_path.get(path)?;
        self.slots[index].as_ref().map(|slot| &slot.task)
    }

    /// Queued tasks from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &IndexTask> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = self.slots[cursor?].as_ref()?;
            cursor = slot.next;
            Some(&slot.task)
        })
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        match self.slots[index].as_mut() {
            Some(slot) => slot,
            None => unreachable!("path map points at vacant slot {index}"),
        }
    }

    fn append(&mut self, task: IndexTask) {
        let path = task.filepath.clone();
        let slot = Slot {
            task,
            prev: self.tail,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.slot_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.by_path.insert(path, index);
    }

    fn unlink(&mut self, index: usize) -> IndexTask {
        let Some(slot) = self.slots[index].take() else {
            unreachable!("unlinking vacant slot {index}");
        };

        match slot.prev {
            Some(prev) => self.slot_mut(prev).next = slot.next,
            None => self.head = slot.next,
        }
        match slot.next {
            Some(next) => self.slot_mut(next).prev = slot.prev,
            None => self.tail = slot.prev,
        }

        self.by_path.remove(&slot.task.filepath);
        self.free.push(index);
        slot.task
    }
}
