/*
 * Thread Table
 *
 * Owns every thread record, grouped by priority level. Each priority level
 * is a `VecDeque` in insertion order, matching the original source's
 * `list_add` (append). Round-robin rotation within a level is a
 * pop_front/push_back pair on that level's deque; it never touches a
 * record's identity.
 *
 * Threads are addressed by `ThreadId`, a monotonically issued handle, not
 * by position: looking a thread up is a linear scan of its priority level.
 * Priority levels are small in practice (this is a single-core cooperative
 * kernel, not a general-purpose scheduler), so the scan cost is not a
 * concern.
 */

use alloc::collections::VecDeque;

use crate::config::MAX_PRIO;
use crate::error::KernelError;
use crate::stack::Stack;
use crate::thread::{ThreadId, ThreadRecord};

pub struct ThreadTable {
    levels: [VecDeque<ThreadRecord>; MAX_PRIO],
    next_index: u32,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            levels: core::array::from_fn(|_| VecDeque::new()),
            next_index: 0,
        }
    }

    fn alloc_id(&mut self) -> ThreadId {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        ThreadId { index, generation: 0 }
    }

    /// Create a new thread at `priority` with the given stack and initial
    /// stack pointer. Returns `None` only if `priority` is out of range;
    /// stack allocation failure is the caller's concern (the `Stack` is
    /// already constructed by the time it reaches here).
    pub fn create(&mut self, priority: usize, stack: Stack, sp: usize) -> Option<ThreadId> {
        if priority >= MAX_PRIO {
            log::warn!("thread_create: priority {} out of range", priority);
            return None;
        }
        let id = self.alloc_id();
        let record = ThreadRecord::new(id, priority, stack, sp);
        self.levels[priority].push_back(record);
        log::trace!("thread_create: id={:?} priority={}", id, priority);
        Some(id)
    }

    /// Remove and drop a thread's record (and with it, its stack).
    pub fn kill(&mut self, id: ThreadId) -> bool {
        for level in self.levels.iter_mut() {
            if let Some(pos) = level.iter().position(|r| r.id == id) {
                let record = level.remove(pos).expect("position just found");
                log::debug!("thread_kill: id={:?} priority={}", id, record.priority);
                return true;
            }
        }
        log::debug!("thread_kill: {}: id={:?}", KernelError::AlreadyFree, id);
        false
    }

    /// Move `id` into priority level `new_priority` (clamped to
    /// `0..MAX_PRIO`). Takes effect at the next scheduler pass; a thread
    /// currently running keeps running until it next yields, sleeps, or
    /// blocks.
    pub fn set_priority(&mut self, id: ThreadId, new_priority: usize) -> bool {
        let new_priority = new_priority.min(MAX_PRIO - 1);
        let mut moved = None;
        for level in self.levels.iter_mut() {
            if let Some(pos) = level.iter().position(|r| r.id == id) {
                moved = level.remove(pos);
                break;
            }
        }
        match moved {
            Some(mut record) => {
                record.priority = new_priority;
                log::trace!("thread_priority: id={:?} priority={}", id, new_priority);
                self.levels[new_priority].push_back(record);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, id: ThreadId) -> Option<&ThreadRecord> {
        self.levels.iter().find_map(|level| level.iter().find(|r| r.id == id))
    }

    pub fn find_mut(&mut self, id: ThreadId) -> Option<&mut ThreadRecord> {
        self.levels.iter_mut().find_map(|level| level.iter_mut().find(|r| r.id == id))
    }

    pub fn level(&self, priority: usize) -> &VecDeque<ThreadRecord> {
        &self.levels[priority]
    }

    pub fn level_mut(&mut self, priority: usize) -> &mut VecDeque<ThreadRecord> {
        &mut self.levels[priority]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreadRecord> {
        self.levels.iter().flat_map(|level| level.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ThreadRecord> {
        self.levels.iter_mut().flat_map(|level| level.iter_mut())
    }

    pub fn count(&self) -> u16 {
        self.levels.iter().map(|l| l.len() as u16).sum()
    }

    /// Count threads that are currently schedulable (not blocked, not
    /// terminating), iterated per priority level rather than treated as a
    /// single flat count (the original `os_count_ready` conflated this).
    pub fn count_ready(&self) -> u16 {
        self.levels
            .iter()
            .flat_map(|level| level.iter())
            .filter(|r| !r.is_blocked() && !r.is_terminating())
            .count() as u16
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}
