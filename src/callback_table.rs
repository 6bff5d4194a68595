/*
 * Callback Table
 *
 * A flat registry of deferred callbacks, counterpart to the Thread Table.
 * Callbacks have no priority and no scheduling order among themselves;
 * they fire strictly in tick order as their individual timers expire.
 */

use alloc::collections::VecDeque;

use crate::callback::{CallbackFn, CallbackId, CallbackRecord};
use crate::error::KernelError;

pub struct CallbackTable {
    entries: VecDeque<CallbackRecord>,
    next_index: u32,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self { entries: VecDeque::new(), next_index: 0 }
    }

    fn alloc_id(&mut self) -> CallbackId {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        CallbackId { index, generation: 0 }
    }

    pub fn fire(&mut self, func: CallbackFn, arg: usize, delay: u32, period: u32) -> Option<CallbackId> {
        let id = self.alloc_id();
        self.entries.push_back(CallbackRecord::new(id, func, arg, delay, period));
        log::trace!("callback_fire: id={:?} delay={} period={}", id, delay, period);
        Some(id)
    }

    /// Cancel the callback registered against `func`, if any.
    pub fn cancel(&mut self, func: CallbackFn) -> bool {
        if let Some(pos) = self.entries.iter().position(|c| c.func == func) {
            let id = self.entries[pos].id;
            self.entries.remove(pos);
            log::debug!("callback_cancel: id={:?}", id);
            true
        } else {
            log::debug!("callback_cancel: {}", KernelError::AlreadyFree);
            false
        }
    }

    /// Re-arm `func` to fire after `delay` ticks with argument `arg`. If a
    /// callback registered against `func` already exists, its `arg` and
    /// timer are overwritten in place; otherwise a new one-shot entry is
    /// allocated and appended. Idempotent by function identity: calling
    /// this twice is equivalent to calling it once with the last
    /// `(arg, delay)`.
    pub fn refire(&mut self, func: CallbackFn, arg: usize, delay: u32) -> CallbackId {
        if let Some(entry) = self.entries.iter_mut().find(|c| c.func == func) {
            entry.arg = arg;
            entry.timer = delay;
            entry.active = true;
            log::trace!("callback_refire: id={:?} delay={}", entry.id, delay);
            entry.id
        } else {
            let id = self.alloc_id();
            self.entries.push_back(CallbackRecord::new(id, func, arg, delay, 0));
            log::trace!("callback_refire: id={:?} delay={} (newly allocated)", id, delay);
            id
        }
    }

    pub fn find_mut(&mut self, id: CallbackId) -> Option<&mut CallbackRecord> {
        self.entries.iter_mut().find(|c| c.id == id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CallbackRecord> {
        self.entries.iter_mut()
    }

    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// Remove every one-shot callback that has fired and is not periodic.
    pub fn reap_expired(&mut self) {
        self.entries.retain(|c| c.active || c.period != 0);
    }
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}
