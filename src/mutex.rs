/*
 * Kernel Mutex Table
 *
 * Mutexes are identified by an arbitrary id the caller owns (in the
 * original source, a memory address); the table itself places no limit on
 * how many distinct ids it will track, allocating an entry lazily on first
 * use. A thread blocked on a held mutex is queued in priority order
 * (highest priority first, so unlocking never hands the lock to a
 * lower-priority waiter while a higher one is queued); waiters of equal
 * priority keep FIFO order among themselves.
 */

use alloc::collections::{BTreeMap, VecDeque};

use crate::thread::ThreadId;

#[derive(Default)]
pub struct Mutex {
    owner: Option<ThreadId>,
    /// Parallel to `waiters`: the priority each was queued at.
    waiters: VecDeque<(usize, ThreadId)>,
}

pub struct MutexTable {
    mutexes: BTreeMap<usize, Mutex>,
}

impl MutexTable {
    pub fn new() -> Self {
        Self { mutexes: BTreeMap::new() }
    }

    /// Try to acquire `id` for `thread` at `priority`. Returns `true` if
    /// acquired immediately, `false` if the caller must block (and has
    /// already been enqueued as a waiter, in priority order).
    pub fn lock(&mut self, id: usize, thread: ThreadId, priority: usize) -> bool {
        let mutex = self.mutexes.entry(id).or_default();
        match mutex.owner {
            None => {
                mutex.owner = Some(thread);
                true
            }
            Some(owner) if owner == thread => true,
            Some(_) => {
                let pos = mutex.waiters.iter().position(|&(p, _)| p < priority).unwrap_or(mutex.waiters.len());
                mutex.waiters.insert(pos, (priority, thread));
                false
            }
        }
    }

    /// Release `id`, handing it to the highest-priority queued waiter, if
    /// any. Unconditional: the caller's identity is not checked, since this
    /// is a Support Operation callable from any context, not only the
    /// owning thread. Returns `None` if `id` was never locked; otherwise
    /// `Some(new_owner)`, where `new_owner` is `None` if the mutex is now
    /// free.
    pub fn unlock(&mut self, id: usize) -> Option<Option<ThreadId>> {
        let mutex = self.mutexes.get_mut(&id)?;
        Some(match mutex.waiters.pop_front() {
            Some((_, next)) => {
                mutex.owner = Some(next);
                Some(next)
            }
            None => {
                mutex.owner = None;
                None
            }
        })
    }

    pub fn owner(&self, id: usize) -> Option<ThreadId> {
        self.mutexes.get(&id).and_then(|m| m.owner)
    }
}

impl Default for MutexTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u32) -> ThreadId {
        ThreadId { index: n, generation: 0 }
    }

    #[test]
    fn uncontended_lock_succeeds_immediately() {
        let mut table = MutexTable::new();
        assert!(table.lock(0, tid(1), 0));
        assert_eq!(table.owner(0), Some(tid(1)));
    }

    #[test]
    fn contended_waiters_ordered_by_priority() {
        let mut table = MutexTable::new();
        assert!(table.lock(0, tid(1), 0));
        assert!(!table.lock(0, tid(2), 1));
        assert!(!table.lock(0, tid(3), 2));

        // Priority 2 (tid 3) is highest and is released first, then
        // priority 1 (tid 2), then the mutex falls idle.
        assert_eq!(table.unlock(0), Some(Some(tid(3))));
        assert_eq!(table.unlock(0), Some(Some(tid(2))));
        assert_eq!(table.unlock(0), Some(None));
    }

    #[test]
    fn unlocking_an_unlocked_mutex_is_a_no_op() {
        let mut table = MutexTable::new();
        assert_eq!(table.unlock(0), None);
    }

    #[test]
    fn mutex_ids_need_no_upfront_reservation() {
        let mut table = MutexTable::new();
        assert!(table.lock(1_000_000, tid(1), 0));
        assert_eq!(table.owner(1_000_000), Some(tid(1)));
    }
}
