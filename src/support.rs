/*
 * Support Operations
 *
 * Non-blocking operations any thread (or the kernel itself, from an
 * interrupt handler) can invoke against another thread's record: signal,
 * force-wake, suspend/release, terminate, and unlock. None of these ever
 * suspend their caller, so they don't go through the Service Gateway, and
 * none of them require a currently running thread to invoke them.
 */

use crate::callback::{CallbackFn, CallbackId};
use crate::callback_table::CallbackTable;
use crate::flags::ThreadFlags;
use crate::mutex::MutexTable;
use crate::table::ThreadTable;
use crate::thread::{ThreadId, WakeReason};

/// Wake every thread waiting on `channel`. Broadcast, not single-wakeup:
/// a channel models an event, not a queue slot.
pub fn thread_signal(threads: &mut ThreadTable, channel: u32) -> u16 {
    let mut woken = 0u16;
    for thread in threads.iter_mut() {
        if thread.flags.contains(ThreadFlags::WAITING) && thread.wait_channel == channel {
            thread.flags.remove(ThreadFlags::WAITING);
            thread.wake_reason = WakeReason::Signaled;
            woken += 1;
        }
    }
    if woken > 0 {
        log::trace!("thread_signal: channel={} woke={}", channel, woken);
    }
    woken
}

/// Unconditionally clear every wait bit on `id`, regardless of what it was
/// waiting for. A supervisory override, not part of normal wait/signal
/// flow.
pub fn thread_force(threads: &mut ThreadTable, id: ThreadId) -> bool {
    if let Some(thread) = threads.find_mut(id) {
        thread.flags.remove(ThreadFlags::MASK_WAIT);
        thread.wake_reason = WakeReason::Forced;
        log::debug!("thread_force: id={:?}", id);
        true
    } else {
        false
    }
}

pub fn thread_suspend(threads: &mut ThreadTable, id: ThreadId) -> bool {
    if let Some(thread) = threads.find_mut(id) {
        thread.flags.insert(ThreadFlags::SUSPEND);
        true
    } else {
        false
    }
}

pub fn thread_release(threads: &mut ThreadTable, id: ThreadId) -> bool {
    if let Some(thread) = threads.find_mut(id) {
        thread.flags.remove(ThreadFlags::SUSPEND);
        true
    } else {
        false
    }
}

/// Mark `id` for termination. The thread is excluded from scheduling from
/// this point on; the kernel reaps its record once it is no longer the
/// running thread.
pub fn thread_terminate(threads: &mut ThreadTable, id: ThreadId) -> bool {
    if let Some(thread) = threads.find_mut(id) {
        thread.flags.insert(ThreadFlags::TERMINATE);
        log::debug!("thread_terminate: id={:?}", id);
        true
    } else {
        false
    }
}

pub fn thread_terminated(threads: &ThreadTable, id: ThreadId) -> bool {
    threads.find(id).map(|t| t.is_terminating()).unwrap_or(true)
}

pub fn thread_not_terminated(threads: &ThreadTable, id: ThreadId) -> bool {
    !thread_terminated(threads, id)
}

/// Release mutex `id`. Unlike the blocking kernel-call services, this is
/// callable from any context, not just the currently running thread: it
/// does not check who currently "owns" the caller, matching the original
/// source's `thread_unlock` being a plain Support Operation.
pub fn thread_unlock(threads: &mut ThreadTable, mutexes: &mut MutexTable, id: usize) -> bool {
    match mutexes.unlock(id) {
        Some(next_owner) => {
            if let Some(next) = next_owner {
                if let Some(thread) = threads.find_mut(next) {
                    thread.flags.remove(ThreadFlags::SEMAPHORE);
                    thread.wake_reason = WakeReason::Unlocked;
                }
            }
            log::trace!("thread_unlock: id={}", id);
            true
        }
        None => false,
    }
}

pub fn callback_fire(callbacks: &mut CallbackTable, func: CallbackFn, arg: usize, delay: u32) -> Option<CallbackId> {
    callbacks.fire(func, arg, delay, 0)
}

pub fn callback_refire(callbacks: &mut CallbackTable, func: CallbackFn, arg: usize, delay: u32) -> CallbackId {
    callbacks.refire(func, arg, delay)
}

pub fn callback_cancel(callbacks: &mut CallbackTable, func: CallbackFn) -> bool {
    callbacks.cancel(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;

    #[test]
    fn signal_wakes_only_matching_channel() {
        let mut threads = ThreadTable::new();
        let a = threads.create(0, Stack::new(256), 0).unwrap();
        let b = threads.create(0, Stack::new(256), 0).unwrap();
        threads.find_mut(a).unwrap().flags.insert(ThreadFlags::WAITING);
        threads.find_mut(a).unwrap().wait_channel = 1;
        threads.find_mut(b).unwrap().flags.insert(ThreadFlags::WAITING);
        threads.find_mut(b).unwrap().wait_channel = 2;

        let woken = thread_signal(&mut threads, 1);
        assert_eq!(woken, 1);
        assert!(!threads.find(a).unwrap().flags.contains(ThreadFlags::WAITING));
        assert!(threads.find(b).unwrap().flags.contains(ThreadFlags::WAITING));
    }

    #[test]
    fn force_clears_any_wait_bit() {
        let mut threads = ThreadTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        threads.find_mut(id).unwrap().flags.insert(ThreadFlags::SEMAPHORE | ThreadFlags::TIME_PENDING);
        assert!(thread_force(&mut threads, id));
        assert!(!threads.find(id).unwrap().is_blocked());
    }

    #[test]
    fn terminated_queries_reflect_flag() {
        let mut threads = ThreadTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        assert!(thread_not_terminated(&threads, id));
        thread_terminate(&mut threads, id);
        assert!(thread_terminated(&threads, id));
        assert!(!thread_not_terminated(&threads, id));
    }

    #[test]
    fn timed_out_thread_is_not_terminating() {
        let mut threads = ThreadTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        threads.find_mut(id).unwrap().flags.insert(ThreadFlags::TIMEOUT);
        assert!(thread_not_terminated(&threads, id));
    }

    #[test]
    fn unlock_wakes_highest_priority_waiter_from_any_context() {
        let mut threads = ThreadTable::new();
        let mut mutexes = MutexTable::new();
        let owner = threads.create(0, Stack::new(256), 0).unwrap();
        let waiter = threads.create(1, Stack::new(256), 0).unwrap();

        assert!(mutexes.lock(0, owner, 0));
        assert!(!mutexes.lock(0, waiter, 1));
        threads.find_mut(waiter).unwrap().flags.insert(ThreadFlags::SEMAPHORE);

        assert!(thread_unlock(&mut threads, &mut mutexes, 0));
        let w = threads.find(waiter).unwrap();
        assert!(!w.flags.contains(ThreadFlags::SEMAPHORE));
        assert_eq!(w.wake_reason, WakeReason::Unlocked);
        assert_eq!(mutexes.owner(0), Some(waiter));
    }

    #[test]
    fn unlocking_an_unlocked_mutex_returns_false() {
        let mut threads = ThreadTable::new();
        let mut mutexes = MutexTable::new();
        assert!(!thread_unlock(&mut threads, &mut mutexes, 0));
    }

    #[test]
    fn refire_overwrites_existing_by_function_identity() {
        let mut callbacks = CallbackTable::new();
        fn body(_arg: usize) {}

        let first = callback_refire(&mut callbacks, body, 1, 10);
        let second = callback_refire(&mut callbacks, body, 2, 20);
        assert_eq!(first, second);
        assert_eq!(callbacks.count(), 1);

        let entry = callbacks.find_mut(second).unwrap();
        assert_eq!(entry.arg, 2);
        assert_eq!(entry.timer, 20);
    }

    #[test]
    fn cancel_by_function_identity() {
        let mut callbacks = CallbackTable::new();
        fn body(_arg: usize) {}

        callback_fire(&mut callbacks, body, 0, 5).unwrap();
        assert!(callback_cancel(&mut callbacks, body));
        assert_eq!(callbacks.count(), 0);
        assert!(!callback_cancel(&mut callbacks, body));
    }
}
