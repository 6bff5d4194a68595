/*
 * Service Gateway
 *
 * `kernel_call` is the single entry point every blocking kernel operation
 * funnels through from thread context. It decides, for the calling thread,
 * whether control returns to it immediately (`Dispatch::Continue`) or must
 * be handed back to the scheduler (`Dispatch::Suspend`) because the thread
 * just blocked or gave up its turn. Callable only from a thread: the
 * caller (`kernel::service`) returns `false` immediately if no thread is
 * current, rather than routing a missing thread context through here.
 *
 * The numbering below documents the original source's `SV_YIELD..SV_LOCK`
 * service codes; Rust expresses the argument shapes directly on the enum
 * instead of a code-plus-integer pair, so there is no reachable "(unknown)"
 * case to handle. `SV_UNLOCK` is not one of these: unlocking never blocks
 * its caller and must work from any context (e.g. an ISR), so it is a
 * plain Support Operation (`support::thread_unlock`) instead of a gateway
 * service.
 */

use crate::flags::ThreadFlags;
use crate::mutex::MutexTable;
use crate::table::ThreadTable;
use crate::thread::{ThreadId, WakeReason};

#[derive(Debug, Clone, Copy)]
pub enum Service {
    /// SV_YIELD: give up the remainder of this turn.
    Yield,
    /// SV_SLEEP: block for `ticks`, unconditionally.
    Sleep(u32),
    /// SV_SET_TIMEOUT: arm a timeout that fires after `ticks` unless a wait
    /// started in the meantime completes first.
    SetTimeout(u32),
    /// SV_WAIT: block until `thread_signal` targets this `channel`.
    Wait(u32),
    /// SV_LOCK: acquire mutex `id`, blocking if already held.
    Lock(usize),
    /// SV_END: terminate the calling thread. Never returns to it.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The calling thread keeps running; no context switch needed.
    Continue,
    /// The calling thread is blocked or has given up its turn; the
    /// scheduler must pick someone else.
    Suspend,
}

/// Apply `service` on behalf of `current`. Must run with interrupts
/// disabled, same as every other kernel mutation.
pub fn kernel_call(
    service: Service,
    current: ThreadId,
    threads: &mut ThreadTable,
    mutexes: &mut MutexTable,
) -> Dispatch {
    log::trace!("kernel_call: thread={:?} service={:?}", current, service);
    match service {
        Service::Yield => Dispatch::Suspend,

        Service::Sleep(ticks) => {
            if let Some(thread) = threads.find_mut(current) {
                thread.wake_reason = WakeReason::None;
                thread.flags.insert(ThreadFlags::TIME_PENDING);
                thread.timer = ticks;
            }
            Dispatch::Suspend
        }

        Service::SetTimeout(ticks) => {
            if let Some(thread) = threads.find_mut(current) {
                // "timer = n, timeout = false": a fresh timeout window
                // discards any stale timeout status from an earlier wait.
                thread.wake_reason = WakeReason::None;
                thread.flags.remove(ThreadFlags::TIMEOUT);
                thread.flags.insert(ThreadFlags::TIME_PENDING);
                thread.timer = ticks;
            }
            Dispatch::Continue
        }

        Service::Wait(channel) => {
            if let Some(thread) = threads.find_mut(current) {
                thread.flags.insert(ThreadFlags::WAITING);
                thread.wait_channel = channel;
                thread.wake_reason = WakeReason::None;
            }
            Dispatch::Suspend
        }

        Service::Lock(id) => {
            let priority = threads.find(current).map(|t| t.priority).unwrap_or(0);
            if mutexes.lock(id, current, priority) {
                Dispatch::Continue
            } else {
                if let Some(thread) = threads.find_mut(current) {
                    thread.wake_reason = WakeReason::None;
                    thread.flags.insert(ThreadFlags::SEMAPHORE);
                }
                Dispatch::Suspend
            }
        }

        Service::End => {
            if let Some(thread) = threads.find_mut(current) {
                thread.flags.insert(ThreadFlags::TERMINATE);
            }
            Dispatch::Suspend
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;

    fn setup() -> (ThreadTable, MutexTable, ThreadId) {
        let mut threads = ThreadTable::new();
        let mutexes = MutexTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        (threads, mutexes, id)
    }

    #[test]
    fn yield_always_suspends() {
        let (mut threads, mut mutexes, id) = setup();
        assert_eq!(kernel_call(Service::Yield, id, &mut threads, &mut mutexes), Dispatch::Suspend);
    }

    #[test]
    fn sleep_arms_timer_and_suspends() {
        let (mut threads, mut mutexes, id) = setup();
        assert_eq!(kernel_call(Service::Sleep(5), id, &mut threads, &mut mutexes), Dispatch::Suspend);
        let t = threads.find(id).unwrap();
        assert!(t.flags.contains(ThreadFlags::TIME_PENDING));
        assert_eq!(t.timer, 5);
    }

    #[test]
    fn uncontended_lock_does_not_suspend() {
        let (mut threads, mut mutexes, id) = setup();
        assert_eq!(kernel_call(Service::Lock(0), id, &mut threads, &mut mutexes), Dispatch::Continue);
    }

    #[test]
    fn contended_lock_blocks_and_queues_by_priority() {
        let mut threads = ThreadTable::new();
        let mut mutexes = MutexTable::new();
        let owner = threads.create(0, Stack::new(256), 0).unwrap();
        let waiter = threads.create(0, Stack::new(256), 0).unwrap();

        assert_eq!(kernel_call(Service::Lock(0), owner, &mut threads, &mut mutexes), Dispatch::Continue);
        assert_eq!(kernel_call(Service::Lock(0), waiter, &mut threads, &mut mutexes), Dispatch::Suspend);
        assert!(threads.find(waiter).unwrap().flags.contains(ThreadFlags::SEMAPHORE));

        // Releasing it (a Support Operation, not a gateway service — see
        // support::thread_unlock) hands it straight to the queued waiter.
        assert_eq!(mutexes.unlock(0), Some(Some(waiter)));
    }

    #[test]
    fn set_timeout_clears_a_stale_timeout_from_an_earlier_wait() {
        let (mut threads, mut mutexes, id) = setup();
        threads.find_mut(id).unwrap().flags.insert(ThreadFlags::TIMEOUT);
        threads.find_mut(id).unwrap().wake_reason = WakeReason::TimedOut;

        assert_eq!(kernel_call(Service::SetTimeout(3), id, &mut threads, &mut mutexes), Dispatch::Continue);
        let t = threads.find(id).unwrap();
        assert!(!t.flags.contains(ThreadFlags::TIMEOUT));
        assert_eq!(t.wake_reason, WakeReason::None);
    }

    #[test]
    fn end_marks_terminate_and_suspends() {
        let (mut threads, mut mutexes, id) = setup();
        assert_eq!(kernel_call(Service::End, id, &mut threads, &mut mutexes), Dispatch::Suspend);
        assert!(threads.find(id).unwrap().flags.contains(ThreadFlags::TERMINATE));
    }
}
