/*
 * Tick Engine
 *
 * Drives every timer in the system from a single monotonic tick counter.
 * Called from whatever hardware interrupt the embedding application wires
 * up (or from the optional `pit-timer` ISR). Must run with interrupts
 * disabled or from interrupt context, never concurrently with itself.
 *
 * Ordering follows the original source exactly: decrement a thread's
 * timer, and only if it reaches zero do we look at `MASK_TIMEOUT` to
 * decide whether to clear the wait bits and set `TIMEOUT`; `TIME_PENDING`
 * itself is cleared unconditionally once the timer hits zero, even for a
 * plain sleep that was never waiting on anything.
 */

use crate::callback_table::CallbackTable;
use crate::flags::ThreadFlags;
use crate::table::ThreadTable;
use crate::thread::WakeReason;

pub struct TickEngine {
    ticks: u32,
}

impl TickEngine {
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Advance the tick counter by one and service every pending timer.
    pub fn on_tick(&mut self, threads: &mut ThreadTable, callbacks: &mut CallbackTable) {
        self.ticks = self.ticks.wrapping_add(1);

        for cb in callbacks.iter_mut() {
            if !cb.active {
                continue;
            }
            if cb.timer == 0 {
                continue;
            }
            cb.timer -= 1;
            if cb.timer == 0 {
                log::trace!("callback fired: id={:?}", cb.id);
                (cb.func)(cb.arg);
                if cb.period != 0 {
                    cb.timer = cb.period;
                } else {
                    cb.active = false;
                }
            }
        }
        callbacks.reap_expired();

        for thread in threads.iter_mut() {
            if !thread.flags.contains(ThreadFlags::TIME_PENDING) {
                continue;
            }
            if thread.timer == 0 {
                continue;
            }
            thread.timer -= 1;
            if thread.timer == 0 {
                if thread.flags.intersects(ThreadFlags::MASK_TIMEOUT) {
                    thread.flags.remove(ThreadFlags::MASK_WAIT);
                    thread.flags.insert(ThreadFlags::TIMEOUT);
                    thread.wake_reason = WakeReason::TimedOut;
                    log::trace!("thread timed out: id={:?}", thread.id);
                }
                thread.flags.remove(ThreadFlags::TIME_PENDING);
            }
        }
    }
}

impl Default for TickEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback_table::CallbackTable;
    use crate::stack::Stack;
    use crate::table::ThreadTable;

    fn no_op(_arg: usize) {}

    #[test]
    fn sleep_times_out_without_timeout_flag() {
        let mut threads = ThreadTable::new();
        let mut callbacks = CallbackTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        let t = threads.find_mut(id).unwrap();
        t.flags.insert(ThreadFlags::TIME_PENDING);
        t.timer = 2;

        let mut engine = TickEngine::new();
        engine.on_tick(&mut threads, &mut callbacks);
        assert!(threads.find(id).unwrap().flags.contains(ThreadFlags::TIME_PENDING));
        engine.on_tick(&mut threads, &mut callbacks);
        let t = threads.find(id).unwrap();
        assert!(!t.flags.contains(ThreadFlags::TIME_PENDING));
        assert!(!t.flags.contains(ThreadFlags::TIMEOUT));
    }

    #[test]
    fn wait_times_out_with_timeout_flag_and_clears_wait_bits() {
        let mut threads = ThreadTable::new();
        let mut callbacks = CallbackTable::new();
        let id = threads.create(0, Stack::new(256), 0).unwrap();
        let t = threads.find_mut(id).unwrap();
        t.flags.insert(ThreadFlags::TIME_PENDING | ThreadFlags::WAITING | ThreadFlags::NICE);
        t.timer = 1;

        let mut engine = TickEngine::new();
        engine.on_tick(&mut threads, &mut callbacks);
        let t = threads.find(id).unwrap();
        assert!(t.flags.contains(ThreadFlags::TIMEOUT));
        assert!(!t.flags.contains(ThreadFlags::WAITING));
        assert!(!t.flags.contains(ThreadFlags::TIME_PENDING));
        // NICE is outside MASK_WAIT and must survive the clear.
        assert!(t.flags.contains(ThreadFlags::NICE));
    }

    #[test]
    fn one_shot_callback_fires_once() {
        let mut threads = ThreadTable::new();
        let mut callbacks = CallbackTable::new();
        let id = callbacks.fire(no_op, 0, 1, 0).unwrap();

        let mut engine = TickEngine::new();
        engine.on_tick(&mut threads, &mut callbacks);
        assert!(callbacks.find_mut(id).is_none());
    }

    #[test]
    fn periodic_callback_reloads() {
        let mut threads = ThreadTable::new();
        let mut callbacks = CallbackTable::new();
        let id = callbacks.fire(no_op, 0, 1, 3).unwrap();

        let mut engine = TickEngine::new();
        engine.on_tick(&mut threads, &mut callbacks);
        let cb = callbacks.find_mut(id).expect("periodic callback stays registered");
        assert_eq!(cb.timer, 3);
    }
}
