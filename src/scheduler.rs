/*
 * Scheduler: priority + round-robin selection
 *
 * Strict priority across levels (higher numeric value = higher priority),
 * round-robin fairness within a level via the `NICE` bit: a thread that has
 * just run is marked `NICE` and rotated to the back of its level so the
 * next pick favors threads that haven't had a turn yet. When every ready
 * thread in a level carries `NICE`, the bit is cleared across the whole
 * level and the rotation starts over.
 *
 * This module is architecture-independent: it only ever decides which
 * `ThreadId` runs next. The actual context switch lives in the kernel
 * module, next to the single place interrupts are known to be disabled.
 */

use crate::config::MAX_PRIO;
use crate::flags::ThreadFlags;
use crate::table::ThreadTable;
use crate::thread::ThreadId;

pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Pick the next thread to run, scanning priority levels from highest
    /// (`MAX_PRIO - 1`) down to lowest (`0`). Returns `None` if no thread
    /// anywhere is ready (the caller should idle, e.g. `hlt`, until the
    /// next tick or signal).
    pub fn select(&self, threads: &mut ThreadTable) -> Option<ThreadId> {
        for priority in (0..MAX_PRIO).rev() {
            if let Some(id) = self.select_in_level(threads, priority) {
                return Some(id);
            }
        }
        None
    }

    fn select_in_level(&self, threads: &mut ThreadTable, priority: usize) -> Option<ThreadId> {
        let level = threads.level_mut(priority);
        let len = level.len();
        if len == 0 {
            return None;
        }

        let ready = |flags: ThreadFlags| !flags.is_blocked() && !flags.contains(ThreadFlags::TERMINATE);

        for _ in 0..len {
            let front_ready_nonnice = level.front().map(|r| ready(r.flags) && !r.flags.contains(ThreadFlags::NICE));
            match front_ready_nonnice {
                Some(true) => {
                    let mut record = level.pop_front().expect("len checked above");
                    record.flags.insert(ThreadFlags::NICE);
                    let id = record.id;
                    level.push_back(record);
                    return Some(id);
                }
                Some(false) => {
                    let record = level.pop_front().expect("len checked above");
                    level.push_back(record);
                }
                None => unreachable!("len checked above"),
            }
        }

        // Every ready thread already had its turn this round; reset and retry.
        let any_ready = level.iter().any(|r| ready(r.flags));
        if !any_ready {
            return None;
        }
        for record in level.iter_mut() {
            record.flags.remove(ThreadFlags::NICE);
        }
        for _ in 0..len {
            let front_ready = level.front().map(|r| ready(r.flags));
            match front_ready {
                Some(true) => {
                    let mut record = level.pop_front().expect("len checked above");
                    record.flags.insert(ThreadFlags::NICE);
                    let id = record.id;
                    level.push_back(record);
                    return Some(id);
                }
                Some(false) => {
                    let record = level.pop_front().expect("len checked above");
                    level.push_back(record);
                }
                None => unreachable!("len checked above"),
            }
        }
        None
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
