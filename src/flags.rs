/*
 * Thread Flag Word
 *
 * The flag word from the original source's `thread_t`, ported bit for bit.
 * Composite masks (`MASK_WAIT`, `MASK_TIMEOUT`, `MASK_TERMINATE`) are kept
 * as named constants rather than re-derived, since their exact bit ranges
 * are load-bearing for the tick engine and the service gateway.
 */

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u8 {
        /// Round-robin fairness bit within a priority level.
        const NICE        = 1 << 0;
        /// Thread has an active countdown timer (sleep or timeout).
        const TIME_PENDING = 1 << 1;
        /// Thread is blocked waiting for a signal.
        const WAITING      = 1 << 2;
        /// Thread is blocked on a mutex.
        const SEMAPHORE    = 1 << 3;
        /// Thread is suspended (explicit, not time- or signal-driven).
        const SUSPEND      = 1 << 4;
        /// Thread's countdown timer elapsed before it was released.
        const TIMEOUT      = 1 << 6;
        /// Thread has been marked for termination.
        const TERMINATE    = 1 << 7;
    }
}

impl ThreadFlags {
    /// Bits that, when any is set, mean the thread is not schedulable:
    /// waiting on a timer, a signal, a mutex, or explicitly suspended.
    pub const MASK_WAIT: ThreadFlags = ThreadFlags::from_bits_truncate(
        ThreadFlags::TIME_PENDING.bits()
            | ThreadFlags::WAITING.bits()
            | ThreadFlags::SEMAPHORE.bits()
            | ThreadFlags::SUSPEND.bits(),
    );

    /// Bits a tick timeout clears to release a thread from a wait.
    pub const MASK_TIMEOUT: ThreadFlags = ThreadFlags::from_bits_truncate(
        ThreadFlags::WAITING.bits() | ThreadFlags::SEMAPHORE.bits(),
    );

    /// Bits that mean the thread's slot is reclaimable by the scheduler.
    pub const MASK_TERMINATE: ThreadFlags = ThreadFlags::from_bits_truncate(
        ThreadFlags::TIMEOUT.bits() | ThreadFlags::TERMINATE.bits(),
    );

    /// True if any bit in `MASK_WAIT` is set: the thread cannot run.
    pub fn is_blocked(&self) -> bool {
        self.intersects(Self::MASK_WAIT)
    }
}
