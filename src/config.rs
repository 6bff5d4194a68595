/*
 * Kernel Configuration Constants
 *
 * Mirrors the tunables from the original source's `config.h`: the number
 * of priority levels and the default stack size new threads are allocated
 * with when the caller doesn't specify one.
 */

/// Number of distinct priority levels. Priority values run `0..MAX_PRIO`;
/// higher values are higher priority, and the scheduler scans levels from
/// `MAX_PRIO - 1` down to `0`, matching the original source's
/// `for(i = MAX_PRIO-1; i >= 0; i--)`. New threads are always created at
/// the lowest level (`0`, "uses the lowest priority at first" per the
/// original source) and move up only via `thread_priority`.
pub const MAX_PRIO: usize = 3;

/// Default stack size for a new thread, in bytes, when the caller does not
/// request a specific size.
pub const DEFAULT_STACK_SIZE: usize = 4096;

/// Minimum stack a thread may be created with. Smaller requests are
/// rejected by the Thread Table rather than silently rounded up.
pub const MIN_STACK_SIZE: usize = 256;
