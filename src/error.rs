/*
 * Kernel Error Kinds
 *
 * Internal error type used for logging and for the crate's own tests. The
 * public API keeps the boolean/Option shapes of the original source
 * instead of threading this through; callers that need only "did it work"
 * get that, and the detail goes to the log.
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A thread or callback record could not be allocated.
    AllocationFailure,
    /// A kernel service was invoked from outside thread context.
    NotInThreadContext,
    /// A wait exceeded its deadline.
    Timeout,
    /// An operation targeted a thread or callback id that is already free.
    AlreadyFree,
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            KernelError::AllocationFailure => "allocation failure",
            KernelError::NotInThreadContext => "not in thread context",
            KernelError::Timeout => "timeout",
            KernelError::AlreadyFree => "already free",
        };
        f.write_str(msg)
    }
}
