/*
 * Deferred Callback Record
 *
 * Callbacks are the timer-driven counterpart to threads: a function
 * pointer plus an argument, fired from tick context once their countdown
 * reaches zero. They never block and never get their own stack.
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

pub type CallbackFn = fn(arg: usize);

pub struct CallbackRecord {
    pub id: CallbackId,
    pub func: CallbackFn,
    pub arg: usize,
    pub timer: u32,
    /// Reload value used by `callback_refire`; zero means one-shot.
    pub period: u32,
    pub active: bool,
}

impl CallbackRecord {
    pub fn new(id: CallbackId, func: CallbackFn, arg: usize, delay: u32, period: u32) -> Self {
        Self { id, func, arg, timer: delay, period, active: true }
    }
}
