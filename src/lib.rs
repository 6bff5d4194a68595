/*
 * chronorr — cooperative real-time executive for single-core microcontrollers
 *
 * A small, tick-driven, priority-scheduled kernel meant to be linked into a
 * bare-metal application, not run standalone. The embedding application
 * supplies a `#[global_allocator]`, a panic handler, and (unless the
 * `pit-timer` feature is enabled) its own timer interrupt calling
 * `on_tick()`.
 *
 * Typical bring-up:
 *
 * ```ignore
 * chronorr::kernel_init();
 * chronorr::thread_create(my_thread_body, 0, 4096);
 * chronorr::kernel_run();
 * ```
 */

#![no_std]

extern crate alloc;

mod arch;
mod callback;
mod callback_table;
mod config;
mod error;
mod flags;
mod gateway;
mod kernel;
#[cfg(feature = "serial-log")]
mod log_sink;
mod mutex;
mod scheduler;
mod stack;
mod support;
mod table;
mod thread;
mod tick;

pub use callback::{CallbackFn, CallbackId, CallbackRecord};
pub use config::{DEFAULT_STACK_SIZE, MAX_PRIO, MIN_STACK_SIZE};
pub use error::KernelError;
pub use flags::ThreadFlags;
pub use thread::{ThreadEntry, ThreadId, WakeReason};

pub use kernel::{
    callback_cancel,
    callback_fire,
    callback_refire,
    delay,
    kernel_init,
    kernel_run,
    os_count_callbacks,
    os_count_ready,
    os_count_threads,
    scheduler,
    thread_create,
    thread_end,
    thread_force,
    thread_is_running,
    thread_kill,
    thread_lock,
    thread_not_terminated,
    thread_priority,
    thread_release,
    thread_set_timeout,
    thread_signal,
    thread_sleep,
    thread_suspend,
    thread_terminate,
    thread_terminated,
    thread_unlock,
    thread_wait,
    thread_yield,
    ticks,
};

#[cfg(feature = "pit-timer")]
pub use arch::x86_64::timer as pit_timer;

#[cfg(feature = "serial-log")]
pub use log_sink as serial_log;
