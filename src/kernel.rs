/*
 * Kernel Singleton
 *
 * Owns every piece of mutable kernel state and is the only place the
 * context-switch primitive is invoked. Deliberately NOT a `lazy_static` +
 * `spin::Mutex` singleton like the rest of the crate's globals: a
 * `MutexGuard` cannot be held across `arch::context::switch` (its
 * destructor would run on a stack that is no longer the one it was
 * created on), so kernel state is instead guarded the way the original
 * source's `_main_sp`/`_new_sp` globals were — by "interrupts disabled",
 * nothing more. Every access goes through `with_kernel`/`with_kernel_mut`,
 * which both bracket themselves in `arch::critical::without_interrupts`.
 */

use core::cell::UnsafeCell;

use crate::arch;
use crate::callback::{CallbackFn, CallbackId};
use crate::callback_table::CallbackTable;
use crate::error::KernelError;
use crate::gateway::{self, Dispatch, Service};
use crate::mutex::MutexTable;
use crate::scheduler::Scheduler;
use crate::stack::Stack;
use crate::support;
use crate::thread::{ThreadId, WakeReason};
use crate::tick::TickEngine;
use crate::table::ThreadTable;

pub struct Kernel {
    threads: ThreadTable,
    callbacks: CallbackTable,
    mutexes: MutexTable,
    scheduler: Scheduler,
    tick: TickEngine,
    current: Option<ThreadId>,
    /// Stack pointer of whatever called `kernel_run`; switched back into
    /// when no thread is ready to run.
    main_sp: usize,
}

impl Kernel {
    fn new() -> Self {
        Self {
            threads: ThreadTable::new(),
            callbacks: CallbackTable::new(),
            mutexes: MutexTable::new(),
            scheduler: Scheduler::new(),
            tick: TickEngine::new(),
            current: None,
            main_sp: 0,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.tick.ticks()
    }

    pub fn count_threads(&self) -> u16 {
        self.threads.count()
    }

    pub fn count_callbacks(&self) -> u16 {
        self.callbacks.count()
    }

    pub fn count_ready(&self) -> u16 {
        self.threads.count_ready()
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    /// Feed one hardware tick into the timer machinery. Safe to call from
    /// interrupt context; it never switches stacks itself.
    pub fn on_tick(&mut self) {
        self.tick.on_tick(&mut self.threads, &mut self.callbacks);
    }

    /// Drop every terminated thread's record except `keep`, whose stack is
    /// still in use by whoever is about to switch away from it.
    fn reap(&mut self, keep: Option<ThreadId>) {
        let terminated: alloc::vec::Vec<ThreadId> = self
            .threads
            .iter()
            .filter(|t| t.is_terminating() && Some(t.id) != keep)
            .map(|t| t.id)
            .collect();
        for id in terminated {
            self.threads.kill(id);
        }
    }
}

struct KernelCell(UnsafeCell<Option<Kernel>>);
unsafe impl Sync for KernelCell {}

static KERNEL: KernelCell = KernelCell(UnsafeCell::new(None));

/// Must run once, before any other kernel API, and before interrupts are
/// enabled.
pub fn kernel_init() {
    arch::critical::without_interrupts(|| unsafe {
        *KERNEL.0.get() = Some(Kernel::new());
    });
}

fn kernel_ptr() -> *mut Kernel {
    unsafe { (*KERNEL.0.get()).as_mut().expect("kernel_init was not called") as *mut Kernel }
}

pub fn with_kernel<F, R>(f: F) -> R
where
    F: FnOnce(&Kernel) -> R,
{
    arch::critical::without_interrupts(|| unsafe { f(&*kernel_ptr()) })
}

pub fn with_kernel_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Kernel) -> R,
{
    arch::critical::without_interrupts(|| unsafe { f(&mut *kernel_ptr()) })
}

use crate::thread::ThreadEntry;

/// Entry point every created thread's stack is initialized to land on.
/// Reads its own entry function and argument out of the kernel's record
/// for the now-current thread, runs it, and terminates: thread bodies
/// never need to call `thread_end` themselves.
extern "C" fn thread_trampoline() -> ! {
    let (entry, arg) = with_kernel(|kernel| {
        let id = kernel.current().expect("trampoline dispatched without a current thread");
        kernel.threads.find(id).and_then(|t| t.entry).expect("thread missing its entry point")
    });
    entry(arg);
    thread_end();
    unreachable!("a terminated thread was resumed");
}

/// Start a thread running `entry(arg)`, allocating `stack_size` bytes for
/// its stack. Every new thread is inserted at the lowest priority level
/// (`0`); call `thread_priority` afterward to raise it. Returns `None` if
/// `stack_size` is below `MIN_STACK_SIZE`.
pub fn thread_create(entry: ThreadEntry, arg: usize, stack_size: usize) -> Option<ThreadId> {
    if stack_size < crate::config::MIN_STACK_SIZE {
        log::warn!("thread_create: {}: stack_size {} below minimum", KernelError::AllocationFailure, stack_size);
        return None;
    }
    let mut stack = Stack::new(stack_size);
    let sp = arch::context::init_stack(stack.as_mut_slice(), thread_trampoline);
    with_kernel_mut(|kernel| {
        let id = kernel.threads.create(0, stack, sp)?;
        kernel.threads.find_mut(id).unwrap().entry = Some((entry, arg));
        Some(id)
    })
}

pub fn thread_kill(id: ThreadId) -> bool {
    with_kernel_mut(|kernel| kernel.threads.kill(id))
}

/// Move `id` to `new_priority` (clamped to `0..MAX_PRIO`). Takes effect at
/// the next scheduler pass; a thread moved while it is the one running
/// keeps running until it next yields, sleeps, or blocks. Returns `false`
/// if `id` does not name a live thread.
pub fn thread_priority(id: ThreadId, new_priority: usize) -> bool {
    with_kernel_mut(|kernel| kernel.threads.set_priority(id, new_priority))
}

pub fn thread_is_running(id: ThreadId) -> bool {
    with_kernel(|kernel| kernel.current == Some(id))
}

pub fn thread_terminated(id: ThreadId) -> bool {
    with_kernel(|kernel| support::thread_terminated(&kernel.threads, id))
}

pub fn thread_not_terminated(id: ThreadId) -> bool {
    !thread_terminated(id)
}

pub fn thread_signal(channel: u32) -> u16 {
    with_kernel_mut(|kernel| support::thread_signal(&mut kernel.threads, channel))
}

pub fn thread_force(id: ThreadId) -> bool {
    with_kernel_mut(|kernel| support::thread_force(&mut kernel.threads, id))
}

pub fn thread_suspend(id: ThreadId) -> bool {
    with_kernel_mut(|kernel| support::thread_suspend(&mut kernel.threads, id))
}

pub fn thread_release(id: ThreadId) -> bool {
    with_kernel_mut(|kernel| support::thread_release(&mut kernel.threads, id))
}

pub fn thread_terminate(id: ThreadId) -> bool {
    with_kernel_mut(|kernel| support::thread_terminate(&mut kernel.threads, id))
}

pub fn callback_fire(func: CallbackFn, arg: usize, delay: u32) -> Option<CallbackId> {
    with_kernel_mut(|kernel| support::callback_fire(&mut kernel.callbacks, func, arg, delay))
}

/// Re-arm `func` to fire after `delay` ticks with argument `arg`,
/// overwriting an existing registration for the same function or
/// allocating a new one if none exists yet.
pub fn callback_refire(func: CallbackFn, arg: usize, delay: u32) -> CallbackId {
    with_kernel_mut(|kernel| support::callback_refire(&mut kernel.callbacks, func, arg, delay))
}

pub fn callback_cancel(func: CallbackFn) -> bool {
    with_kernel_mut(|kernel| support::callback_cancel(&mut kernel.callbacks, func))
}

/// Release mutex `id`. Callable from any context, including outside a
/// running thread (e.g. during setup, or from an interrupt handler).
pub fn thread_unlock(id: usize) -> bool {
    with_kernel_mut(|kernel| support::thread_unlock(&mut kernel.threads, &mut kernel.mutexes, id))
}

pub fn ticks() -> u32 {
    with_kernel(|kernel| kernel.ticks())
}

pub fn os_count_threads() -> u16 {
    with_kernel(|kernel| kernel.count_threads())
}

pub fn os_count_callbacks() -> u16 {
    with_kernel(|kernel| kernel.count_callbacks())
}

pub fn os_count_ready() -> u16 {
    with_kernel(|kernel| kernel.count_ready())
}

/// Busy-wait for approximately `cycles` spin iterations. Does not yield;
/// other threads never run while a thread is inside `delay`.
pub fn delay(cycles: u32) {
    for _ in 0..cycles {
        core::hint::spin_loop();
    }
}

/// Run one kernel service call on behalf of the currently running thread.
/// Callable only from a thread: returns `false` immediately, without
/// touching any kernel state, if no thread is current. Otherwise returns
/// `true` unless the thread was woken by a timeout.
fn service(svc: Service) -> bool {
    arch::critical::without_interrupts(|| {
        let kernel = unsafe { &mut *kernel_ptr() };
        let current = match kernel.current {
            Some(id) => id,
            None => {
                log::warn!("kernel_call: {}: service={:?}", KernelError::NotInThreadContext, svc);
                return false;
            }
        };
        let dispatch = gateway::kernel_call(svc, current, &mut kernel.threads, &mut kernel.mutexes);

        if let Dispatch::Suspend = dispatch {
            kernel.reap(Some(current));
            let next = kernel.scheduler.select(&mut kernel.threads);
            kernel.current = next;
            let old_sp: *mut usize = &mut kernel.threads.find_mut(current).expect("current thread vanished").sp;
            let new_sp = match next {
                Some(id) => kernel.threads.find(id).expect("selected thread vanished").sp,
                None => kernel.main_sp,
            };
            unsafe {
                arch::context::switch(old_sp, new_sp);
            }
        }

        match dispatch {
            Dispatch::Continue => true,
            Dispatch::Suspend => {
                let kernel = unsafe { &*kernel_ptr() };
                let current = kernel.current.expect("resumed without a current thread");
                !matches!(
                    kernel.threads.find(current).map(|t| t.wake_reason),
                    Some(WakeReason::TimedOut)
                )
            }
        }
    })
}

pub fn thread_yield() {
    service(Service::Yield);
}

pub fn thread_sleep(ticks: u32) {
    service(Service::Sleep(ticks));
}

pub fn thread_set_timeout(ticks: u32) -> bool {
    service(Service::SetTimeout(ticks))
}

pub fn thread_wait(channel: u32) -> bool {
    service(Service::Wait(channel))
}

pub fn thread_lock(id: usize) -> bool {
    service(Service::Lock(id))
}

pub fn thread_end() -> ! {
    service(Service::End);
    unreachable!("a terminated thread was resumed");
}

/// Run a single scheduler pass from the idle/main context: reap threads
/// terminated since the last pass, pick the next ready thread, and switch
/// into it if one is ready. Returns once that thread yields, sleeps,
/// blocks, or ends, back into the caller of `scheduler()`. Returns `false`
/// without switching if nothing was ready this pass, letting the caller
/// decide how to idle (`kernel_run` halts the CPU; an embedding
/// application driving its own main loop might instead poll a peripheral).
///
/// # Safety
/// Must be called only from the context that owns the "main" stack (the
/// same context `kernel_run` loops from), after `kernel_init`.
pub fn scheduler() -> bool {
    let switch_args = arch::critical::without_interrupts(|| {
        let kernel = unsafe { &mut *kernel_ptr() };
        kernel.reap(None);
        let next = kernel.scheduler.select(&mut kernel.threads);
        kernel.current = next;
        next.map(|id| {
            let old_sp: *mut usize = &mut kernel.main_sp;
            let new_sp = kernel.threads.find(id).expect("selected thread vanished").sp;
            (old_sp, new_sp)
        })
    });

    match switch_args {
        Some((old_sp, new_sp)) => {
            unsafe {
                arch::context::switch(old_sp, new_sp);
            }
            true
        }
        None => false,
    }
}

/// Run the scheduler in a loop. Never returns: once no thread is ready, it
/// halts the CPU until the next tick or interrupt and tries again.
///
/// # Safety
/// Must be called exactly once, from the context that will become the
/// kernel's idle context, after `kernel_init`.
pub fn kernel_run() -> ! {
    loop {
        if !scheduler() {
            x86_64::instructions::hlt();
        }
    }
}
