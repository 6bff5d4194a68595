/*
 * Context Switch Primitive (x86_64)
 *
 * This module implements the single irreducibly architecture-specific
 * operation the scheduler depends on: given a saved stack pointer, give up
 * the current execution context and resume whatever context was previously
 * saved at that stack pointer. A freshly initialized stack dispatches into
 * a supplied entry function on its first switch.
 *
 * Only the callee-saved registers (the System V AMD64 ABI leaves these to
 * the callee to preserve: rbx, rbp, r12-r15) and the return address need
 * saving; everything else is caller-saved and already on the stack or
 * clobbered by the time control reaches here.
 */

use core::arch::naked_asm;

/// Number of bytes the initial frame built by [`init_stack`] occupies.
const INITIAL_FRAME: usize = 8 * core::mem::size_of::<u64>();

/// Save the caller's callee-saved registers below `*old_sp`, load the
/// callee-saved registers for `new_sp`, and return into whatever `ra` was
/// saved there.
///
/// # Safety
/// `new_sp` must point at a stack previously prepared by [`init_stack`] or
/// previously suspended by a prior call to `switch`. `old_sp` must point at
/// a valid, writable `usize` that will later be passed back to `switch` as
/// someone else's `new_sp`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(old_sp: *mut usize, new_sp: usize) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

/// Lay down the initial frame at the top of `stack` so that the first call
/// to [`switch`] targeting the returned stack pointer transfers control into
/// `entry`. `entry` must never return (threads terminate via the Service
/// Gateway's `END` call, not by falling off the end of their function).
///
/// Returns the initial stack pointer to store in the thread record.
pub fn init_stack(stack: &mut [u8], entry: extern "C" fn() -> !) -> usize {
    let top = (stack.as_mut_ptr() as usize + stack.len()) & !0xf;
    let frame = top - INITIAL_FRAME;
    debug_assert!(frame >= stack.as_ptr() as usize, "stack too small for initial frame");

    // `switch`'s epilogue pops r15,r14,r13,r12,rbx,rbp then `ret`s into
    // whatever is above them: that slot carries `entry`, the rest are
    // zeroed callee-saved register values for the thread's first dispatch.
    unsafe {
        let slots = frame as *mut u64;
        core::ptr::write(slots.add(0), 0); // r15
        core::ptr::write(slots.add(1), 0); // r14
        core::ptr::write(slots.add(2), 0); // r13
        core::ptr::write(slots.add(3), 0); // r12
        core::ptr::write(slots.add(4), 0); // rbx
        core::ptr::write(slots.add(5), 0); // rbp
        core::ptr::write(slots.add(6), entry as usize as u64); // return address
    }

    frame
}

/// These tests run the real switch instruction sequence on whatever x86_64
/// host `cargo test` executes on, exactly as it would on the embedded
/// target. They deliberately never drive the full `kernel_run` idle path
/// (which executes `hlt`, a privileged instruction this process cannot
/// issue) and instead drive the primitive directly: a worker stack
/// switches back into the caller a bounded number of times, so the test
/// always returns.
#[cfg(test)]
mod tests {
    use super::*;

    static mut MAIN_SP: usize = 0;
    static mut WORKER_SP: usize = 0;
    static mut COUNTER: usize = 0;

    extern "C" fn count_once_and_return() -> ! {
        unsafe {
            COUNTER += 1;
            switch(&raw mut WORKER_SP, MAIN_SP);
        }
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn switch_transfers_control_and_returns_to_caller() {
        unsafe {
            COUNTER = 0;
        }
        let mut stack = alloc::vec![0u8; 4096].into_boxed_slice();
        let sp = init_stack(&mut stack, count_once_and_return);
        unsafe {
            WORKER_SP = sp;
            switch(&raw mut MAIN_SP, WORKER_SP);
            assert_eq!(COUNTER, 1);
        }
    }

    static mut SEQUENCE: [usize; 2] = [0, 0];
    static mut A_SP: usize = 0;
    static mut B_SP: usize = 0;
    static mut BACK_TO_MAIN_SP: usize = 0;

    extern "C" fn worker_a() -> ! {
        unsafe {
            SEQUENCE[0] = 1;
            switch(&raw mut A_SP, B_SP);
        }
        loop {
            core::hint::spin_loop();
        }
    }

    extern "C" fn worker_b() -> ! {
        unsafe {
            SEQUENCE[1] = 2;
            switch(&raw mut B_SP, BACK_TO_MAIN_SP);
        }
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn switch_chains_through_multiple_stacks_in_order() {
        unsafe {
            SEQUENCE = [0, 0];
        }
        let mut stack_a = alloc::vec![0u8; 4096].into_boxed_slice();
        let mut stack_b = alloc::vec![0u8; 4096].into_boxed_slice();
        let sp_a = init_stack(&mut stack_a, worker_a);
        let sp_b = init_stack(&mut stack_b, worker_b);
        unsafe {
            A_SP = sp_a;
            B_SP = sp_b;
            switch(&raw mut BACK_TO_MAIN_SP, A_SP);
            assert_eq!(SEQUENCE, [1, 2]);
        }
    }
}
