/*
 * Tick Source (x86_64, legacy 8259 PIT)
 *
 * Programs the legacy Programmable Interval Timer as the kernel's tick
 * source and installs an interrupt handler that feeds the Tick Engine.
 *
 * This module is optional (feature `pit-timer`). An embedding application
 * that already owns a timer interrupt of its own should leave this feature
 * off and call `crate::kernel::Kernel::on_tick()` directly from its own
 * handler instead.
 */

use core::sync::atomic::{AtomicU8, Ordering};

use lazy_static::lazy_static;
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};

use crate::kernel;

/// Primary PIC is remapped to 0x20..0x28, secondary to 0x28..0x30, as is
/// conventional once the BIOS defaults (which collide with CPU exceptions)
/// are no longer usable.
const PIC_1_OFFSET: u8 = 0x20;
const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// Timer channel 0, connected to IRQ0.
const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// PIT input clock frequency in Hz.
const PIT_BASE_FREQUENCY: u32 = 1_193_182;

pub static PICS: Mutex<ChainedPics> =
    unsafe { Mutex::new(ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET)) };

static TIMER_VECTOR: AtomicU8 = AtomicU8::new(PIC_1_OFFSET);

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt[PIC_1_OFFSET as usize].set_handler_fn(timer_interrupt_handler);
        idt
    };
}

/// Program the PIT to fire at `hz` and install the IDT/PIC plumbing to
/// route that interrupt into the Tick Engine.
///
/// # Safety
/// Must run once, before interrupts are enabled, and the caller must not
/// already have another handler bound to the timer's IRQ vector.
pub unsafe fn init(hz: u32) {
    let divisor = (PIT_BASE_FREQUENCY / hz).clamp(1, u16::MAX as u32) as u16;

    unsafe {
        use x86_64::instructions::port::Port;
        let mut command: Port<u8> = Port::new(PIT_COMMAND);
        let mut data: Port<u8> = Port::new(PIT_CHANNEL0);
        // Channel 0, low/high byte access, mode 3 (square wave generator).
        command.write(0b00_11_011_0u8);
        data.write((divisor & 0xff) as u8);
        data.write((divisor >> 8) as u8);
    }

    IDT.load();
    unsafe {
        PICS.lock().initialize();
    }
    log::debug!("pit timer programmed at {} hz (divisor {})", hz, divisor);
}

extern "x86-interrupt" fn timer_interrupt_handler(_frame: InterruptStackFrame) {
    kernel::with_kernel_mut(|k| k.on_tick());

    unsafe {
        PICS.lock().notify_end_of_interrupt(TIMER_VECTOR.load(Ordering::Relaxed));
    }
}
