/*
 * Serial Log Sink (feature `serial-log`)
 *
 * A ready-made `log::Log` backend over a 16550 UART, for applications that
 * don't already have their own logging destination. Not installed
 * automatically; call `init()` once before the first log record.
 */

use log::{LevelFilter, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

const COM1: u16 = 0x3F8;

static SERIAL: Mutex<Option<SerialPort>> = Mutex::new(None);

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        use core::fmt::Write;
        if let Some(port) = SERIAL.lock().as_mut() {
            let _ = writeln!(port, "[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Initialize the COM1 serial port and install it as the global logger.
///
/// # Safety
/// Must run once, before interrupts are enabled, on a machine where COM1
/// is present and not already owned by another driver.
pub unsafe fn init(level: LevelFilter) {
    let mut port = unsafe { SerialPort::new(COM1) };
    port.init();
    *SERIAL.lock() = Some(port);
    log::set_logger(&LOGGER).expect("logger already set");
    log::set_max_level(level);
}
