// src/kernel/driver/console.rs

//! Console abstraction layer (§4.8).
//!
//! `cputs`/`cgetc` are written against the [`ConsoleSink`] trait rather
//! than a concrete device, independent of whether the backing hardware
//! is a real UART or, for tests and demo programs, an in-memory buffer.

use alloc::vec::Vec;
use core::fmt;

use crate::arch::x86::port::Port;
use lazy_static::lazy_static;
use spin::Mutex;

/// The external collaborator interface `cputs`/`cgetc` consume.
pub trait ConsoleSink {
    /// Writes every byte to the console. Never fails from the caller's
    /// perspective; a `cputs` whose memory-access check already passed
    /// has nothing further to validate.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Non-blocking read of one byte, or `None` if nothing is pending.
    fn try_read_byte(&mut self) -> Option<u8>;
}

/// COM1 base port, matching this codebase's existing serial convention.
const COM1: u16 = 0x3F8;

/// A 16550-style UART driven through port I/O, for the real target.
pub struct SerialConsole {
    data: Port<u8>,
    line_status: Port<u8>,
}

impl SerialConsole {
    /// # Safety
    ///
    /// The caller must ensure the UART has already been initialized
    /// (line control, baud divisor, FIFO enable) by the boot sequence;
    /// that initialization is out of scope here.
    pub const unsafe fn new() -> Self {
        Self {
            data: Port::new(COM1),
            line_status: Port::new(COM1 + 5),
        }
    }

    fn transmit_empty(&self) -> bool {
        unsafe { self.line_status.read() & 0x20 != 0 }
    }

    fn data_ready(&self) -> bool {
        unsafe { self.line_status.read() & 0x01 != 0 }
    }
}

impl ConsoleSink for SerialConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            while !self.transmit_empty() {}
            unsafe {
                self.data.write(byte);
            }
        }
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        if self.data_ready() {
            Some(unsafe { self.data.read() })
        } else {
            None
        }
    }
}

/// An in-memory console that records every byte written to it and lets
/// tests queue bytes to be "typed". Used by the host test suite and by
/// the host-runnable demo programs.
#[derive(Default)]
pub struct BufferConsole {
    output: Vec<u8>,
    input: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, oldest first.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Queues bytes to be returned by subsequent `try_read_byte` calls,
    /// in order.
    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }
}

impl ConsoleSink for BufferConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        if self.input.is_empty() {
            None
        } else {
            Some(self.input.remove(0))
        }
    }
}

lazy_static! {
    /// The ambient console every `cputs`/`cgetc` call outside of tests
    /// talks to. Kept behind a lock rather than threaded through every
    /// call site because it is genuinely global hardware, unlike the
    /// per-call `Kernel<P, C>` context the syscall dispatcher uses.
    static ref GLOBAL_CONSOLE: Mutex<SerialConsole> = Mutex::new(unsafe { SerialConsole::new() });
}

struct ConsoleWriter;

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        GLOBAL_CONSOLE.lock().write_bytes(s.as_bytes());
        Ok(())
    }
}

struct DebugWriter;

impl fmt::Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            crate::arch::write_debug_byte(byte);
        }
        Ok(())
    }
}

/// Formats `args` onto the global console. Backs the `console_print!` macro.
#[doc(hidden)]
pub fn write_console(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let _ = ConsoleWriter.write_fmt(args);
}

/// Formats `args` onto the emergency debug port. Backs `debug_print!`.
#[doc(hidden)]
pub fn write_debug(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let _ = DebugWriter.write_fmt(args);
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_records_writes_in_order() {
        let mut console = BufferConsole::new();
        console.write_bytes(b"hello");
        console.write_bytes(b" world");
        assert_eq!(console.output(), b"hello world");
    }

    #[test]
    fn buffer_console_replays_queued_input_fifo() {
        let mut console = BufferConsole::new();
        console.feed_input(b"ab");
        assert_eq!(console.try_read_byte(), Some(b'a'));
        assert_eq!(console.try_read_byte(), Some(b'b'));
        assert_eq!(console.try_read_byte(), None);
    }
}
