//! High-level console I/O, built on the `cputs`/`cgetc` syscalls.

use crate::syscall;
use core::fmt;

/// Writes a string to the console via `cputs`.
pub fn print(s: &str) {
    syscall::cputs(s.as_bytes());
}

/// [`print`] with a trailing newline.
pub fn println(s: &str) {
    print(s);
    print("\n");
}

/// Reads one pending console byte via `cgetc`, or `None` if none is
/// pending.
pub fn getc() -> Option<u8> {
    let c = syscall::cgetc();
    if c > 0 { Some(c as u8) } else { None }
}

struct ConsoleWriter;

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        syscall::cputs(s.as_bytes());
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    use fmt::Write;
    let _ = ConsoleWriter.write_fmt(args);
}

/// Formatted console print, in the style of `std::print!`.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        $crate::io::_print(format_args!($($arg)*));
    }};
}

/// [`print!`] with a trailing newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
