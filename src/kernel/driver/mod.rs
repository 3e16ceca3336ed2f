// src/kernel/driver/mod.rs
//! Device driver abstractions.

pub mod console;

pub use console::{write_console, write_debug, BufferConsole, ConsoleSink, SerialConsole};
