//! Userland support library: syscall wrappers and the high-level APIs
//! built on top of them (console I/O, environment lifecycle,
//! copy-on-write `fork`), for programs running under `envkern`.
//!
//! This crate deliberately does not depend on `envkern` itself — see
//! [`abi`] for why.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod abi;
pub mod debug;
pub mod env;
pub mod fork;
pub mod io;
pub mod process;
pub mod syscall;
pub mod sync;

pub use io::{print, println};
pub use process::{exit, getenvid};
