// src/lib.rs
//! envkern — an exokernel-style environment subsystem.
//!
//! The [`kernel`] module holds the real logic (environment table,
//! scheduler, IPC rendezvous, syscall dispatch) written against the
//! [`kernel::mm::PagingBackend`] and [`kernel::driver::ConsoleSink`]
//! abstractions so it can be exercised on the host under the
//! `std-tests` feature without real hardware. This crate does not
//! itself construct a bootable kernel image: physical memory
//! management, trap delivery, multiprocessor bring-up, and boot-time
//! address-space construction are all out of scope (see `SPEC_FULL.md`).

#![cfg_attr(not(any(test, feature = "std-tests")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(missing_docs)]

extern crate alloc;

pub mod arch;
pub mod constants;
pub mod errors;
pub mod kernel;
pub mod panic;
pub mod qemu;

use crate::arch::{ArchCpu, Cpu};

#[cfg(not(any(test, feature = "std-tests")))]
use linked_list_allocator::LockedHeap;

/// The kernel heap allocator, backing the environment table's and
/// paging backend's `Vec`/`BTreeMap`/`Arc` allocations.
#[cfg(not(any(test, feature = "std-tests")))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Error initializing the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// `init_heap` was already called once.
    AlreadyInitialized,
}

/// Initializes the global heap allocator over `[heap_start, heap_start + heap_size)`.
///
/// # Safety
///
/// The caller must guarantee that range is valid, mapped, writable
/// memory not used for anything else. Carving out and mapping that
/// range is part of the out-of-scope boot-time address-space
/// construction; this function only hands it to the allocator.
#[cfg(not(any(test, feature = "std-tests")))]
pub unsafe fn init_heap(heap_start: *mut u8, heap_size: usize) -> Result<(), HeapError> {
    use core::sync::atomic::{AtomicBool, Ordering};
    static INITIALIZED: AtomicBool = AtomicBool::new(false);

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(HeapError::AlreadyInitialized);
    }

    // SAFETY: the caller guarantees `heap_start..heap_start + heap_size`
    // is valid, exclusively-owned memory.
    unsafe {
        ALLOCATOR.lock().init(heap_start, heap_size);
    }
    Ok(())
}

/// Prints to the user-facing console (`cputs`'s backing device outside
/// of a running environment, or diagnostic text during boot). Prefer
/// `debug_print!` for output that should never be user-visible.
#[macro_export]
macro_rules! console_print {
    ($($arg:tt)*) => {{
        $crate::kernel::driver::write_console(format_args!($($arg)*));
    }};
}

/// [`console_print!`] with a trailing newline.
#[macro_export]
macro_rules! console_println {
    () => ($crate::console_print!("\n"));
    ($($arg:tt)*) => ($crate::console_print!("{}\n", format_args!($($arg)*)));
}

/// Prints to the emergency debug port only. Used for `syscall_trace`
/// diagnostics and panic output; never reaches the user-facing console.
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {{
        $crate::kernel::driver::write_debug(format_args!($($arg)*));
    }};
}

/// [`debug_print!`] with a trailing newline.
#[macro_export]
macro_rules! debug_println {
    () => ($crate::debug_print!("\n"));
    ($($arg:tt)*) => ($crate::debug_print!("{}\n", format_args!($($arg)*)));
}

/// Halts the CPU in a tight loop. The terminal state of `main` and of
/// the panic handler.
#[inline]
pub fn hlt_loop() -> ! {
    loop {
        ArchCpu::halt();
    }
}

#[cfg(not(any(test, feature = "std-tests")))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    panic::handler::handle_panic(info)
}
