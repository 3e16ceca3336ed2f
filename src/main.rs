#![no_std]
#![no_main]

//! Minimal freestanding entry point.
//!
//! Boot-time construction — discovering memory, setting up the initial
//! page tables, loading the first environment — is out of scope here;
//! see `SPEC_FULL.md`. This binary only demonstrates that the crate
//! links as a freestanding target and halts cleanly.

use envkern::hlt_loop;

#[no_mangle]
pub extern "C" fn _start() -> ! {
    hlt_loop()
}
