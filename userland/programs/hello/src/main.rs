#![no_std]
#![no_main]

use core::panic::PanicInfo;
use libuser::{println, process};

/// Minimal smoke-test program: prints a banner and destroys itself.
#[no_mangle]
#[link_section = ".text.entry"]
pub extern "C" fn _start() -> ! {
    println!("hello from env {}", process::getenvid());
    process::exit();
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    libuser::println!("panic in hello");
    process::exit();
}
