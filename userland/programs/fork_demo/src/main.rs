#![no_std]
#![no_main]

//! Demonstrates copy-on-write `fork`: the parent writes to a shared
//! page, the child observes its own private copy after the write
//! faults it apart.

use core::panic::PanicInfo;
use libuser::{println, process};

static mut COUNTER: u32 = 0;

#[no_mangle]
#[link_section = ".text.entry"]
pub extern "C" fn _start() -> ! {
    let id = process::spawn();
    if id == 0 {
        println!("child: counter starts at {}", unsafe { COUNTER });
        unsafe {
            COUNTER += 1;
        }
        println!("child: bumped counter to {}", unsafe { COUNTER });
    } else {
        println!("parent: forked child env {id}");
        unsafe {
            COUNTER += 100;
        }
        println!("parent: counter is {} (child's write never lands here)", unsafe {
            COUNTER
        });
    }
    process::exit();
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    println!("panic in fork_demo");
    process::exit();
}
