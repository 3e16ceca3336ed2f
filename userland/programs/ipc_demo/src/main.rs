#![no_std]
#![no_main]

//! Demonstrates the synchronous IPC rendezvous: a forked child blocks
//! in `ipc_recv` until the parent's `ipc_try_send` (retried via
//! `sys_yield` until the child is actually receiving) delivers a value.

use core::panic::PanicInfo;
use libuser::{abi::UTOP, println, process, syscall};

#[no_mangle]
#[link_section = ".text.entry"]
pub extern "C" fn _start() -> ! {
    let child = process::spawn();
    if child == 0 {
        println!("child: waiting for a message");
        match syscall::ipc_recv(UTOP) {
            Ok(()) => println!("child: message received"),
            Err(e) => println!("child: ipc_recv failed: {e}"),
        }
    } else {
        println!("parent: sending to child env {child}");
        loop {
            match syscall::ipc_try_send(child, 0xC0FFEE, UTOP, 0) {
                Ok(()) => {
                    println!("parent: delivered");
                    break;
                }
                Err(_) => syscall::sys_yield(),
            }
        }
    }
    process::exit();
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    println!("panic in ipc_demo");
    process::exit();
}
