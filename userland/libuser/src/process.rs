//! Environment lifecycle API, built on `exofork`/`env_set_status`/
//! `env_destroy` rather than POSIX `fork`/`exec`/`wait`.

use crate::fork;
use crate::syscall;

/// This environment's id.
pub fn getenvid() -> u32 {
    syscall::getenvid()
}

/// Destroys this environment.
pub fn exit() -> ! {
    let _ = syscall::env_destroy(0);
    // env_destroy(0) never returns control to us; this is unreachable
    // in a correctly functioning kernel.
    loop {
        syscall::sys_yield();
    }
}

/// Copy-on-write fork. Returns the child's id to the parent, 0 to the
/// child.
pub fn spawn() -> u32 {
    fork::fork()
}
