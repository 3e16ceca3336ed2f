//! Read-only view of the kernel's environment table, mirroring
//! `envkern::kernel::env::EnvSnapshot`'s fields by value. The kernel
//! publishes one snapshot per slot at `UENVS`; populating that mapping
//! at boot is out of scope here (see `SPEC_FULL.md`), so `thisenv()`
//! only documents the convention user code is expected to rely on.

use crate::abi::UENVS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EnvType {
    User = 0,
    Idle = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EnvStatusAbi {
    Free = 0,
    Dying = 1,
    Runnable = 2,
    Running = 3,
    NotRunnable = 4,
}

/// `#[repr(C)]` mirror of one `EnvSnapshot` slot as published at `UENVS`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EnvSnapshotAbi {
    pub id: u32,
    pub parent_id: u32,
    pub status: u32,
    pub running_cpu: u32,
    pub env_type: u32,
}

const ENVX_BITS: u32 = 10;
const ENVX_MASK: u32 = (1 << ENVX_BITS) - 1;

fn envid_slot(envid: u32) -> usize {
    (envid & ENVX_MASK) as usize
}

/// Reads the snapshot for `envid` out of the `UENVS` array.
///
/// # Safety
///
/// The caller must ensure `UENVS` has actually been mapped read-only by
/// the boot-time address-space construction (out of scope here) before
/// this is called.
pub unsafe fn env_snapshot(envid: u32) -> EnvSnapshotAbi {
    let slot = envid_slot(envid);
    let base = UENVS as *const EnvSnapshotAbi;
    unsafe { *base.add(slot) }
}

/// Convenience wrapper over [`env_snapshot`] for the caller's own id.
///
/// # Safety
///
/// Same preconditions as [`env_snapshot`].
pub unsafe fn thisenv() -> EnvSnapshotAbi {
    let id = crate::syscall::getenvid();
    unsafe { env_snapshot(id) }
}
