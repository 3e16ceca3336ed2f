//! The shared syscall ABI. Mirrors `envkern::constants` and
//! `envkern::kernel::syscall::SyscallNumber` by value, not by crate
//! dependency: kernel and user space each carry their own copy of this
//! shared contract, the same way the original C implementation shares
//! `inc/*.h` by textual inclusion on both sides rather than by linking
//! user programs against the kernel binary.

/// Software interrupt vector user programs use to enter the kernel.
pub const T_SYSCALL: u32 = 0x30;

pub const SYS_CPUTS: u32 = 0;
pub const SYS_CGETC: u32 = 1;
pub const SYS_GETENVID: u32 = 2;
pub const SYS_ENV_DESTROY: u32 = 3;
pub const SYS_YIELD: u32 = 4;
pub const SYS_EXOFORK: u32 = 5;
pub const SYS_ENV_SET_STATUS: u32 = 6;
pub const SYS_PAGE_ALLOC: u32 = 7;
pub const SYS_PAGE_MAP: u32 = 8;
pub const SYS_PAGE_UNMAP: u32 = 9;
pub const SYS_ENV_SET_PGFAULT_UPCALL: u32 = 10;
pub const SYS_IPC_TRY_SEND: u32 = 11;
pub const SYS_IPC_RECV: u32 = 12;
pub const SYS_GET_CPUID: u32 = 13;

pub const PGSIZE: u32 = 4096;
pub const UTOP: u32 = 0xEF80_0000;
pub const UXSTACKTOP: u32 = UTOP;
pub const USTACKTOP: u32 = 0xEEC0_0000;
pub const PFTEMP: u32 = UTOP - PGSIZE;

/// Base of the (boot-time-constructed) read-only self-mapped page table,
/// used by `fork` to inspect a page's permission bits without a
/// dedicated syscall, exactly as `uvpt`/`vpt` do in the original fork.c.
/// Populating this mapping is part of the out-of-scope boot sequence;
/// this constant only records where user-space expects to find it.
pub const UVPT: u32 = 0xEF40_0000;
/// Base of the environment-table snapshot array (§6), one
/// [`crate::env::EnvSnapshotAbi`] per slot, read-only to user space.
pub const UENVS: u32 = 0xEF00_0000;

pub const PTE_P: u32 = 0x001;
pub const PTE_W: u32 = 0x002;
pub const PTE_U: u32 = 0x004;
pub const PTE_COW: u32 = 0x800;
pub const PTE_SHARE: u32 = 0x400;

/// Values accepted by `sys_env_set_status`'s `status` argument. Distinct
/// from [`crate::env::EnvStatusAbi`], which mirrors the full status enum
/// as published in the read-only `UENVS` snapshot array.
pub const ENV_NOT_RUNNABLE: u32 = 0;
pub const ENV_RUNNABLE: u32 = 1;

pub const E_INVAL: i32 = -1;
pub const E_BAD_ENV: i32 = -2;
pub const E_NO_FREE_ENV: i32 = -3;
pub const E_NO_MEM: i32 = -4;
pub const E_IPC_NOT_RECV: i32 = -5;
