// src/constants.rs

//! Kernel constants and configuration values.
//!
//! This module centralizes the cross-cutting numeric constants used
//! throughout the environment table, the syscall surface, and user-space
//! address-space layout.

/// Number of environment table slots.
pub const NENV: usize = 1024;

/// Number of CPUs the per-CPU tables are sized for.
pub const NCPU: usize = 8;

/// Page size in bytes, fixed by the target architecture.
pub const PGSIZE: u32 = 4096;

/// Upper bound of user-addressable virtual memory. Every user-supplied
/// address in the syscall surface must be strictly below this.
pub const UTOP: u32 = 0xEF80_0000;

/// Top of the user exception stack (one page, allocated fresh per
/// environment by user-space `fork`).
pub const UXSTACKTOP: u32 = UTOP;

/// Top of the user normal stack.
pub const USTACKTOP: u32 = 0xEEC0_0000;

/// Scratch virtual address used by the copy-on-write page-fault handler.
pub const PFTEMP: u32 = UTOP - PGSIZE;

// --- Page table entry permission bits --------------------------------

/// Present.
pub const PTE_P: u32 = 0x001;
/// Writable.
pub const PTE_W: u32 = 0x002;
/// User-accessible.
pub const PTE_U: u32 = 0x004;
/// Software-available bit reserved by the user-space copy-on-write
/// fork convention to mark a page pending a private copy.
pub const PTE_COW: u32 = 0x800;
/// Software-available bit reserved to mark a page shared between a
/// parent and child beyond the lifetime of copy-on-write (not
/// unshared on either side's next write).
pub const PTE_SHARE: u32 = 0x400;

/// The full set of bits a user program is allowed to request on any
/// syscall that installs or shares a mapping.
pub const PTE_SYSCALL: u32 = PTE_P | PTE_W | PTE_U | PTE_COW | PTE_SHARE;

// --- Error codes (negative, returned directly from syscalls) ---------

/// Argument violates a static precondition.
pub const E_INVAL: i32 = -1;
/// Target environment id does not resolve, or caller lacks authority.
pub const E_BAD_ENV: i32 = -2;
/// Environment table exhausted.
pub const E_NO_FREE_ENV: i32 = -3;
/// Paging backend could not allocate a frame or page-table page.
pub const E_NO_MEM: i32 = -4;
/// Target environment is not currently waiting to receive.
pub const E_IPC_NOT_RECV: i32 = -5;
