//! User-space copy-on-write `fork`, grounded directly on the original
//! `lib/fork.c`: a page-fault handler that duplicates a faulting
//! `PTE_COW` page, a `duppage` that maps each mapped page into the
//! child (copy-on-write if it was writable or already COW), and `fork`
//! itself, which walks `[0, USTACKTOP)` duplicating pages and gives the
//! child its own exception stack.
//!
//! Inspecting a page's current permission bits uses the self-mapped
//! page table at [`UVPT`](crate::abi::UVPT), the same convention
//! `vpt`/`vpd` use in the original — there is no syscall for "what are
//! this page's permission bits", by design (see `SPEC_FULL.md`).

use crate::abi::{
    ENV_RUNNABLE, PFTEMP, PGSIZE, PTE_COW, PTE_P, PTE_U, PTE_W, USTACKTOP, UVPT, UXSTACKTOP,
};
use crate::syscall;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A user page-fault handler: given the faulting address and the
/// hardware error bits, either repairs the fault or panics.
pub type PgfaultHandler = fn(fault_va: u32, err: u32);

static HANDLER: AtomicUsize = AtomicUsize::new(0);

const FEC_WR: u32 = 1 << 1;

/// Registers `handler` as this environment's page-fault handler and
/// wires up the kernel-facing upcall trampoline.
pub fn set_pgfault_handler(handler: PgfaultHandler) {
    HANDLER.store(handler as usize, Ordering::SeqCst);
    let _ = syscall::env_set_pgfault_upcall(0, pgfault_upcall_trampoline as u32);
}

/// Invoked by the kernel-installed upcall path with the raw fault
/// address and hardware error bits; dispatches to the handler
/// registered via [`set_pgfault_handler`].
///
/// # Safety
///
/// Must only be called by the kernel's upcall delivery for this
/// environment, with `fault_va`/`err` taken from the trap that
/// occurred.
#[no_mangle]
pub unsafe extern "C" fn pgfault_upcall_trampoline(fault_va: u32, err: u32) {
    let ptr = HANDLER.load(Ordering::SeqCst);
    if ptr == 0 {
        return;
    }
    // SAFETY: only ever stored from `set_pgfault_handler`, as a valid
    // `PgfaultHandler` fn pointer.
    let handler: PgfaultHandler = unsafe { core::mem::transmute(ptr) };
    handler(fault_va, err);
}

fn pgnum(va: u32) -> usize {
    (va / PGSIZE) as usize
}

fn round_down(va: u32) -> u32 {
    va - (va % PGSIZE)
}

/// Reads the permission bits of the page table entry mapping `va`, via
/// the self-mapped `UVPT`. Returns 0 (no bits, not present) if the
/// backing page directory entry isn't present.
fn vpt_entry(va: u32) -> u32 {
    let pn = pgnum(va);
    let vpt = UVPT as *const u32;
    unsafe { *vpt.add(pn) }
}

/// The standard COW page-fault handler: on a write fault to a
/// `PTE_COW` page, allocates a fresh page, copies the old contents
/// over, and remaps it writable in place of the shared one.
pub fn pgfault(fault_va: u32, err: u32) {
    if err & FEC_WR == 0 {
        panic!("pgfault: fault is not a write: err {:#x}", err);
    }
    if vpt_entry(fault_va) & PTE_COW == 0 {
        panic!("pgfault: fault on a non-cow page: va {:#x}", fault_va);
    }

    let page_va = round_down(fault_va);

    syscall::page_alloc(0, PFTEMP, PTE_U | PTE_W).expect("pgfault: page_alloc failed");
    unsafe {
        core::ptr::copy_nonoverlapping(page_va as *const u8, PFTEMP as *mut u8, PGSIZE as usize);
    }
    syscall::page_map(0, PFTEMP, 0, page_va, PTE_U | PTE_W).expect("pgfault: page_map failed");
    syscall::page_unmap(0, PFTEMP).expect("pgfault: page_unmap failed");
}

/// Maps page `pn` of our own address space into `child` at the same
/// virtual address. If it was writable or already `PTE_COW`, both the
/// child's and our own mapping become `PTE_COW`.
fn duppage(child: u32, pn: usize) {
    let addr = pn as u32 * PGSIZE;
    let entry = vpt_entry(addr);
    let mut perm = PTE_U;
    if entry & (PTE_W | PTE_COW) != 0 {
        perm |= PTE_COW;
    }

    syscall::page_map(0, addr, child, addr, perm).expect("duppage: page_map into child failed");
    if perm & PTE_COW != 0 {
        syscall::page_map(0, addr, 0, addr, perm).expect("duppage: re-map into self failed");
    }
}

/// User-level `fork`. Returns the child's id to the parent, 0 to the
/// child.
pub fn fork() -> u32 {
    set_pgfault_handler(pgfault);

    let child = match syscall::exofork() {
        Ok(id) => id,
        Err(e) => panic!("exofork failed: {e}"),
    };
    if child == 0 {
        return 0;
    }

    let mut addr = 0u32;
    while addr < USTACKTOP {
        if vpt_entry(addr) & PTE_P != 0 {
            duppage(child, pgnum(addr));
        }
        addr += PGSIZE;
    }

    syscall::page_alloc(child, UXSTACKTOP - PGSIZE, PTE_U | PTE_W)
        .expect("page allocation for child exception stack failed");
    syscall::env_set_pgfault_upcall(child, pgfault_upcall_trampoline as u32)
        .expect("setting pgfault upcall failed");

    syscall::env_set_status(child, ENV_RUNNABLE).expect("marking child runnable failed");
    child
}
