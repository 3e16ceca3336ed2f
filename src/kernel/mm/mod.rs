// src/kernel/mm/mod.rs

//! The paging backend: the external collaborator interface the
//! environment/syscall/IPC core is written against instead of a concrete
//! page-table implementation (§4.7). Physical memory management, the
//! real page-table walk, and the boot-time kernel/user split are out of
//! scope; this trait is the seam.

pub mod mock;

use crate::errors::MmError;

/// Operations the core needs from a concrete paging implementation.
/// `Frame` is a cheaply cloned, reference-counted physical-page handle
/// so the same page can be shared between address spaces (copy-on-write,
/// IPC page transfer). `AddressSpace` is one environment's page
/// directory.
pub trait PagingBackend {
    type Frame: Clone;
    type AddressSpace;

    /// Allocates a single zeroed physical page.
    fn alloc_zeroed_frame(&mut self) -> Result<Self::Frame, MmError>;

    /// Creates a fresh address space (kernel half shared, user half
    /// empty, per §3).
    fn new_address_space(&mut self) -> Result<Self::AddressSpace, MmError>;

    /// Tears down an address space, releasing every frame it still
    /// references (§4.6).
    fn destroy_address_space(&mut self, space: Self::AddressSpace);

    /// Maps `frame` at `va` in `space` with permission bits `perm`,
    /// replacing any prior mapping at that address.
    fn page_insert(
        &mut self,
        space: &mut Self::AddressSpace,
        va: u32,
        frame: Self::Frame,
        perm: u32,
    ) -> Result<(), MmError>;

    /// Looks up the frame and permission bits mapped at `va`, if any.
    fn page_lookup(&self, space: &Self::AddressSpace, va: u32) -> Option<(Self::Frame, u32)>;

    /// Removes any mapping at `va`. Idempotent: absence of a mapping is
    /// not an error (§4.2, `page_unmap`).
    fn page_remove(&mut self, space: &mut Self::AddressSpace, va: u32);

    /// Whether every page in `[va, va+len)` is mapped and user-readable
    /// in `space`. Backs the `cputs` and `env_set_pgfault_upcall`
    /// address checks (§4.2).
    fn user_range_readable(&self, space: &Self::AddressSpace, va: u32, len: u32) -> bool;

    /// Copies `out.len()` bytes starting at `va` in `space` into `out`.
    /// The caller must have already confirmed the range with
    /// [`Self::user_range_readable`]; a gap encountered mid-copy is a
    /// caller bug and stops the copy early.
    fn copy_from_user(&self, space: &Self::AddressSpace, va: u32, out: &mut [u8]);

    /// Whether two frame handles refer to the same physical page.
    fn same_frame(a: &Self::Frame, b: &Self::Frame) -> bool;
}
