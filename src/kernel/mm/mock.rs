// src/kernel/mm/mock.rs

//! An in-memory, heap-backed [`PagingBackend`] used by the host test
//! suite and by the host-runnable demo programs. Frames are
//! reference-counted so COW sharing and IPC page transfer are directly
//! observable: two `Frame` handles compare equal (via [`PagingBackend::same_frame`])
//! exactly when they were produced by the same allocation or by sharing
//! an existing mapping.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

use crate::constants::PGSIZE;
use crate::errors::MmError;
use crate::kernel::mm::PagingBackend;

/// Backing storage for one physical page.
pub struct FrameData(pub Mutex<[u8; PGSIZE as usize]>);

/// A reference-counted handle to one mock physical page.
#[derive(Clone)]
pub struct MockFrame(Arc<FrameData>);

impl MockFrame {
    pub fn read(&self, offset: usize, out: &mut [u8]) {
        let guard = self.0 .0.lock();
        let end = (offset + out.len()).min(guard.len());
        let start = offset.min(end);
        out[..end - start].copy_from_slice(&guard[start..end]);
    }

    pub fn write(&self, offset: usize, data: &[u8]) {
        let mut guard = self.0 .0.lock();
        let end = (offset + data.len()).min(guard.len());
        let start = offset.min(end);
        guard[start..end].copy_from_slice(&data[..end - start]);
    }
}

/// One mock environment's address space: a sparse map from page-aligned
/// virtual address to (frame, permission bits).
#[derive(Default)]
pub struct MockAddressSpace {
    mappings: BTreeMap<u32, (MockFrame, u32)>,
}

/// A backend with no real paging hardware underneath it; every
/// allocation is a heap-backed byte array. Suitable only for host tests
/// and the demo programs, never for the real target.
#[derive(Default)]
pub struct MockBackend;

impl PagingBackend for MockBackend {
    type Frame = MockFrame;
    type AddressSpace = MockAddressSpace;

    fn alloc_zeroed_frame(&mut self) -> Result<Self::Frame, MmError> {
        Ok(MockFrame(Arc::new(FrameData(Mutex::new(
            [0u8; PGSIZE as usize],
        )))))
    }

    fn new_address_space(&mut self) -> Result<Self::AddressSpace, MmError> {
        Ok(MockAddressSpace::default())
    }

    fn destroy_address_space(&mut self, mut space: Self::AddressSpace) {
        space.mappings.clear();
    }

    fn page_insert(
        &mut self,
        space: &mut Self::AddressSpace,
        va: u32,
        frame: Self::Frame,
        perm: u32,
    ) -> Result<(), MmError> {
        space.mappings.insert(va, (frame, perm));
        Ok(())
    }

    fn page_lookup(&self, space: &Self::AddressSpace, va: u32) -> Option<(Self::Frame, u32)> {
        space.mappings.get(&va).cloned()
    }

    fn page_remove(&mut self, space: &mut Self::AddressSpace, va: u32) {
        space.mappings.remove(&va);
    }

    fn user_range_readable(&self, space: &Self::AddressSpace, va: u32, len: u32) -> bool {
        if len == 0 {
            return true;
        }
        let first_page = va - (va % PGSIZE);
        let last_byte = va.saturating_add(len - 1);
        let last_page = last_byte - (last_byte % PGSIZE);
        let mut page = first_page;
        loop {
            if !space.mappings.contains_key(&page) {
                return false;
            }
            if page == last_page {
                break;
            }
            page += PGSIZE;
        }
        true
    }

    fn copy_from_user(&self, space: &Self::AddressSpace, va: u32, out: &mut [u8]) {
        let mut copied = 0usize;
        while copied < out.len() {
            let cur = va + copied as u32;
            let page = cur - (cur % PGSIZE);
            let offset = (cur - page) as usize;
            let Some((frame, _)) = space.mappings.get(&page) else {
                break;
            };
            let n = (PGSIZE as usize - offset).min(out.len() - copied);
            frame.read(offset, &mut out[copied..copied + n]);
            copied += n;
        }
    }

    fn same_frame(a: &Self::Frame, b: &Self::Frame) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;
    use crate::constants::{PTE_U, PTE_W};

    #[test]
    fn shared_frame_is_visible_through_both_mappings() {
        let mut backend = MockBackend;
        let mut parent = backend.new_address_space().unwrap();
        let mut child = backend.new_address_space().unwrap();

        let frame = backend.alloc_zeroed_frame().unwrap();
        frame.write(0, &[0xAA]);

        backend
            .page_insert(&mut parent, 0x1000, frame.clone(), PTE_U | PTE_W)
            .unwrap();
        backend
            .page_insert(&mut child, 0x2000, frame.clone(), PTE_U | PTE_W)
            .unwrap();

        let (from_parent, _) = backend.page_lookup(&parent, 0x1000).unwrap();
        let (from_child, _) = backend.page_lookup(&child, 0x2000).unwrap();
        assert!(MockBackend::same_frame(&from_parent, &from_child));

        let mut buf = [0u8; 1];
        from_child.read(0, &mut buf);
        assert_eq!(buf[0], 0xAA);
    }

    #[test]
    fn user_range_readable_requires_every_page_mapped() {
        let mut backend = MockBackend;
        let mut space = backend.new_address_space().unwrap();
        let frame = backend.alloc_zeroed_frame().unwrap();
        backend.page_insert(&mut space, 0x1000, frame, PTE_U).unwrap();

        assert!(backend.user_range_readable(&space, 0x1000, 10));
        assert!(!backend.user_range_readable(&space, 0x1000, PGSIZE + 10));
    }

    #[test]
    fn page_remove_is_idempotent() {
        let mut backend = MockBackend;
        let mut space = backend.new_address_space().unwrap();
        backend.page_remove(&mut space, 0x3000);
        backend.page_remove(&mut space, 0x3000);
        assert!(backend.page_lookup(&space, 0x3000).is_none());
    }
}
