// src/kernel/ipc.rs

//! The synchronous IPC rendezvous (§4.4). `ipc_recv` marks the caller
//! blocked and returns control to the scheduler; it is woken up later by
//! a sender that finds it waiting. `ipc_try_send` is the non-blocking
//! complement. Both are plain state mutations here — the "never returns
//! through its own call frame" behavior is a property of how the
//! syscall dispatcher treats a blocked caller's trapframe, not of this
//! module.

use crate::constants::{PTE_SYSCALL, PTE_U, PTE_W, UTOP};
use crate::errors::{EnvError, IpcError, KernelError, MmError, Result};
use crate::kernel::env::{EnvId, EnvStatus, EnvTable};
use crate::kernel::mm::PagingBackend;

/// Marks `caller` as blocked waiting to receive (`ipc_recv`, §4.2 #13).
/// Returns `Ok(())`; it is the syscall dispatcher's job to recognize
/// this as a suspension point and invoke the scheduler instead of
/// resuming `caller` immediately.
pub fn recv<P: PagingBackend>(envs: &mut EnvTable<P>, caller: EnvId, dstva: u32) -> Result<()> {
    if dstva < UTOP && dstva % crate::constants::PGSIZE != 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }

    let env = envs.get_mut(caller)?;
    env.ipc.recving = true;
    env.ipc.dstva = dstva;
    env.status = EnvStatus::NotRunnable;
    env.trapframe.set_return_register(0);
    Ok(())
}

/// Attempts to deliver `value` (and optionally a page) from `sender` to
/// `envid` (`ipc_try_send`, §4.2 #12). Does not apply the usual
/// capability check: the target consents to cross-address-space
/// mutation simply by being in `ipc_recv`.
#[allow(clippy::too_many_arguments)]
pub fn try_send<P: PagingBackend>(
    envs: &mut EnvTable<P>,
    mm: &mut P,
    sender: EnvId,
    envid: EnvId,
    value: u32,
    srcva: u32,
    perm: u32,
) -> Result<()> {
    let target = envs.resolve(sender, envid, false)?;

    if !envs.get(target)?.ipc.recving {
        return Err(KernelError::Ipc(IpcError::NotReceiving));
    }

    let delivered_perm = resolve_page_transfer(envs, mm, sender, target, srcva, perm)?;

    let target_env = envs.get_mut(target)?;
    target_env.ipc.recving = false;
    target_env.ipc.from = sender;
    target_env.ipc.value = value;
    target_env.ipc.perm = delivered_perm;
    target_env.status = EnvStatus::Runnable;
    target_env.trapframe.set_return_register(0);

    Ok(())
}

/// Implements the page-transfer half of `ipc_try_send`: decides whether
/// a page crosses at all, and if so validates and performs the mapping.
/// Returns the permission bits actually delivered (0 if no page crossed).
fn resolve_page_transfer<P: PagingBackend>(
    envs: &mut EnvTable<P>,
    mm: &mut P,
    sender: EnvId,
    target: EnvId,
    srcva: u32,
    perm: u32,
) -> Result<u32> {
    if srcva >= UTOP {
        return Ok(0);
    }

    let dstva = envs.get(target)?.ipc.dstva;
    if dstva >= UTOP {
        // Receiver declined a page; deliver the value only.
        return Ok(0);
    }

    if srcva % crate::constants::PGSIZE != 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }
    if perm & PTE_U == 0 || perm & !PTE_SYSCALL != 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }

    let sender_env = envs.get(sender)?;
    let sender_space = sender_env
        .address_space
        .as_ref()
        .ok_or(KernelError::Mm(MmError::NotMapped))?;
    let (frame, src_perm) = mm
        .page_lookup(sender_space, srcva)
        .ok_or(KernelError::Mm(MmError::NotMapped))?;

    if perm & PTE_W != 0 && src_perm & PTE_W == 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }

    let target_env = envs.get_mut(target)?;
    let target_space = target_env
        .address_space
        .as_mut()
        .ok_or(KernelError::Mm(MmError::NotMapped))?;
    mm.page_insert(target_space, dstva, frame, perm)
        .map_err(KernelError::Mm)?;

    Ok(perm)
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;
    use crate::kernel::env::EnvType;
    use crate::kernel::mm::mock::MockBackend;

    fn setup() -> (EnvTable<MockBackend>, MockBackend, EnvId, EnvId) {
        let mut envs: EnvTable<MockBackend> = EnvTable::new();
        let mut mm = MockBackend;
        let a = envs.alloc(EnvId::ZERO, EnvType::User).unwrap();
        let b = envs.alloc(EnvId::ZERO, EnvType::User).unwrap();
        envs.get_mut(a).unwrap().address_space = Some(mm.new_address_space().unwrap());
        envs.get_mut(b).unwrap().address_space = Some(mm.new_address_space().unwrap());
        (envs, mm, a, b)
    }

    #[test]
    fn send_without_receiver_fails_not_recv() {
        let (mut envs, mut mm, a, b) = setup();
        let err = try_send(&mut envs, &mut mm, a, b, 42, UTOP, 0).unwrap_err();
        assert_eq!(err, KernelError::Ipc(IpcError::NotReceiving));
    }

    #[test]
    fn value_only_round_trip() {
        let (mut envs, mut mm, a, b) = setup();
        recv(&mut envs, b, UTOP).unwrap();
        try_send(&mut envs, &mut mm, a, b, 42, UTOP, 0).unwrap();

        let recv_env = envs.get(b).unwrap();
        assert_eq!(recv_env.ipc.value, 42);
        assert_eq!(recv_env.ipc.perm, 0);
        assert_eq!(recv_env.ipc.from, a);
        assert!(recv_env.status.is_runnable());
    }

    #[test]
    fn page_transfer_round_trip() {
        let (mut envs, mut mm, a, b) = setup();
        recv(&mut envs, b, 0x1000).unwrap();

        let frame = mm.alloc_zeroed_frame().unwrap();
        frame.write(0, &[0xCC]);
        let space = envs.get_mut(a).unwrap().address_space.as_mut().unwrap();
        mm.page_insert(space, 0x2000, frame, PTE_U | PTE_W).unwrap();

        try_send(&mut envs, &mut mm, a, b, 1, 0x2000, PTE_U | PTE_W).unwrap();

        let recv_space = envs.get(b).unwrap().address_space.as_ref().unwrap();
        let (recv_frame, perm) = mm.page_lookup(recv_space, 0x1000).unwrap();
        assert_eq!(perm, PTE_U | PTE_W);
        let mut buf = [0u8; 1];
        recv_frame.read(0, &mut buf);
        assert_eq!(buf[0], 0xCC);
    }

    #[test]
    fn receiver_opting_out_of_page_still_gets_value() {
        let (mut envs, mut mm, a, b) = setup();
        recv(&mut envs, b, UTOP).unwrap(); // dstva >= UTOP: declines a page

        let frame = mm.alloc_zeroed_frame().unwrap();
        let space = envs.get_mut(a).unwrap().address_space.as_mut().unwrap();
        mm.page_insert(space, 0x2000, frame, PTE_U).unwrap();

        try_send(&mut envs, &mut mm, a, b, 7, 0x2000, PTE_U).unwrap();
        let recv_env = envs.get(b).unwrap();
        assert_eq!(recv_env.ipc.value, 7);
        assert_eq!(recv_env.ipc.perm, 0);
    }

    #[test]
    fn write_permission_requires_writable_source_mapping() {
        let (mut envs, mut mm, a, b) = setup();
        recv(&mut envs, b, 0x1000).unwrap();

        let frame = mm.alloc_zeroed_frame().unwrap();
        let space = envs.get_mut(a).unwrap().address_space.as_mut().unwrap();
        mm.page_insert(space, 0x2000, frame, PTE_U).unwrap(); // read-only

        let err = try_send(&mut envs, &mut mm, a, b, 1, 0x2000, PTE_U | PTE_W).unwrap_err();
        assert_eq!(err, KernelError::Env(EnvError::InvalidArgument));
    }
}
