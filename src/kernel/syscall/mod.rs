// src/kernel/syscall/mod.rs

//! System call dispatch (§4.2). Every syscall takes up to five
//! machine-word arguments and returns a signed word: non-negative on
//! success, one of [`crate::errors::SyscallError`]'s codes otherwise.

use crate::constants::{PGSIZE, PTE_SYSCALL, PTE_U, PTE_W, UTOP};
use crate::debug_println;
use crate::errors::{EnvError, IpcError, KernelError, MmError, Result, SyscallError};
use crate::kernel::cpu::{CpuId, CpuTable};
use crate::kernel::driver::console::ConsoleSink;
use crate::kernel::env::{EnvId, EnvStatus, EnvTable, EnvType};
use crate::kernel::ipc;
use crate::kernel::mm::PagingBackend;
use crate::kernel::sched;

/// Numeric syscall ids, in dispatch-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    Cputs = 0,
    Cgetc = 1,
    Getenvid = 2,
    EnvDestroy = 3,
    Yield = 4,
    Exofork = 5,
    EnvSetStatus = 6,
    PageAlloc = 7,
    PageMap = 8,
    PageUnmap = 9,
    EnvSetPgfaultUpcall = 10,
    IpcTrySend = 11,
    IpcRecv = 12,
    GetCpuid = 13,
}

impl SyscallNumber {
    fn from_u32(n: u32) -> Option<Self> {
        use SyscallNumber::*;
        Some(match n {
            0 => Cputs,
            1 => Cgetc,
            2 => Getenvid,
            3 => EnvDestroy,
            4 => Yield,
            5 => Exofork,
            6 => EnvSetStatus,
            7 => PageAlloc,
            8 => PageMap,
            9 => PageUnmap,
            10 => EnvSetPgfaultUpcall,
            11 => IpcTrySend,
            12 => IpcRecv,
            13 => GetCpuid,
            _ => return None,
        })
    }
}

/// The explicit, non-ambient state container every handler takes as
/// `&mut self` (§4.9), rather than reading ambient globals.
pub struct Kernel<P: PagingBackend, C: ConsoleSink> {
    pub envs: EnvTable<P>,
    pub cpus: CpuTable,
    pub mm: P,
    pub console: C,
}

impl<P: PagingBackend, C: ConsoleSink> Kernel<P, C> {
    pub fn new(mm: P, console: C, cpu_count: usize) -> Self {
        Self {
            envs: EnvTable::new(),
            cpus: CpuTable::new(cpu_count),
            mm,
            console,
        }
    }

    /// Decodes and invokes one syscall on behalf of `caller` running on
    /// `cpu`. Returns the raw signed word a user environment observes as
    /// the syscall return value.
    ///
    /// `ipc_recv` and a blocked `yield` never "return" a useful value
    /// here in the sense of resuming `caller`'s own trapframe normally;
    /// the dispatcher still returns a concrete word (0) for bookkeeping,
    /// but the caller of `dispatch` is expected to have already noticed
    /// the status transition to `NotRunnable`/`Running{elsewhere}` and
    /// invoked the scheduler instead of resuming `caller` directly.
    pub fn dispatch(&mut self, caller: EnvId, cpu: CpuId, syscall_num: u32, args: [u32; 5]) -> i32 {
        let Some(number) = SyscallNumber::from_u32(syscall_num) else {
            #[cfg(feature = "syscall_trace")]
            debug_println!("syscall: unknown id {}", syscall_num);
            return SyscallError::Inval.code();
        };

        #[cfg(feature = "syscall_trace")]
        debug_println!("syscall: {} -> {:?}({:?})", caller, number, args);

        let result = match number {
            SyscallNumber::Cputs => self.sys_cputs(caller, args[0], args[1]).map(|_| 0),
            SyscallNumber::Cgetc => Ok(self.sys_cgetc() as i32),
            SyscallNumber::Getenvid => Ok(caller.raw() as i32),
            SyscallNumber::EnvDestroy => self
                .sys_env_destroy(caller, EnvId::from_raw(args[0]))
                .map(|_| 0),
            SyscallNumber::Yield => {
                self.sys_yield(cpu);
                Ok(0)
            }
            SyscallNumber::Exofork => self.sys_exofork(caller).map(|id| id.raw() as i32),
            SyscallNumber::EnvSetStatus => self
                .sys_env_set_status(caller, EnvId::from_raw(args[0]), args[1])
                .map(|_| 0),
            SyscallNumber::PageAlloc => self
                .sys_page_alloc(caller, EnvId::from_raw(args[0]), args[1], args[2])
                .map(|_| 0),
            SyscallNumber::PageMap => self
                .sys_page_map(
                    caller,
                    EnvId::from_raw(args[0]),
                    args[1],
                    EnvId::from_raw(args[2]),
                    args[3],
                    args[4],
                )
                .map(|_| 0),
            SyscallNumber::PageUnmap => self
                .sys_page_unmap(caller, EnvId::from_raw(args[0]), args[1])
                .map(|_| 0),
            SyscallNumber::EnvSetPgfaultUpcall => self
                .sys_env_set_pgfault_upcall(caller, EnvId::from_raw(args[0]), args[1])
                .map(|_| 0),
            SyscallNumber::IpcTrySend => self
                .sys_ipc_try_send(caller, EnvId::from_raw(args[0]), args[1], args[2], args[3])
                .map(|_| 0),
            SyscallNumber::IpcRecv => self.sys_ipc_recv(caller, args[0]).map(|_| 0),
            SyscallNumber::GetCpuid => Ok(cpu.index() as i32),
        };

        match result {
            Ok(value) => value,
            Err(err) => {
                let code = SyscallError::from(err);
                #[cfg(feature = "syscall_trace")]
                debug_println!("syscall: {} -> error {}", caller, code);
                code.code()
            }
        }
    }

    // --- individual handlers -----------------------------------------

    fn sys_cputs(&mut self, caller: EnvId, ptr: u32, len: u32) -> Result<()> {
        let env = self.envs.get(caller)?;
        let readable = match &env.address_space {
            Some(space) => self.mm.user_range_readable(space, ptr, len),
            None => false,
        };
        if !readable {
            // A bad address in cputs is a caller bug, not a recoverable
            // error: destroy the caller rather than merely failing (§7).
            let _ = self.destroy(caller);
            return Err(KernelError::Env(EnvError::InvalidArgument));
        }

        let mut bytes = alloc::vec![0u8; len as usize];
        let space = self.envs.get(caller)?.address_space.as_ref().unwrap();
        self.mm.copy_from_user(space, ptr, &mut bytes);
        self.console.write_bytes(&bytes);
        Ok(())
    }

    fn sys_cgetc(&mut self) -> i8 {
        self.console.try_read_byte().map(|b| b as i8).unwrap_or(0)
    }

    fn sys_env_destroy(&mut self, caller: EnvId, envid: EnvId) -> Result<()> {
        let target = self.envs.resolve(caller, envid, true)?;
        self.destroy(target)
    }

    fn destroy(&mut self, target: EnvId) -> Result<()> {
        if let Ok(env) = self.envs.get_mut(target) {
            env.status = EnvStatus::Dying;
            // §4.6: a sender racing a receiver blocked in `ipc_recv`
            // that is being destroyed must observe E_BAD_ENV, not a
            // freed slot.
            env.ipc.recving = false;
        }
        if let Some(space) = self.envs.free(target)? {
            self.mm.destroy_address_space(space);
        }
        Ok(())
    }

    fn sys_yield(&mut self, cpu: CpuId) {
        let _ = sched::schedule(&mut self.envs, &mut self.cpus, cpu);
    }

    fn sys_exofork(&mut self, caller: EnvId) -> Result<EnvId> {
        let child = self.envs.alloc(caller, EnvType::User)?;
        let parent_trapframe = self.envs.get(caller)?.trapframe;
        let space = self.mm.new_address_space().map_err(KernelError::Mm)?;

        let env = self.envs.get_mut(child)?;
        env.trapframe = parent_trapframe;
        env.trapframe.set_return_register(0);
        env.address_space = Some(space);
        Ok(child)
    }

    fn sys_env_set_status(&mut self, caller: EnvId, envid: EnvId, status: u32) -> Result<()> {
        let target = self.envs.resolve(caller, envid, true)?;
        let new_status = match status {
            0 => EnvStatus::NotRunnable,
            1 => EnvStatus::Runnable,
            _ => return Err(KernelError::Env(EnvError::InvalidArgument)),
        };
        self.envs.get_mut(target)?.status = new_status;
        Ok(())
    }

    fn sys_page_alloc(&mut self, caller: EnvId, envid: EnvId, va: u32, perm: u32) -> Result<()> {
        let target = self.envs.resolve(caller, envid, true)?;
        validate_user_mapping(va, perm)?;

        let frame = self.mm.alloc_zeroed_frame().map_err(KernelError::Mm)?;
        let env = self.envs.get_mut(target)?;
        let space = env
            .address_space
            .as_mut()
            .ok_or(KernelError::Mm(MmError::InvalidArgument))?;
        self.mm
            .page_insert(space, va, frame, perm)
            .map_err(KernelError::Mm)
    }

    fn sys_page_map(
        &mut self,
        caller: EnvId,
        srcenvid: EnvId,
        srcva: u32,
        dstenvid: EnvId,
        dstva: u32,
        perm: u32,
    ) -> Result<()> {
        let src = self.envs.resolve(caller, srcenvid, true)?;
        let dst = self.envs.resolve(caller, dstenvid, true)?;
        validate_user_mapping(srcva, perm)?;
        validate_user_mapping(dstva, perm)?;

        let src_space = self
            .envs
            .get(src)?
            .address_space
            .as_ref()
            .ok_or(KernelError::Mm(MmError::NotMapped))?;
        let (frame, src_perm) = self
            .mm
            .page_lookup(src_space, srcva)
            .ok_or(KernelError::Mm(MmError::NotMapped))?;

        if perm & PTE_W != 0 && src_perm & PTE_W == 0 {
            return Err(KernelError::Env(EnvError::InvalidArgument));
        }

        let dst_space = self
            .envs
            .get_mut(dst)?
            .address_space
            .as_mut()
            .ok_or(KernelError::Mm(MmError::NotMapped))?;
        self.mm
            .page_insert(dst_space, dstva, frame, perm)
            .map_err(KernelError::Mm)
    }

    fn sys_page_unmap(&mut self, caller: EnvId, envid: EnvId, va: u32) -> Result<()> {
        let target = self.envs.resolve(caller, envid, true)?;
        if va >= UTOP || va % PGSIZE != 0 {
            return Err(KernelError::Env(EnvError::InvalidArgument));
        }
        let env = self.envs.get_mut(target)?;
        if let Some(space) = env.address_space.as_mut() {
            self.mm.page_remove(space, va);
        }
        Ok(())
    }

    fn sys_env_set_pgfault_upcall(&mut self, caller: EnvId, envid: EnvId, func: u32) -> Result<()> {
        let target = self.envs.resolve(caller, envid, true)?;
        // Matches the original's `user_mem_assert(env, func, sizeof(uintptr_t), PTE_U)`:
        // the upcall entry point itself must be readable, word-sized on this target.
        let readable = match &self.envs.get(target)?.address_space {
            Some(space) => self.mm.user_range_readable(space, func, 4),
            None => false,
        };
        if !readable {
            return Err(KernelError::Env(EnvError::InvalidArgument));
        }
        self.envs.get_mut(target)?.pgfault_upcall = func;
        Ok(())
    }

    fn sys_ipc_try_send(
        &mut self,
        caller: EnvId,
        envid: EnvId,
        value: u32,
        srcva: u32,
        perm: u32,
    ) -> Result<()> {
        ipc::try_send(&mut self.envs, &mut self.mm, caller, envid, value, srcva, perm)
    }

    fn sys_ipc_recv(&mut self, caller: EnvId, dstva: u32) -> Result<()> {
        ipc::recv(&mut self.envs, caller, dstva)
    }
}

fn validate_user_mapping(va: u32, perm: u32) -> Result<()> {
    if va >= UTOP || va % PGSIZE != 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }
    if perm & PTE_U == 0 || perm & !PTE_SYSCALL != 0 {
        return Err(KernelError::Env(EnvError::InvalidArgument));
    }
    Ok(())
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;
    use crate::kernel::driver::console::BufferConsole;
    use crate::kernel::mm::mock::MockBackend;

    fn boot_kernel() -> Kernel<MockBackend, BufferConsole> {
        Kernel::new(MockBackend, BufferConsole::new(), 1)
    }

    fn boot_env(kernel: &mut Kernel<MockBackend, BufferConsole>) -> EnvId {
        let id = kernel.envs.alloc(EnvId::ZERO, EnvType::User).unwrap();
        kernel.envs.get_mut(id).unwrap().address_space = Some(kernel.mm.new_address_space().unwrap());
        kernel.envs.get_mut(id).unwrap().status = EnvStatus::Runnable;
        id
    }

    #[test]
    fn unknown_syscall_returns_inval() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        assert_eq!(kernel.dispatch(env, cpu, 255, [0; 5]), SyscallError::Inval.code());
    }

    #[test]
    fn getenvid_returns_callers_raw_id() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(env, cpu, SyscallNumber::Getenvid as u32, [0; 5]);
        assert_eq!(ret as u32, env.raw());
    }

    #[test]
    fn exofork_allocates_distinct_not_runnable_child() {
        let mut kernel = boot_kernel();
        let parent = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(parent, cpu, SyscallNumber::Exofork as u32, [0; 5]);
        assert!(ret >= 0);
        let child = EnvId::from_raw(ret as u32);
        assert_ne!(child, parent);
        assert_eq!(kernel.envs.get(child).unwrap().status, EnvStatus::NotRunnable);
        assert_eq!(kernel.envs.get(child).unwrap().parent_id, parent);
    }

    #[test]
    fn env_set_status_rejects_bad_value() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(env, cpu, SyscallNumber::EnvSetStatus as u32, [0, 9, 0, 0, 0]);
        assert_eq!(ret, SyscallError::Inval.code());
    }

    #[test]
    fn page_alloc_rejects_missing_user_bit() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(
            env,
            cpu,
            SyscallNumber::PageAlloc as u32,
            [0, 0x1000, PTE_W, 0, 0],
        );
        assert_eq!(ret, SyscallError::Inval.code());
    }

    #[test]
    fn page_alloc_then_page_map_shares_the_frame() {
        let mut kernel = boot_kernel();
        let a = boot_env(&mut kernel);
        let b = boot_env(&mut kernel);
        let cpu = CpuId::new(0);

        let ret = kernel.dispatch(
            a,
            cpu,
            SyscallNumber::PageAlloc as u32,
            [0, 0x1000, PTE_U | PTE_W, 0, 0],
        );
        assert_eq!(ret, 0);

        let ret = kernel.dispatch(
            a,
            cpu,
            SyscallNumber::PageMap as u32,
            [0, 0x1000, b.raw(), 0x2000, PTE_U | PTE_W],
        );
        assert_eq!(ret, 0);

        let a_space = kernel.envs.get(a).unwrap().address_space.as_ref().unwrap();
        let b_space = kernel.envs.get(b).unwrap().address_space.as_ref().unwrap();
        let (fa, _) = kernel.mm.page_lookup(a_space, 0x1000).unwrap();
        let (fb, _) = kernel.mm.page_lookup(b_space, 0x2000).unwrap();
        assert!(MockBackend::same_frame(&fa, &fb));
    }

    #[test]
    fn page_map_rejects_unrelated_caller() {
        let mut kernel = boot_kernel();
        let a = boot_env(&mut kernel);
        let stranger = boot_env(&mut kernel);
        let b = boot_env(&mut kernel);
        let cpu = CpuId::new(0);

        kernel.dispatch(a, cpu, SyscallNumber::PageAlloc as u32, [0, 0x1000, PTE_U | PTE_W, 0, 0]);

        let ret = kernel.dispatch(
            stranger,
            cpu,
            SyscallNumber::PageMap as u32,
            [a.raw(), 0x1000, b.raw(), 0x2000, PTE_U],
        );
        assert_eq!(ret, SyscallError::BadEnv.code());
    }

    #[test]
    fn page_unmap_of_unmapped_address_succeeds() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(env, cpu, SyscallNumber::PageUnmap as u32, [0, 0x1000, 0, 0, 0]);
        assert_eq!(ret, 0);
    }

    #[test]
    fn env_destroy_of_non_child_is_rejected() {
        let mut kernel = boot_kernel();
        let a = boot_env(&mut kernel);
        let b = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(a, cpu, SyscallNumber::EnvDestroy as u32, [b.raw(), 0, 0, 0, 0]);
        assert_eq!(ret, SyscallError::BadEnv.code());
    }

    #[test]
    fn ipc_send_then_recv_round_trip_through_dispatch() {
        let mut kernel = boot_kernel();
        let a = boot_env(&mut kernel);
        let b = boot_env(&mut kernel);
        let cpu = CpuId::new(0);

        let ret = kernel.dispatch(b, cpu, SyscallNumber::IpcRecv as u32, [UTOP, 0, 0, 0, 0]);
        assert_eq!(ret, 0);
        assert_eq!(kernel.envs.get(b).unwrap().status, EnvStatus::NotRunnable);

        let ret = kernel.dispatch(
            a,
            cpu,
            SyscallNumber::IpcTrySend as u32,
            [b.raw(), 99, UTOP, 0, 0],
        );
        assert_eq!(ret, 0);
        assert_eq!(kernel.envs.get(b).unwrap().ipc.value, 99);
        assert!(kernel.envs.get(b).unwrap().status.is_runnable());
    }

    #[test]
    fn env_set_pgfault_upcall_rejects_unmapped_func() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        let ret = kernel.dispatch(
            env,
            cpu,
            SyscallNumber::EnvSetPgfaultUpcall as u32,
            [0, 0x4000, 0, 0, 0],
        );
        assert_eq!(ret, SyscallError::Inval.code());
        assert_eq!(kernel.envs.get(env).unwrap().pgfault_upcall, 0);
    }

    #[test]
    fn env_set_pgfault_upcall_records_readable_func() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        kernel.dispatch(
            env,
            cpu,
            SyscallNumber::PageAlloc as u32,
            [0, 0x4000, PTE_U | PTE_W, 0, 0],
        );
        let ret = kernel.dispatch(
            env,
            cpu,
            SyscallNumber::EnvSetPgfaultUpcall as u32,
            [0, 0x4000, 0, 0, 0],
        );
        assert_eq!(ret, 0);
        assert_eq!(kernel.envs.get(env).unwrap().pgfault_upcall, 0x4000);
    }

    #[test]
    fn cputs_writes_caller_bytes_to_console() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        kernel.dispatch(
            env,
            cpu,
            SyscallNumber::PageAlloc as u32,
            [0, 0x4000, PTE_U | PTE_W, 0, 0],
        );
        let space = kernel.envs.get(env).unwrap().address_space.as_ref().unwrap();
        let (frame, _) = kernel.mm.page_lookup(space, 0x4000).unwrap();
        frame.write(0, b"hi");

        let ret = kernel.dispatch(env, cpu, SyscallNumber::Cputs as u32, [0x4000, 2, 0, 0, 0]);
        assert_eq!(ret, 0);
        assert_eq!(kernel.console.output(), b"hi");
    }

    #[test]
    fn get_cpuid_reflects_calling_cpu() {
        let mut kernel = boot_kernel();
        let env = boot_env(&mut kernel);
        let cpu = CpuId::new(0);
        assert_eq!(kernel.dispatch(env, cpu, SyscallNumber::GetCpuid as u32, [0; 5]), 0);
    }
}
