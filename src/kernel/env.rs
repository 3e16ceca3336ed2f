// src/kernel/env.rs

//! The environment table: the fixed-capacity pool of user-mode execution
//! contexts ("environments") that everything else in this kernel manages.

use alloc::vec::Vec;
use core::fmt;

use crate::arch::Trapframe;
use crate::constants::NENV;
use crate::errors::{EnvError, KernelError, Result};
use crate::kernel::mm::PagingBackend;

/// Number of bits of an [`EnvId`] given to the slot index; the remainder
/// go to the generation counter. Mirrors the slot/generation handle
/// encoding already used elsewhere in this codebase's capability tables.
const ENVX_BITS: u32 = 10;
const ENVX_MASK: u32 = (1 << ENVX_BITS) - 1;

/// Opaque environment identifier: slot index in the low bits, a
/// monotonically increasing generation counter in the high bits. Two
/// environments that reuse the same slot at different times never share
/// an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EnvId(u32);

impl EnvId {
    /// The id every syscall accepts to mean "the caller itself".
    pub const ZERO: EnvId = EnvId(0);

    const fn new(generation: u32, slot: usize) -> Self {
        EnvId(((generation << ENVX_BITS) | (slot as u32 & ENVX_MASK)) as u32)
    }

    /// Raw slot index this id was minted for.
    pub const fn slot(self) -> usize {
        (self.0 & ENVX_MASK) as usize
    }

    /// Raw 32-bit value, as handed to and returned from the syscall ABI.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Reconstructs an id from its raw syscall-ABI representation.
    pub const fn from_raw(raw: u32) -> Self {
        EnvId(raw)
    }

    /// Whether this is the sentinel meaning "the caller itself".
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env[{:#x}]", self.0)
    }
}

/// Whether an environment is a normal user program or the per-CPU idle
/// loop. The scheduler must never dispatch an `Idle` environment except
/// as the last-resort fallback for its own CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvType {
    User,
    Idle,
}

/// Lifecycle state of one environment. Modeled as a tagged variant
/// rather than a raw integer with convention so `cpu` is only ever
/// readable while actually `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvStatus {
    Free,
    Dying,
    Runnable,
    Running { cpu: usize },
    NotRunnable,
}

impl EnvStatus {
    pub const fn is_runnable(self) -> bool {
        matches!(self, EnvStatus::Runnable)
    }

    pub const fn running_cpu(self) -> Option<usize> {
        match self {
            EnvStatus::Running { cpu } => Some(cpu),
            _ => None,
        }
    }
}

/// Pending-receive state for the IPC rendezvous protocol (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct IpcState {
    pub recving: bool,
    pub from: EnvId,
    pub value: u32,
    pub perm: u32,
    pub dstva: u32,
}

impl Default for IpcState {
    fn default() -> Self {
        Self {
            recving: false,
            from: EnvId::ZERO,
            value: 0,
            perm: 0,
            dstva: 0,
        }
    }
}

/// One environment: a user-mode execution context.
pub struct Env<P: PagingBackend> {
    pub id: EnvId,
    pub parent_id: EnvId,
    pub status: EnvStatus,
    pub env_type: EnvType,
    pub trapframe: Trapframe,
    pub address_space: Option<P::AddressSpace>,
    pub pgfault_upcall: u32,
    pub ipc: IpcState,
}

impl<P: PagingBackend> fmt::Debug for Env<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("status", &self.status)
            .field("env_type", &self.env_type)
            .finish()
    }
}

/// A read-only snapshot of one environment's publicly visible state, the
/// shape a user environment observes via [`EnvTable::snapshot`] (§6's
/// read-only `envs` mapping, exposed here as an explicit accessor rather
/// than literal shared memory since the real mapping is part of the
/// out-of-scope boot-time address-space construction).
#[derive(Debug, Clone, Copy)]
pub struct EnvSnapshot {
    pub id: EnvId,
    pub parent_id: EnvId,
    pub status: EnvStatus,
    pub env_type: EnvType,
}

struct Slot<P: PagingBackend> {
    generation: u32,
    env: Option<Env<P>>,
}

/// The fixed-capacity table of `NENV` environment slots.
pub struct EnvTable<P: PagingBackend> {
    slots: Vec<Slot<P>>,
}

impl<P: PagingBackend> EnvTable<P> {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NENV);
        for _ in 0..NENV {
            slots.push(Slot {
                generation: 0,
                env: None,
            });
        }
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Resolves `envid` to a live environment, optionally checking that
    /// `caller` has authority over it (§4.1). `envid == EnvId::ZERO`
    /// always resolves to `caller` itself.
    pub fn resolve(&self, caller: EnvId, envid: EnvId, check: bool) -> Result<EnvId> {
        let target = if envid.is_zero() { caller } else { envid };

        let slot = self
            .slots
            .get(target.slot())
            .ok_or(KernelError::Env(EnvError::BadEnv))?;
        let env = slot.env.as_ref().ok_or(KernelError::Env(EnvError::BadEnv))?;
        if env.id != target {
            return Err(KernelError::Env(EnvError::BadEnv));
        }

        if check && target != caller {
            let caller_env = self.get(caller)?;
            if env.parent_id != caller_env.id {
                return Err(KernelError::Env(EnvError::BadEnv));
            }
        }

        Ok(target)
    }

    pub fn get(&self, id: EnvId) -> Result<&Env<P>> {
        let slot = self
            .slots
            .get(id.slot())
            .ok_or(KernelError::Env(EnvError::BadEnv))?;
        let env = slot.env.as_ref().ok_or(KernelError::Env(EnvError::BadEnv))?;
        if env.id != id {
            return Err(KernelError::Env(EnvError::BadEnv));
        }
        Ok(env)
    }

    pub fn get_mut(&mut self, id: EnvId) -> Result<&mut Env<P>> {
        let slot = self
            .slots
            .get_mut(id.slot())
            .ok_or(KernelError::Env(EnvError::BadEnv))?;
        let env = slot.env.as_mut().ok_or(KernelError::Env(EnvError::BadEnv))?;
        if env.id != id {
            return Err(KernelError::Env(EnvError::BadEnv));
        }
        Ok(env)
    }

    /// Allocates a fresh environment (`FREE -> NOT_RUNNABLE`). The caller
    /// is responsible for installing the address space and copying the
    /// parent's register file, per the calling syscall's semantics.
    pub fn alloc(&mut self, parent_id: EnvId, env_type: EnvType) -> Result<EnvId> {
        let slot_index = self
            .slots
            .iter()
            .position(|s| s.env.is_none())
            .ok_or(KernelError::Env(EnvError::NoFreeEnv))?;

        let slot = &mut self.slots[slot_index];
        slot.generation += 1;
        let id = EnvId::new(slot.generation, slot_index);

        slot.env = Some(Env {
            id,
            parent_id,
            status: EnvStatus::NotRunnable,
            env_type,
            trapframe: Trapframe::fresh(),
            address_space: None,
            pgfault_upcall: 0,
            ipc: IpcState::default(),
        });

        Ok(id)
    }

    /// Reclaims the slot backing `id` (`-> FREE`, per §4.6). Returns the
    /// address space so the caller can hand it to the paging backend for
    /// teardown.
    pub fn free(&mut self, id: EnvId) -> Result<Option<P::AddressSpace>> {
        let slot = self
            .slots
            .get_mut(id.slot())
            .ok_or(KernelError::Env(EnvError::BadEnv))?;
        match slot.env.take() {
            Some(env) if env.id == id => Ok(env.address_space),
            other => {
                slot.env = other;
                Err(KernelError::Env(EnvError::BadEnv))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Env<P>> {
        self.slots.iter().filter_map(|s| s.env.as_ref())
    }

    /// Public, read-only snapshot of one environment (§6).
    pub fn snapshot(&self, id: EnvId) -> Result<EnvSnapshot> {
        let env = self.get(id)?;
        Ok(EnvSnapshot {
            id: env.id,
            parent_id: env.parent_id,
            status: env.status,
            env_type: env.env_type,
        })
    }

    /// Public, read-only snapshot of every live environment (§6).
    pub fn snapshots(&self) -> Vec<EnvSnapshot> {
        self.iter()
            .map(|env| EnvSnapshot {
                id: env.id,
                parent_id: env.parent_id,
                status: env.status,
                env_type: env.env_type,
            })
            .collect()
    }
}

impl<P: PagingBackend> Default for EnvTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
