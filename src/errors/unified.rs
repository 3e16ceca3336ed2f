// src/errors/unified.rs

//! Unified error types for the kernel.
//!
//! Every fallible kernel-side operation returns a `Result<T, KernelError>`.
//! `SyscallError` is the public, syscall-facing projection of the same
//! failures onto the five negative error codes of the syscall ABI.

use core::fmt;

use crate::constants::{E_BAD_ENV, E_INVAL, E_IPC_NOT_RECV, E_NO_FREE_ENV, E_NO_MEM};

/// Top-level kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Environment-table subsystem error.
    Env(EnvError),
    /// Paging-backend subsystem error.
    Mm(MmError),
    /// IPC rendezvous error.
    Ipc(IpcError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Env(e) => write!(f, "environment error: {e}"),
            KernelError::Mm(e) => write!(f, "memory error: {e}"),
            KernelError::Ipc(e) => write!(f, "ipc error: {e}"),
        }
    }
}

/// Environment-table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvError {
    /// `envid` does not resolve to a live environment, or the caller
    /// lacks authority over the resolved target.
    BadEnv,
    /// The environment table has no free slot.
    NoFreeEnv,
    /// A syscall argument violates a static precondition (bad address,
    /// misalignment, bad permission bits, bad status value).
    InvalidArgument,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EnvError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EnvError::BadEnv => "environment id does not resolve or caller lacks authority",
            EnvError::NoFreeEnv => "environment table exhausted",
            EnvError::InvalidArgument => "invalid argument",
        }
    }
}

/// Paging-backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Backend could not allocate a frame or page-table page.
    OutOfMemory,
    /// Address/alignment/permission precondition violated.
    InvalidArgument,
    /// No mapping exists at the requested address (only surfaced where
    /// the spec requires it; `page_unmap` treats this as success).
    NotMapped,
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MmError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MmError::OutOfMemory => "out of memory",
            MmError::InvalidArgument => "invalid argument",
            MmError::NotMapped => "address is not mapped",
        }
    }
}

/// IPC rendezvous errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// Target environment is not currently blocked in `ipc_recv`.
    NotReceiving,
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("target environment is not receiving")
    }
}

impl From<EnvError> for KernelError {
    fn from(err: EnvError) -> Self {
        KernelError::Env(err)
    }
}

impl From<MmError> for KernelError {
    fn from(err: MmError) -> Self {
        KernelError::Mm(err)
    }
}

impl From<IpcError> for KernelError {
    fn from(err: IpcError) -> Self {
        KernelError::Ipc(err)
    }
}

/// Result type alias for kernel-internal operations.
pub type Result<T> = core::result::Result<T, KernelError>;

/// Helper trait for error context, mirroring the rest of this codebase's
/// error types.
pub trait ErrorContext {
    /// A detailed, human-readable description of the error.
    fn context(&self) -> &'static str;
}

impl ErrorContext for KernelError {
    fn context(&self) -> &'static str {
        match self {
            KernelError::Env(_) => "error occurred while resolving or mutating an environment",
            KernelError::Mm(_) => "error occurred in the paging backend",
            KernelError::Ipc(_) => "error occurred during an IPC rendezvous",
        }
    }
}

/// The five negative error kinds of the public syscall ABI (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    Inval,
    BadEnv,
    NoFreeEnv,
    NoMem,
    IpcNotRecv,
}

impl SyscallError {
    /// The raw signed word a syscall handler returns for this error.
    pub const fn code(self) -> i32 {
        match self {
            SyscallError::Inval => E_INVAL,
            SyscallError::BadEnv => E_BAD_ENV,
            SyscallError::NoFreeEnv => E_NO_FREE_ENV,
            SyscallError::NoMem => E_NO_MEM,
            SyscallError::IpcNotRecv => E_IPC_NOT_RECV,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            SyscallError::Inval => "E_INVAL",
            SyscallError::BadEnv => "E_BAD_ENV",
            SyscallError::NoFreeEnv => "E_NO_FREE_ENV",
            SyscallError::NoMem => "E_NO_MEM",
            SyscallError::IpcNotRecv => "E_IPC_NOT_RECV",
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

impl From<KernelError> for SyscallError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Env(EnvError::BadEnv) => SyscallError::BadEnv,
            KernelError::Env(EnvError::NoFreeEnv) => SyscallError::NoFreeEnv,
            KernelError::Env(EnvError::InvalidArgument) => SyscallError::Inval,
            KernelError::Mm(MmError::OutOfMemory) => SyscallError::NoMem,
            KernelError::Mm(MmError::InvalidArgument) => SyscallError::Inval,
            KernelError::Mm(MmError::NotMapped) => SyscallError::Inval,
            KernelError::Ipc(IpcError::NotReceiving) => SyscallError::IpcNotRecv,
        }
    }
}

#[cfg(all(test, feature = "std-tests"))]
mod tests {
    use super::*;

    #[test]
    fn syscall_error_codes_match_abi_constants() {
        assert_eq!(SyscallError::Inval.code(), E_INVAL);
        assert_eq!(SyscallError::BadEnv.code(), E_BAD_ENV);
        assert_eq!(SyscallError::NoFreeEnv.code(), E_NO_FREE_ENV);
        assert_eq!(SyscallError::NoMem.code(), E_NO_MEM);
        assert_eq!(SyscallError::IpcNotRecv.code(), E_IPC_NOT_RECV);
    }

    #[test]
    fn kernel_error_conversion_is_lossless_for_each_variant() {
        assert_eq!(SyscallError::from(KernelError::Env(EnvError::BadEnv)).code(), E_BAD_ENV);
        assert_eq!(SyscallError::from(KernelError::Mm(MmError::OutOfMemory)).code(), E_NO_MEM);
        assert_eq!(
            SyscallError::from(KernelError::Ipc(IpcError::NotReceiving)).code(),
            E_IPC_NOT_RECV
        );
    }
}
