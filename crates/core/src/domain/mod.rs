// Domain Layer - Hosts, accounts and the facts read from them

pub mod account;
pub mod diagnostics;
pub mod error;
pub mod family;
pub mod host;

// Re-exports
pub use account::{
    validate_account_name, validate_account_secret, AccountRecord, BackupDirInfo, LiveAccountFact,
};
pub use diagnostics::{
    CpuHardware, CpuMemProcessesUsage, CpuMemUsage, Diagnostic, GpuHardware, HardwareInfo,
    MemoryHardware, ProcessInfo, RemoteSession,
};
pub use error::DomainError;
pub use family::OsFamily;
pub use host::{HostAddr, HostRecord, OsType};
