// Application Layer - Executor, reconciliation and services

pub mod account_service;
pub mod constants;
pub mod executor;
pub mod host_service;
pub mod reconcile;

// Re-exports
pub use account_service::AccountService;
pub use executor::{BootstrapFailure, BootstrapState, Executor, ExecutorOpener};
pub use host_service::{HostInfo, HostService, LoadOptions};
pub use reconcile::{reconcile, Reconciled};

use crate::port::ExecFailure;

/// Result of operations that act on a host. The failure keeps whatever the
/// host printed so callers can show it.
pub type ServiceResult<T> = std::result::Result<T, ExecFailure>;
