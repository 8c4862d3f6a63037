// Port Layer - Interfaces for external dependencies

pub mod account_repository;
pub mod command_catalog;
pub mod host_repository;
pub mod simulated_host; // Stateful Transport fake for tests
pub mod time_provider; // For deterministic testing
pub mod transport;

// Re-exports
pub use account_repository::AccountRepository;
pub use command_catalog::{render, CatalogScope, CommandCatalog, Verb};
pub use host_repository::HostRepository;
pub use time_provider::TimeProvider;
pub use transport::{ConnectParams, Connector, ExecFailure, ExecResult, Reply, Transport};
