// Hostward Infrastructure - SQLite Adapter
// Implements: HostRepository, AccountRepository

mod account_repository;
mod connection;
mod error;
mod host_repository;
mod migration;

pub use account_repository::SqliteAccountRepository;
pub use connection::create_pool;
pub use host_repository::SqliteHostRepository;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
