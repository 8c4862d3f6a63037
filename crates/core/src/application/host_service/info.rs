// Host Info - diagnostics and reconciled accounts for one host

use crate::application::constants::BACKUP_LOOKUP_BATCH_SIZE;
use crate::application::executor::Executor;
use crate::application::reconcile::reconcile_and_persist;
use crate::domain::{
    AccountRecord, CpuMemProcessesUsage, Diagnostic, HardwareInfo, HostAddr, HostRecord,
    RemoteSession,
};
use crate::error::AppError;
use crate::port::{AccountRepository, ExecResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Which sections of a host report to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub with_accounts: bool,
    /// Return the live listing only; no reconciliation, nothing stored
    pub with_accounts_ignore_stored: bool,
    /// Look up each account's backup directory; needs `with_accounts`
    pub with_backup_dir_info: bool,
    pub with_hardware: bool,
    pub with_remote_access: bool,
    pub with_cpu_mem_processes: bool,
    pub with_gpu_usages: bool,
}

impl LoadOptions {
    /// Every section
    pub fn all() -> Self {
        Self {
            with_accounts: true,
            with_accounts_ignore_stored: false,
            with_backup_dir_info: true,
            with_hardware: true,
            with_remote_access: true,
            with_cpu_mem_processes: true,
            with_gpu_usages: true,
        }
    }
}

/// Report for one host. Unrequested sections are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    /// The registration, admin secret blanked
    pub host: HostRecord,
    /// Why the host could not be opened; all sections are empty when set
    pub access_failure: Option<String>,
    pub accounts: Option<Diagnostic<Vec<AccountRecord>>>,
    pub hardware: Option<HardwareInfo>,
    pub remote_access: Option<Diagnostic<Vec<RemoteSession>>>,
    pub cpu_mem_processes: Option<Diagnostic<CpuMemProcessesUsage>>,
    pub gpu_usages: Option<Diagnostic<()>>,
}

impl HostInfo {
    pub fn new(host: &HostRecord) -> Self {
        Self {
            host: host.redacted(),
            access_failure: None,
            accounts: None,
            hardware: None,
            remote_access: None,
            cpu_mem_processes: None,
            gpu_usages: None,
        }
    }

    pub fn access_failed(host: &HostRecord, cause: impl Into<String>) -> Self {
        Self {
            access_failure: Some(cause.into()),
            ..Self::new(host)
        }
    }
}

pub(crate) fn log_failure(addr: &HostAddr, what: &str, error: &AppError) {
    if error.is_stable() {
        warn!(host = %addr, section = what, error = %error, "section failed");
    } else {
        error!(host = %addr, section = what, error = %error, "section failed");
    }
}

/// Turn a driver result into a report section, keeping output either way.
pub(crate) fn section<T>(addr: &HostAddr, what: &str, result: ExecResult<T>) -> Diagnostic<T> {
    match result {
        Ok(reply) => Diagnostic::loaded(reply.output, reply.value),
        Err(failure) => {
            log_failure(addr, what, &failure.error);
            Diagnostic::failed(failure.output, failure.error.to_string())
        }
    }
}

/// Load the requested sections over an open executor. Sections are
/// independent; a failing one leaves the rest intact.
pub(crate) async fn load_sections(
    executor: &Executor,
    accounts_repo: &dyn AccountRepository,
    options: LoadOptions,
    info: &mut HostInfo,
) {
    let addr = executor.addr().clone();

    if options.with_accounts {
        info.accounts = Some(load_accounts(executor, accounts_repo, options).await);
    }

    if options.with_hardware {
        info.hardware = Some(HardwareInfo {
            cpu: section(&addr, "cpu hardware", executor.cpu_hardware().await),
            gpus: section(&addr, "gpu hardware", executor.gpu_hardware().await),
            memory: section(&addr, "memory hardware", executor.memory_hardware().await),
        });
    }

    if options.with_remote_access {
        info.remote_access = Some(section(
            &addr,
            "remote access",
            executor.remote_access_usages().await,
        ));
    }

    if options.with_cpu_mem_processes {
        info.cpu_mem_processes = Some(section(
            &addr,
            "cpu/mem/processes",
            executor.cpu_mem_processes_usage().await,
        ));
    }

    if options.with_gpu_usages {
        info.gpu_usages = Some(section(&addr, "gpu usages", executor.gpu_usages().await));
    }
}

async fn load_accounts(
    executor: &Executor,
    accounts_repo: &dyn AccountRepository,
    options: LoadOptions,
) -> Diagnostic<Vec<AccountRecord>> {
    let addr = executor.addr();

    let live = match executor.list_accounts().await {
        Ok(reply) => reply,
        Err(failure) => {
            log_failure(addr, "accounts", &failure.error);
            return Diagnostic::failed(failure.output, failure.error.to_string());
        }
    };

    let mut accounts = if options.with_accounts_ignore_stored {
        live.value
            .into_iter()
            .map(|fact| fact.into_record(addr.clone()))
            .collect()
    } else {
        let stored = match accounts_repo.get_accounts_by_host(addr).await {
            Ok(stored) => stored,
            Err(e) => {
                log_failure(addr, "stored accounts", &e);
                return Diagnostic::failed(live.output, e.to_string());
            }
        };
        reconcile_and_persist(accounts_repo, addr, stored, live.value).await
    };

    if options.with_backup_dir_info {
        load_backup_dirs(executor, &mut accounts).await;
    }

    Diagnostic::loaded(live.output, accounts)
}

/// Backup-dir lookups in fixed-size batches; each batch finishes before
/// the next starts, bounding concurrent channels on the host.
async fn load_backup_dirs(executor: &Executor, accounts: &mut [AccountRecord]) {
    let addr = executor.addr();
    for batch in accounts.chunks_mut(BACKUP_LOOKUP_BATCH_SIZE) {
        let lookups = batch
            .iter()
            .map(|account| executor.backup_dir_info(&account.name));
        let results = join_all(lookups).await;

        for (account, result) in batch.iter_mut().zip(results) {
            account.backup_dir = Some(section(addr, "backup dir", result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LoadOptions = serde_json::from_str(r#"{"with_accounts": true}"#).unwrap();
        assert!(options.with_accounts);
        assert!(!options.with_hardware);
        assert_eq!(
            LoadOptions::default(),
            serde_json::from_str::<LoadOptions>("{}").unwrap()
        );
    }

    #[test]
    fn test_host_info_redacts_secret() {
        let host = HostRecord::new(HostAddr::new("10.0.0.1", 22), "lab", "ops", "hunter22");
        let info = HostInfo::access_failed(&host, "refused");
        assert_eq!(info.host.admin_secret, "");
        assert_eq!(info.access_failure.as_deref(), Some("refused"));
        assert!(info.accounts.is_none());
    }
}
