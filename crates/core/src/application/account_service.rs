// Account Service - account lifecycle on registered hosts
// The live account list decides what exists; every write checks it first.

use crate::application::executor::{Executor, ExecutorOpener};
use crate::application::ServiceResult;
use crate::domain::{
    validate_account_name, validate_account_secret, AccountRecord, BackupDirInfo, HostAddr,
    HostRecord, LiveAccountFact,
};
use crate::error::AppError;
use crate::port::{AccountRepository, CommandCatalog, Connector, ExecFailure, HostRepository};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Create, delete, recover and re-key accounts
#[derive(Clone)]
pub struct AccountService {
    hosts: Arc<dyn HostRepository>,
    accounts: Arc<dyn AccountRepository>,
    opener: ExecutorOpener,
}

impl AccountService {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        accounts: Arc<dyn AccountRepository>,
        connector: Arc<dyn Connector>,
        catalog: Arc<dyn CommandCatalog>,
    ) -> Self {
        Self {
            hosts,
            accounts,
            opener: ExecutorOpener::new(connector, catalog),
        }
    }

    /// Create `name` on the host and remember its secret.
    ///
    /// The stored record is written best-effort; the host already has the
    /// account and the next reconciliation picks it up.
    ///
    /// # Errors
    /// - `AppError::Validation` for a bad name or a secret outside the policy
    /// - `AppError::Conflict` if the account already exists on the host
    pub async fn add_account(
        &self,
        addr: &HostAddr,
        name: &str,
        secret: &str,
    ) -> ServiceResult<AccountRecord> {
        validate_credentials(name, secret)?;

        let accounts = Arc::clone(&self.accounts);
        self.on_host(addr, |executor| async move {
            if live_account(&executor, name).await?.is_some() {
                return Err(conflict(addr, name, "already exists"));
            }
            let mut output = executor.add_account(name, secret).await?.output;

            let record = created_record(&executor, addr, name, secret, &mut output).await?;
            if let Err(e) = accounts.upsert_accounts(std::slice::from_ref(&record)).await {
                warn!(host = %addr, account = %name, error = %e, "failed to store new account");
            }

            info!(host = %addr, account = %name, uid = record.uid, "account added");
            Ok(record)
        })
        .await
    }

    /// Delete `name` from the host, moving its home to the backup root first
    /// when `backup` is set. Returns the backup path.
    ///
    /// # Errors
    /// - `AppError::Conflict` if the account does not exist on the host
    /// - `AppError::State` if the home directory cannot be backed up
    pub async fn delete_account(
        &self,
        addr: &HostAddr,
        name: &str,
        backup: bool,
    ) -> ServiceResult<Option<String>> {
        validate_account_name(name).map_err(AppError::from)?;
        self.on_host(addr, |executor| async move {
            if live_account(&executor, name).await?.is_none() {
                return Err(conflict(addr, name, "does not exist"));
            }

            let backup_dir = if backup {
                Some(executor.backup_home_dir(name).await?.value)
            } else {
                None
            };
            executor.delete_account(name).await?;

            info!(host = %addr, account = %name, backup = ?backup_dir, "account deleted");
            Ok(backup_dir)
        })
        .await
    }

    /// Re-create a deleted account, optionally restoring its backed-up home
    /// over the fresh one `useradd` creates.
    ///
    /// # Errors
    /// - `AppError::Conflict` if the account exists on the host
    /// - `AppError::State` if `recover_backup` is set and there is no backup
    pub async fn recover_account(
        &self,
        addr: &HostAddr,
        name: &str,
        secret: &str,
        recover_backup: bool,
    ) -> ServiceResult<AccountRecord> {
        validate_credentials(name, secret)?;

        let accounts = Arc::clone(&self.accounts);
        self.on_host(addr, |executor| async move {
            if live_account(&executor, name).await?.is_some() {
                return Err(conflict(addr, name, "already exists"));
            }
            let mut output = executor.add_account(name, secret).await?.output;
            if recover_backup {
                let recovered = executor.recover_home_dir(name, true).await?;
                output.push_str(&recovered.output);
            }

            let record = created_record(&executor, addr, name, secret, &mut output).await?;
            if let Err(e) = accounts.upsert_accounts(std::slice::from_ref(&record)).await {
                warn!(host = %addr, account = %name, error = %e, "failed to store recovered account");
            }

            info!(host = %addr, account = %name, recover_backup, "account recovered");
            Ok(record)
        })
        .await
    }

    /// Store a new secret for an existing account.
    ///
    /// # Errors
    /// - `AppError::Conflict` if the account does not exist on the host
    /// - `AppError::Database` if the record cannot be stored
    pub async fn update_account(
        &self,
        addr: &HostAddr,
        name: &str,
        secret: &str,
    ) -> ServiceResult<AccountRecord> {
        validate_credentials(name, secret)?;

        let accounts = Arc::clone(&self.accounts);
        self.on_host(addr, |executor| async move {
            let fact = live_account(&executor, name)
                .await?
                .ok_or_else(|| conflict(addr, name, "does not exist"))?;

            let mut record = fact.into_record(addr.clone());
            record.secret = secret.to_string();
            accounts
                .upsert_accounts(std::slice::from_ref(&record))
                .await
                .map_err(|e| e.context(format_args!("store account {} on {}", name, addr)))?;

            info!(host = %addr, account = %name, "account secret updated");
            Ok(record)
        })
        .await
    }

    /// Where `name`'s home would be backed up and what is there now
    pub async fn backup_dir_info(&self, addr: &HostAddr, name: &str) -> ServiceResult<BackupDirInfo> {
        validate_account_name(name).map_err(AppError::from)?;
        self.on_host(addr, |executor| async move {
            Ok(executor.backup_dir_info(name).await?.value)
        })
        .await
    }

    /// Look up the host, open it, and run `f`; the executor is closed
    /// before returning.
    async fn on_host<T, F, Fut>(&self, addr: &HostAddr, f: F) -> ServiceResult<T>
    where
        F: FnOnce(Arc<Executor>) -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let host: HostRecord = self
            .hosts
            .get_host(addr)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("host {}", addr)))?;

        let result = self.opener.with_executor(&host, f).await?;
        if let Err(failure) = &result {
            if failure.error.is_stable() {
                warn!(host = %addr, error = %failure.error, "account operation failed");
            } else {
                error!(host = %addr, error = %failure.error, "account operation failed");
            }
        }
        result
    }
}

fn validate_credentials(name: &str, secret: &str) -> Result<(), ExecFailure> {
    validate_account_name(name).map_err(AppError::from)?;
    validate_account_secret(secret).map_err(AppError::from)?;
    Ok(())
}

fn conflict(addr: &HostAddr, name: &str, what: &str) -> ExecFailure {
    AppError::Conflict(format!("account {} {} on {}", name, what, addr)).into()
}

async fn live_account(executor: &Executor, name: &str) -> Result<Option<LiveAccountFact>, ExecFailure> {
    let listing = executor.list_accounts().await?;
    Ok(listing.value.into_iter().find(|fact| fact.name == name))
}

/// Record for an account just created, with the ids the host assigned.
async fn created_record(
    executor: &Executor,
    addr: &HostAddr,
    name: &str,
    secret: &str,
    output: &mut String,
) -> Result<AccountRecord, ExecFailure> {
    let fact = live_account(executor, name).await.map_err(|failure| {
        output.push_str(&failure.output);
        ExecFailure::new(std::mem::take(output), failure.error)
    })?;

    let mut record = match fact {
        Some(fact) => fact.into_record(addr.clone()),
        None => {
            warn!(host = %addr, account = %name, "created account missing from listing");
            AccountRecord::new(addr.clone(), name, "")
        }
    };
    record.secret = secret.to_string();
    Ok(record)
}
