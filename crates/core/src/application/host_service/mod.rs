// Host Service - host registry and per-host diagnostics

mod info;

pub use info::{HostInfo, LoadOptions};

use crate::application::executor::ExecutorOpener;
use crate::application::ServiceResult;
use crate::domain::{HostAddr, HostRecord, OsFamily};
use crate::error::{AppError, Result};
use crate::port::{
    AccountRepository, CommandCatalog, Connector, ExecFailure, HostRepository, TimeProvider,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Host registry and diagnostics.
///
/// Every operation that touches a host opens its own executor and closes
/// it before returning.
#[derive(Clone)]
pub struct HostService {
    hosts: Arc<dyn HostRepository>,
    accounts: Arc<dyn AccountRepository>,
    opener: ExecutorOpener,
    time_provider: Arc<dyn TimeProvider>,
}

impl HostService {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        accounts: Arc<dyn AccountRepository>,
        connector: Arc<dyn Connector>,
        catalog: Arc<dyn CommandCatalog>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            hosts,
            accounts,
            opener: ExecutorOpener::new(connector, catalog),
            time_provider,
        }
    }

    /// Report for one registered host.
    ///
    /// A host that cannot be opened still yields a report, with
    /// `access_failure` set and every section empty.
    ///
    /// # Errors
    /// - `AppError::NotFound` if the host is not registered
    pub async fn host_info(&self, addr: &HostAddr, options: LoadOptions) -> Result<HostInfo> {
        let host = self.require_host(addr).await?;
        Ok(self.load_host_info(&host, options).await)
    }

    /// Reports for a page of hosts, one concurrent task per host.
    ///
    /// Results keep the stored order of the page regardless of which host
    /// answers first. Returns the page and the total number of matches.
    pub async fn host_infos(
        &self,
        from: u32,
        size: u32,
        keyword: Option<&str>,
        options: LoadOptions,
    ) -> Result<(Vec<HostInfo>, u64)> {
        let (hosts, total) = self.hosts.list_hosts(from, size, keyword).await?;
        let results: Arc<Mutex<Vec<(usize, HostInfo)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(hosts.len())));

        let tasks: Vec<_> = hosts
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, host)| {
                let service = self.clone();
                let results = Arc::clone(&results);
                tokio::spawn(async move {
                    let info = service.load_host_info(&host, options).await;
                    results.lock().await.push((idx, info));
                })
            })
            .collect();

        // Join barrier: the call takes as long as the slowest host.
        for (idx, joined) in join_all(tasks).await.into_iter().enumerate() {
            if let Err(e) = joined {
                let host = &hosts[idx];
                error!(host = %host.addr, error = %e, "host task aborted");
                let info = HostInfo::access_failed(host, format!("host task aborted: {}", e));
                results.lock().await.push((idx, info));
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);
        results.sort_by_key(|(idx, _)| *idx);
        Ok((results.into_iter().map(|(_, info)| info).collect(), total))
    }

    /// Register a host after a successful connection test.
    ///
    /// # Errors
    /// - `AppError::Validation` for incomplete records or non-Linux hosts
    /// - `AppError::Conflict` if the identity or name is taken
    /// - `AppError::Connection` if the host cannot be opened; nothing is stored
    ///
    /// A failed connection test keeps whatever the host printed.
    pub async fn register_host(&self, mut host: HostRecord) -> ServiceResult<HostRecord> {
        host.validate().map_err(AppError::from)?;
        if self.hosts.get_host(&host.addr).await?.is_some() {
            return Err(
                AppError::Conflict(format!("host {} is already registered", host.addr)).into(),
            );
        }

        let family = self.test_connection(&host).await?;

        let now = self.time_provider.now_millis();
        host.created_at = now;
        host.updated_at = now;
        self.hosts.create_host(&host).await?;

        info!(host = %host.addr, name = %host.name, family = %family, "host registered");
        Ok(host.redacted())
    }

    /// Replace a host's mutable fields after a connection test with the
    /// new credentials. The (address, port) identity never changes.
    ///
    /// # Errors
    /// - `AppError::NotFound` if the host is not registered
    /// - `AppError::Connection` if the new credentials do not open it
    pub async fn update_host(&self, mut host: HostRecord) -> ServiceResult<HostRecord> {
        host.validate().map_err(AppError::from)?;
        let existing = self.require_host(&host.addr).await?;

        self.test_connection(&host).await?;

        host.created_at = existing.created_at;
        host.updated_at = self.time_provider.now_millis();
        self.hosts.update_host(&host).await?;

        info!(host = %host.addr, name = %host.name, "host updated");
        Ok(host.redacted())
    }

    /// Remove a host and its stored accounts. Nothing on the host changes.
    pub async fn delete_host(&self, addr: &HostAddr) -> Result<()> {
        if !self.hosts.delete_host(addr).await? {
            return Err(AppError::NotFound(format!("host {}", addr)));
        }
        info!(host = %addr, "host deleted");
        Ok(())
    }

    /// Bootstrap a registered host and report its OS family.
    pub async fn connection_test(&self, addr: &HostAddr) -> ServiceResult<OsFamily> {
        let host = self.require_host(addr).await?;
        self.test_connection(&host).await
    }

    async fn require_host(&self, addr: &HostAddr) -> Result<HostRecord> {
        self.hosts
            .get_host(addr)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("host {}", addr)))
    }

    async fn test_connection(&self, host: &HostRecord) -> ServiceResult<OsFamily> {
        self.opener
            .with_executor(host, |executor| async move { executor.family() })
            .await
            .map_err(|failure| {
                let failure = ExecFailure::from(failure);
                log_access_failure(&host.addr, &failure);
                failure
            })
    }

    async fn load_host_info(&self, host: &HostRecord, options: LoadOptions) -> HostInfo {
        let accounts = Arc::clone(&self.accounts);
        let loaded = self
            .opener
            .with_executor(host, |executor| async move {
                let mut info = HostInfo::new(host);
                info::load_sections(&executor, accounts.as_ref(), options, &mut info).await;
                info
            })
            .await;

        match loaded {
            Ok(info) => info,
            Err(failure) => {
                let failure = ExecFailure::from(failure);
                log_access_failure(&host.addr, &failure);
                HostInfo::access_failed(host, failure.error.to_string())
            }
        }
    }
}

fn log_access_failure(addr: &HostAddr, failure: &ExecFailure) {
    warn!(host = %addr, error = %failure.error, "host not accessible");
}

#[cfg(test)]
mod service_test;
