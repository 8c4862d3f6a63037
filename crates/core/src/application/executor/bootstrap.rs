// Executor Bootstrap
// Dialing -> PrivilegeChecked -> FamilyDetected -> Ready, or Failed from any state.

use super::{last_line, run_verb, Executor};
use crate::domain::{HostAddr, HostRecord, OsFamily, OsType};
use crate::error::AppError;
use crate::port::{
    CatalogScope, CommandCatalog, ConnectParams, Connector, ExecFailure, Transport, Verb,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bootstrap progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Dialing,
    PrivilegeChecked,
    FamilyDetected,
    Ready,
    Failed,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapState::Dialing => "dialing",
            BootstrapState::PrivilegeChecked => "privilege check",
            BootstrapState::FamilyDetected => "family detection",
            BootstrapState::Ready => "ready",
            BootstrapState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a host could not be opened.
///
/// `attempted` is the state the machine was trying to reach when it failed.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct BootstrapFailure {
    pub attempted: BootstrapState,
    pub output: String,
    pub error: AppError,
}

impl From<BootstrapFailure> for AppError {
    fn from(failure: BootstrapFailure) -> Self {
        failure.error
    }
}

impl From<BootstrapFailure> for ExecFailure {
    fn from(failure: BootstrapFailure) -> Self {
        ExecFailure::new(failure.output, failure.error)
    }
}

/// The only way to obtain an [`Executor`]
#[derive(Clone)]
pub struct ExecutorOpener {
    connector: Arc<dyn Connector>,
    catalog: Arc<dyn CommandCatalog>,
}

impl ExecutorOpener {
    pub fn new(connector: Arc<dyn Connector>, catalog: Arc<dyn CommandCatalog>) -> Self {
        Self { connector, catalog }
    }

    /// Dial `host`, check sudo privilege and detect the OS family.
    ///
    /// Connection failures are not retried. On failure the transport, if
    /// one was dialed, is closed before returning.
    ///
    /// # Errors
    /// - `AppError::Validation` if the host is not a Linux host
    /// - `AppError::Connection` for dial, privilege or family failures
    /// - `AppError::Config` if a probe template is missing
    pub async fn open(&self, host: &HostRecord) -> Result<Executor, BootstrapFailure> {
        let addr = &host.addr;
        let account = host.admin_account.as_str();

        if host.os_type != OsType::Linux {
            return Err(BootstrapFailure {
                attempted: BootstrapState::Dialing,
                output: String::new(),
                error: AppError::Validation(format!(
                    "host {} is tagged {}, only linux hosts can be opened",
                    addr, host.os_type
                )),
            });
        }

        // Dialing
        let params = ConnectParams {
            addr: addr.clone(),
            account: account.to_string(),
            secret: host.admin_secret.clone(),
        };
        let transport = match self.connector.connect(&params).await {
            Ok(transport) => transport,
            Err(e) => {
                let error = match e {
                    AppError::Connection(msg) => AppError::Connection(format!(
                        "cannot open session to {} as {}: {}",
                        addr, account, msg
                    )),
                    other => other,
                };
                return Err(fail(None, addr, BootstrapState::Dialing, String::new(), error).await);
            }
        };

        // -> PrivilegeChecked
        let output = match self.probe(transport.as_ref(), addr, Verb::SudoPrivilege).await {
            Ok(output) if has_root_privilege(&output) => output,
            Ok(output) => {
                let error = AppError::Connection(format!(
                    "account {} on {} has no sudo privilege",
                    account, addr
                ));
                return Err(fail(Some(transport), addr, BootstrapState::PrivilegeChecked, output, error).await);
            }
            Err((output, cause)) => {
                let error = probe_error(
                    cause,
                    format!("privilege check failed for account {} on {}", account, addr),
                );
                return Err(fail(Some(transport), addr, BootstrapState::PrivilegeChecked, output, error).await);
            }
        };
        transition(addr, BootstrapState::Dialing, BootstrapState::PrivilegeChecked, &output);

        // -> FamilyDetected
        let output = match self.probe(transport.as_ref(), addr, Verb::OsInfo).await {
            Ok(output) => output,
            Err((output, cause)) => {
                let error = probe_error(cause, format!("OS probe failed on {} as {}", addr, account));
                return Err(fail(Some(transport), addr, BootstrapState::FamilyDetected, output, error).await);
            }
        };
        let family = match OsFamily::detect(&output) {
            Some(family) => family,
            None => {
                let error = AppError::Connection(format!(
                    "unsupported OS family on {} (account {})",
                    addr, account
                ));
                return Err(fail(Some(transport), addr, BootstrapState::FamilyDetected, output, error).await);
            }
        };
        transition(addr, BootstrapState::PrivilegeChecked, BootstrapState::FamilyDetected, &output);

        // -> Ready
        transition(addr, BootstrapState::FamilyDetected, BootstrapState::Ready, "");
        info!(host = %addr, family = %family, "executor ready");
        Ok(Executor::new(
            addr.clone(),
            account.to_string(),
            family,
            transport,
            Arc::clone(&self.catalog),
        ))
    }

    /// Run a probe from the common catalog. Config errors pass through as-is.
    async fn probe(
        &self,
        transport: &dyn Transport,
        addr: &HostAddr,
        verb: Verb,
    ) -> Result<String, (String, AppError)> {
        run_verb(transport, self.catalog.as_ref(), addr, CatalogScope::Common, verb, &[])
            .await
            .map_err(|failure| (failure.output, failure.error))
    }
}

/// `sudo id -u` prints 0 once the prompt has been answered.
fn has_root_privilege(output: &str) -> bool {
    last_line(output) == "0"
}

/// A missing template is not the host's fault; keep its kind.
fn probe_error(cause: AppError, what: String) -> AppError {
    if matches!(cause, AppError::Config(_)) {
        cause
    } else {
        AppError::Connection(format!("{}: {}", what, cause))
    }
}

fn transition(addr: &HostAddr, from: BootstrapState, to: BootstrapState, output: &str) {
    debug!(host = %addr, from = %from, to = %to, bytes = output.len(), "bootstrap transition");
}

async fn fail(
    transport: Option<Arc<dyn Transport>>,
    addr: &HostAddr,
    attempted: BootstrapState,
    output: String,
    error: AppError,
) -> BootstrapFailure {
    warn!(host = %addr, attempted = %attempted, error = %error, "bootstrap failed");
    debug!(host = %addr, from = %attempted, to = %BootstrapState::Failed, "bootstrap transition");
    if let Some(transport) = transport {
        transport.close().await;
    }
    BootstrapFailure {
        attempted,
        output,
        error,
    }
}
