// Executor - full capability set bound to one live Transport
//
// Only `ExecutorOpener` constructs an Executor, and only after bootstrap
// reached `Ready`. Capability drivers live in the sibling modules as
// `impl Executor` blocks sharing one command path.

mod accounts;
mod bootstrap;
mod filesystem;
mod hardware;
mod remote_access;
mod usage;

pub use bootstrap::{BootstrapFailure, BootstrapState, ExecutorOpener};

use crate::domain::{HostAddr, HostRecord, OsFamily};
use crate::port::{render, CatalogScope, CommandCatalog, ExecFailure, Transport, Verb};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability set for one host.
///
/// Owned by the flow that opened it. Call [`Executor::close`] when done; if
/// the last handle is dropped without closing (a panicking task, say) the
/// session is torn down in the background.
pub struct Executor {
    addr: HostAddr,
    account: String,
    family: OsFamily,
    transport: Arc<dyn Transport>,
    catalog: Arc<dyn CommandCatalog>,
    closed: AtomicBool,
}

impl Executor {
    fn new(
        addr: HostAddr,
        account: String,
        family: OsFamily,
        transport: Arc<dyn Transport>,
        catalog: Arc<dyn CommandCatalog>,
    ) -> Self {
        Self {
            addr,
            account,
            family,
            transport,
            catalog,
            closed: AtomicBool::new(false),
        }
    }

    pub fn addr(&self) -> &HostAddr {
        &self.addr
    }

    /// Admin account the session is authenticated as
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    /// Render `verb` for this host's family and run it.
    async fn run(&self, verb: Verb, args: &[&str]) -> Result<String, ExecFailure> {
        let scope = CatalogScope::for_verb(verb, self.family);
        run_verb(
            self.transport.as_ref(),
            self.catalog.as_ref(),
            &self.addr,
            scope,
            verb,
            args,
        )
        .await
    }

    /// Close the session. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(host = %self.addr, "closing executor");
        self.transport.close().await;
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        warn!(host = %self.addr, "executor dropped without close");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transport = Arc::clone(&self.transport);
            handle.spawn(async move { transport.close().await });
        }
    }
}

impl ExecutorOpener {
    /// Open `host`, run `f` with the executor, then close it.
    ///
    /// The executor is closed on every path out of `f`; a panic inside `f`
    /// drops the last handle and the session is torn down in the background.
    ///
    /// # Errors
    /// Returns the bootstrap failure if the host could not be opened;
    /// `f` is not called in that case.
    pub async fn with_executor<T, F, Fut>(&self, host: &HostRecord, f: F) -> Result<T, BootstrapFailure>
    where
        F: FnOnce(Arc<Executor>) -> Fut,
        Fut: Future<Output = T>,
    {
        let executor = Arc::new(self.open(host).await?);
        let value = f(Arc::clone(&executor)).await;
        executor.close().await;
        Ok(value)
    }
}

/// Shared command path for bootstrap probes and drivers.
///
/// The rendered line is not logged: some verbs carry secrets.
async fn run_verb(
    transport: &dyn Transport,
    catalog: &dyn CommandCatalog,
    addr: &HostAddr,
    scope: CatalogScope,
    verb: Verb,
    args: &[&str],
) -> Result<String, ExecFailure> {
    let template = catalog.template(scope, verb).await?;
    let line = render(&template, args)?;

    debug!(host = %addr, verb = %verb, "sending command");
    let output = transport
        .send(&[line])
        .await
        .map_err(|failure| failure.context(format_args!("{} on {}", verb, addr)))?;
    debug!(host = %addr, verb = %verb, bytes = output.len(), "command finished");
    Ok(output)
}

/// Lines of command output, whatever the line ending.
pub(crate) fn output_lines(output: &str) -> impl Iterator<Item = &str> {
    output.split(['\n', '\r']).filter(|line| !line.is_empty())
}

/// Last non-blank line, trimmed
pub(crate) fn last_line(output: &str) -> &str {
    output_lines(output)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("")
}


#[cfg(test)]
mod tests {
    use super::test_support::executor_with;
    use super::*;
    use crate::port::transport::mocks::ScriptedTransport;

    #[test]
    fn test_output_lines_any_ending() {
        let lines: Vec<&str> = output_lines("a\r\nb\rc\n\nd").collect();
        assert_eq!(lines, vec!["a", "b", "c", "d"]);
        assert_eq!(last_line("1\r\n  \r\n"), "1");
        assert_eq!(last_line(""), "");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let executor = executor_with(transport.clone());
        executor.close().await;
        executor.close().await;
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_drop_without_close_still_closes() {
        let transport = Arc::new(ScriptedTransport::new());
        drop(executor_with(transport.clone()));
        tokio::task::yield_now().await;
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_with_executor_closes_after_use() {
        use crate::port::command_catalog::mocks::StaticCatalog;
        use crate::port::transport::mocks::ScriptedConnector;

        let host = HostRecord::new(HostAddr::new("10.0.0.8", 22), "lab-8", "ops", "pw");
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("sudo id -u", "0")
                .on("cat /etc/os-release", "ID=centos"),
        );
        let connector = ScriptedConnector::new().with_host(host.addr.clone(), transport.clone());
        let opener = ExecutorOpener::new(Arc::new(connector), Arc::new(StaticCatalog::linux()));

        let family = opener
            .with_executor(&host, |executor| async move { executor.family() })
            .await
            .unwrap();
        assert_eq!(family, OsFamily::CentOS);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_failure_names_verb_and_host() {
        let transport = Arc::new(ScriptedTransport::new().fail_on("lscpu", "partial"));
        let executor = executor_with(transport);
        let failure = executor.run(Verb::Lscpu, &[]).await.unwrap_err();
        assert_eq!(failure.output, "partial");
        assert!(failure.error.to_string().contains("lscpu on 10.0.0.7:22"));
        executor.close().await;
    }
}
