// Transport Port
// One authenticated session to one remote host.

use crate::domain::HostAddr;
use crate::error::AppError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Successful remote operation: the typed value and what the host printed
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub output: String,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn new(output: impl Into<String>, value: T) -> Self {
        Self {
            output: output.into(),
            value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            output: self.output,
            value: f(self.value),
        }
    }
}

/// Failed remote operation.
///
/// `output` holds whatever the host printed before failing so an operator
/// can see it without re-running the command.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ExecFailure {
    pub output: String,
    pub error: AppError,
}

impl ExecFailure {
    pub fn new(output: impl Into<String>, error: AppError) -> Self {
        Self {
            output: output.into(),
            error,
        }
    }

    /// Failure that happened before anything reached the host.
    pub fn local(error: AppError) -> Self {
        Self::new(String::new(), error)
    }

    pub fn context(self, ctx: impl fmt::Display) -> Self {
        Self {
            output: self.output,
            error: self.error.context(ctx),
        }
    }
}

impl From<ExecFailure> for AppError {
    fn from(failure: ExecFailure) -> Self {
        failure.error
    }
}

impl From<AppError> for ExecFailure {
    fn from(error: AppError) -> Self {
        ExecFailure::local(error)
    }
}

/// Result of every executor capability
pub type ExecResult<T> = std::result::Result<Reply<T>, ExecFailure>;

/// Credentials and address for opening a session
#[derive(Clone)]
pub struct ConnectParams {
    pub addr: HostAddr,
    pub account: String,
    pub secret: String,
}

// Manual Debug: the secret must never reach a log line.
impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("addr", &self.addr)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Live session to one host
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run the command lines joined with `"; "` and return the combined output.
    ///
    /// An interactive `sudo` password prompt is answered with the session
    /// secret and stripped from the returned output.
    ///
    /// # Errors
    /// - `AppError::Connection` on channel, I/O or protocol failure, timeout,
    ///   or non-zero exit status. The failure carries the raw partial output.
    async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure>;

    /// Tear down the session. Idempotent.
    async fn close(&self);
}

/// Dials hosts. Connection failures are never retried here.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> crate::Result<Arc<dyn Transport>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Canned response for commands starting with a given prefix
    #[derive(Debug, Clone)]
    enum Script {
        Output(String),
        Fail(String),
    }

    /// Transport that answers from a prefix table and records what it was sent.
    ///
    /// The longest matching prefix wins. Unmatched commands succeed with empty
    /// output. A prefix can be given a sequence of replies that are consumed in
    /// order, the last one repeating.
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<Vec<(String, Vec<Script>)>>,
        sent: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
            self.push(prefix.into(), Script::Output(output.into()));
            self
        }

        pub fn fail_on(self, prefix: impl Into<String>, output: impl Into<String>) -> Self {
            self.push(prefix.into(), Script::Fail(output.into()));
            self
        }

        fn push(&self, prefix: String, script: Script) {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.iter_mut().find(|(p, _)| *p == prefix) {
                Some((_, replies)) => replies.push(script),
                None => scripts.push((prefix, vec![script])),
            }
        }

        /// Every command line sent so far, in order
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_matching(&self, prefix: &str) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter(|line| line.starts_with(prefix))
                .collect()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure> {
            let line = commands.join("; ");
            self.sent.lock().unwrap().push(line.clone());

            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                scripts
                    .iter_mut()
                    .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
                    .max_by_key(|(prefix, _)| prefix.len())
                    .map(|(_, replies)| {
                        if replies.len() > 1 {
                            replies.remove(0)
                        } else {
                            replies[0].clone()
                        }
                    })
            };

            match script {
                Some(Script::Output(output)) => Ok(output),
                Some(Script::Fail(output)) => Err(ExecFailure::new(
                    output,
                    AppError::Connection(format!("scripted failure for [{}]", line)),
                )),
                None => Ok(String::new()),
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Connector handing out pre-built transports per host
    #[derive(Default)]
    pub struct ScriptedConnector {
        transports: Mutex<HashMap<HostAddr, Arc<ScriptedTransport>>>,
        connects: Mutex<Vec<HostAddr>>,
    }

    impl ScriptedConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_host(self, addr: HostAddr, transport: Arc<ScriptedTransport>) -> Self {
            self.transports.lock().unwrap().insert(addr, transport);
            self
        }

        /// Hosts dialed so far, in order
        pub fn connects(&self) -> Vec<HostAddr> {
            self.connects.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, params: &ConnectParams) -> crate::Result<Arc<dyn Transport>> {
            self.connects.lock().unwrap().push(params.addr.clone());
            match self.transports.lock().unwrap().get(&params.addr) {
                Some(transport) => Ok(transport.clone() as Arc<dyn Transport>),
                None => Err(AppError::Connection(format!(
                    "no route to {} as {}",
                    params.addr, params.account
                ))),
            }
        }
    }
}
