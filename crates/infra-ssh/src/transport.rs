// SSH Transport (russh)
// One connection per host; one PTY channel per command invocation.

use crate::prompt::{strip_prompt_lines, PromptScanner};
use async_trait::async_trait;
use hostward_core::domain::HostAddr;
use hostward_core::port::{ConnectParams, Connector, ExecFailure, Transport};
use hostward_core::{AppError, Result};
use russh::client;
use russh::{ChannelMsg, Disconnect};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Accepts any host key, like `StrictHostKeyChecking=no`.
///
/// Hosts are registered by an operator who already trusts them.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Dials hosts with password authentication
#[derive(Debug, Clone)]
pub struct SshConnector {
    dial_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl SshConnector {
    /// # Arguments
    /// * `dial_timeout` - Bound on TCP connect plus authentication
    /// * `command_timeout` - Bound on one command round-trip; `None` waits
    ///   for the host indefinitely
    pub fn new(dial_timeout: Duration, command_timeout: Option<Duration>) -> Self {
        Self {
            dial_timeout,
            command_timeout,
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Transport>> {
        let addr = &params.addr;
        let config = Arc::new(client::Config::default());

        let dial = async {
            let mut handle =
                client::connect(config, (addr.address.as_str(), addr.port), ClientHandler).await?;
            let accepted = handle
                .authenticate_password(params.account.as_str(), params.secret.as_str())
                .await?;
            Ok::<_, russh::Error>((handle, accepted))
        };

        let handle = match timeout(self.dial_timeout, dial).await {
            Err(_) => {
                return Err(AppError::Connection(format!(
                    "dial {} timed out after {}s",
                    addr,
                    self.dial_timeout.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(AppError::Connection(format!("dial {}: {}", addr, e))),
            Ok(Ok((_, false))) => {
                return Err(AppError::Connection(format!(
                    "authentication rejected for {} on {}",
                    params.account, addr
                )))
            }
            Ok(Ok((handle, true))) => handle,
        };

        info!(host = %addr, account = %params.account, "ssh session established");
        Ok(Arc::new(SshTransport {
            addr: addr.clone(),
            secret: params.secret.clone(),
            handle,
            command_timeout: self.command_timeout,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Authenticated session to one host.
///
/// Channels are independent, so concurrent `send` calls are fine.
pub struct SshTransport {
    addr: HostAddr,
    secret: String,
    handle: client::Handle<ClientHandler>,
    command_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl SshTransport {
    fn channel_error(&self, output: String, what: &str, e: russh::Error) -> ExecFailure {
        ExecFailure::new(
            output,
            AppError::Connection(format!("{} on {}: {}", what, self.addr, e)),
        )
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecFailure::local(AppError::Connection(format!(
                "session to {} already closed",
                self.addr
            ))));
        }
        let line = commands.join("; ");

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.channel_error(String::new(), "open channel", e))?;
        channel
            .request_pty(true, "xterm", 200, 50, 0, 0, &[])
            .await
            .map_err(|e| self.channel_error(String::new(), "request pty", e))?;
        channel
            .exec(true, line.as_str())
            .await
            .map_err(|e| self.channel_error(String::new(), "exec", e))?;

        let mut raw: Vec<u8> = Vec::new();
        let mut exit_status: Option<u32> = None;
        let mut scanner = PromptScanner::new();
        let answer = format!("{}\n", self.secret);

        let pump = async {
            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { ref data } => {
                        raw.extend_from_slice(data);
                        for _ in 0..scanner.feed(data) {
                            debug!(host = %self.addr, "answering sudo prompt");
                            channel.data(answer.as_bytes()).await?;
                        }
                    }
                    ChannelMsg::ExtendedData { ref data, .. } => raw.extend_from_slice(data),
                    ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                    _ => {}
                }
            }
            Ok::<(), russh::Error>(())
        };

        let pumped = match self.command_timeout {
            Some(limit) => match timeout(limit, pump).await {
                Ok(result) => result,
                Err(_) => {
                    let output = strip_prompt_lines(&String::from_utf8_lossy(&raw));
                    return Err(ExecFailure::new(
                        output,
                        AppError::Connection(format!(
                            "command on {} timed out after {}s",
                            self.addr,
                            limit.as_secs()
                        )),
                    ));
                }
            },
            None => pump.await,
        };

        let output = strip_prompt_lines(&String::from_utf8_lossy(&raw));
        if let Err(e) = pumped {
            return Err(self.channel_error(output, "read channel", e));
        }

        match exit_status {
            Some(0) => Ok(output),
            Some(status) => Err(ExecFailure::new(
                output,
                AppError::Connection(format!("command exited with status {}", status)),
            )),
            None => Err(ExecFailure::new(
                output,
                AppError::Connection(format!("channel on {} closed without exit status", self.addr)),
            )),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(host = %self.addr, error = %e, "ssh disconnect failed");
        }
        debug!(host = %self.addr, "ssh session closed");
    }
}
