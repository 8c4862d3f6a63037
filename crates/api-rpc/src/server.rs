//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on a configurable TCP address.

use crate::handler::RpcHandler;
use hostward_core::application::{AccountService, HostService};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9631;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

/// Register one method: parse params, call the handler.
fn register<P, R, F, Fut>(
    module: &mut RpcModule<()>,
    method: &'static str,
    handler: &Arc<RpcHandler>,
    call: F,
) -> Result<(), String>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Clone + Send + 'static,
    F: Fn(Arc<RpcHandler>, P) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ErrorObjectOwned>> + Send + 'static,
{
    let handler = handler.clone();
    module
        .register_async_method(method, move |params, _, _| {
            let handler = handler.clone();
            let call = call.clone();
            async move {
                let req: P = params.parse()?;
                call(handler, req).await
            }
        })
        .map_err(|e| e.to_string())?;
    Ok(())
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, hosts: HostService, accounts: AccountService) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(hosts, accounts)),
        }
    }

    fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());
        let h = &self.handler;

        // Host registry and diagnostics
        register(&mut module, "host.info.v1", h, |h, req| async move {
            h.host_info(req).await
        })?;
        register(&mut module, "host.list.v1", h, |h, req| async move {
            h.host_list(req).await
        })?;
        register(&mut module, "host.register.v1", h, |h, req| async move {
            h.register_host(req).await
        })?;
        register(&mut module, "host.update.v1", h, |h, req| async move {
            h.update_host(req).await
        })?;
        register(&mut module, "host.delete.v1", h, |h, req| async move {
            h.delete_host(req).await
        })?;
        register(&mut module, "host.test.v1", h, |h, req| async move {
            h.connection_test(req).await
        })?;

        // Account lifecycle
        register(&mut module, "account.add.v1", h, |h, req| async move {
            h.add_account(req).await
        })?;
        register(&mut module, "account.delete.v1", h, |h, req| async move {
            h.delete_account(req).await
        })?;
        register(&mut module, "account.recover.v1", h, |h, req| async move {
            h.recover_account(req).await
        })?;
        register(&mut module, "account.update.v1", h, |h, req| async move {
            h.update_account(req).await
        })?;
        register(&mut module, "account.backup_dir.v1", h, |h, req| async move {
            h.backup_dir_info(req).await
        })?;

        Ok(module)
    }

    /// Start the JSON-RPC server.
    ///
    /// Returns the bound address (useful with port 0) and the handle that
    /// stops it.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.module()?;
        info!(addr = %local_addr, methods = module.method_names().count(), "JSON-RPC server started");

        Ok((local_addr, server.start(module)))
    }
}
