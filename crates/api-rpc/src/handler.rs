//! RPC Method Handlers
//!
//! Thin translation between wire types and the service layer.

use crate::error::{failure_to_rpc_error, to_rpc_error};
use crate::types::{
    without_secrets, AccountCredentials, AccountDeleteRequest, AccountDeleteResponse,
    AccountRecoverRequest, AccountView, BackupDirRequest, ConnectionTestResponse,
    HostDeleteResponse, HostInfoRequest, HostListRequest, HostListResponse, HostRegistration,
    HostTarget,
};
use hostward_core::application::{AccountService, HostInfo, HostService};
use hostward_core::domain::{BackupDirInfo, HostRecord};
use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

/// RPC Handler with injected services
pub struct RpcHandler {
    hosts: HostService,
    accounts: AccountService,
}

impl RpcHandler {
    pub fn new(hosts: HostService, accounts: AccountService) -> Self {
        Self { hosts, accounts }
    }

    /// host.info.v1
    pub async fn host_info(&self, params: HostInfoRequest) -> Result<HostInfo, ErrorObjectOwned> {
        let info = self
            .hosts
            .host_info(&params.target.addr(), params.options)
            .await
            .map_err(to_rpc_error)?;
        Ok(without_secrets(info))
    }

    /// host.list.v1
    pub async fn host_list(
        &self,
        params: HostListRequest,
    ) -> Result<HostListResponse, ErrorObjectOwned> {
        let (hosts, total) = self
            .hosts
            .host_infos(
                params.from,
                params.size,
                params.keyword.as_deref(),
                params.options,
            )
            .await
            .map_err(to_rpc_error)?;
        debug!(count = hosts.len(), total, "host.list.v1");

        Ok(HostListResponse {
            hosts: hosts.into_iter().map(without_secrets).collect(),
            total,
        })
    }

    /// host.register.v1
    pub async fn register_host(
        &self,
        params: HostRegistration,
    ) -> Result<HostRecord, ErrorObjectOwned> {
        self.hosts
            .register_host(params.into_record())
            .await
            .map_err(failure_to_rpc_error)
    }

    /// host.update.v1
    pub async fn update_host(
        &self,
        params: HostRegistration,
    ) -> Result<HostRecord, ErrorObjectOwned> {
        self.hosts
            .update_host(params.into_record())
            .await
            .map_err(failure_to_rpc_error)
    }

    /// host.delete.v1
    pub async fn delete_host(
        &self,
        params: HostTarget,
    ) -> Result<HostDeleteResponse, ErrorObjectOwned> {
        self.hosts
            .delete_host(&params.addr())
            .await
            .map_err(to_rpc_error)?;

        Ok(HostDeleteResponse {
            address: params.address,
            port: params.port,
            deleted: true,
        })
    }

    /// host.test.v1
    pub async fn connection_test(
        &self,
        params: HostTarget,
    ) -> Result<ConnectionTestResponse, ErrorObjectOwned> {
        let family = self
            .hosts
            .connection_test(&params.addr())
            .await
            .map_err(failure_to_rpc_error)?;

        Ok(ConnectionTestResponse {
            address: params.address,
            port: params.port,
            family,
        })
    }

    /// account.add.v1
    pub async fn add_account(
        &self,
        params: AccountCredentials,
    ) -> Result<AccountView, ErrorObjectOwned> {
        self.accounts
            .add_account(&params.target.addr(), &params.name, &params.secret)
            .await
            .map(AccountView::from)
            .map_err(failure_to_rpc_error)
    }

    /// account.delete.v1
    pub async fn delete_account(
        &self,
        params: AccountDeleteRequest,
    ) -> Result<AccountDeleteResponse, ErrorObjectOwned> {
        let backup_dir = self
            .accounts
            .delete_account(&params.target.addr(), &params.name, params.backup)
            .await
            .map_err(failure_to_rpc_error)?;

        Ok(AccountDeleteResponse {
            name: params.name,
            deleted: true,
            backup_dir,
        })
    }

    /// account.recover.v1
    pub async fn recover_account(
        &self,
        params: AccountRecoverRequest,
    ) -> Result<AccountView, ErrorObjectOwned> {
        self.accounts
            .recover_account(
                &params.target.addr(),
                &params.name,
                &params.secret,
                params.recover_backup,
            )
            .await
            .map(AccountView::from)
            .map_err(failure_to_rpc_error)
    }

    /// account.update.v1
    pub async fn update_account(
        &self,
        params: AccountCredentials,
    ) -> Result<AccountView, ErrorObjectOwned> {
        self.accounts
            .update_account(&params.target.addr(), &params.name, &params.secret)
            .await
            .map(AccountView::from)
            .map_err(failure_to_rpc_error)
    }

    /// account.backup_dir.v1
    pub async fn backup_dir_info(
        &self,
        params: BackupDirRequest,
    ) -> Result<BackupDirInfo, ErrorObjectOwned> {
        self.accounts
            .backup_dir_info(&params.target.addr(), &params.name)
            .await
            .map_err(failure_to_rpc_error)
    }
}
