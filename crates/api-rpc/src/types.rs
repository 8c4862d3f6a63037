//! RPC Request/Response Types
//!
//! Method parameters and results. Secrets are accepted in requests and
//! never appear in responses.

use hostward_core::application::constants::DEFAULT_PAGE_SIZE;
use hostward_core::application::{HostInfo, LoadOptions};
use hostward_core::domain::{
    AccountRecord, BackupDirInfo, Diagnostic, HostAddr, HostRecord, OsFamily, OsType,
};
use serde::{Deserialize, Serialize};

/// Identity of a registered host
#[derive(Debug, Clone, Deserialize)]
pub struct HostTarget {
    pub address: String,
    pub port: u16,
}

impl HostTarget {
    pub fn addr(&self) -> HostAddr {
        HostAddr::new(self.address.clone(), self.port)
    }
}

/// host.info.v1
#[derive(Debug, Deserialize)]
pub struct HostInfoRequest {
    #[serde(flatten)]
    pub target: HostTarget,
    #[serde(default)]
    pub options: LoadOptions,
}

/// host.list.v1
#[derive(Debug, Deserialize)]
pub struct HostListRequest {
    #[serde(default)]
    pub from: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub options: LoadOptions,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize)]
pub struct HostListResponse {
    pub hosts: Vec<HostInfo>,
    pub total: u64,
}

/// host.register.v1 and host.update.v1
#[derive(Debug, Deserialize)]
pub struct HostRegistration {
    pub address: String,
    pub port: u16,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub admin_account: String,
    pub admin_secret: String,
    #[serde(default = "default_os_type")]
    pub os_type: OsType,
}

fn default_os_type() -> OsType {
    OsType::Linux
}

impl HostRegistration {
    pub fn into_record(self) -> HostRecord {
        let mut record = HostRecord::new(
            HostAddr::new(self.address, self.port),
            self.name,
            self.admin_account,
            self.admin_secret,
        );
        record.description = self.description;
        record.os_type = self.os_type;
        record
    }
}

/// host.delete.v1
#[derive(Debug, Clone, Serialize)]
pub struct HostDeleteResponse {
    pub address: String,
    pub port: u16,
    pub deleted: bool,
}

/// host.test.v1
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResponse {
    pub address: String,
    pub port: u16,
    pub family: OsFamily,
}

/// account.add.v1 and account.update.v1
#[derive(Debug, Deserialize)]
pub struct AccountCredentials {
    #[serde(flatten)]
    pub target: HostTarget,
    pub name: String,
    pub secret: String,
}

/// account.delete.v1
#[derive(Debug, Deserialize)]
pub struct AccountDeleteRequest {
    #[serde(flatten)]
    pub target: HostTarget,
    pub name: String,
    #[serde(default)]
    pub backup: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDeleteResponse {
    pub name: String,
    pub deleted: bool,
    pub backup_dir: Option<String>,
}

/// account.recover.v1
#[derive(Debug, Deserialize)]
pub struct AccountRecoverRequest {
    #[serde(flatten)]
    pub target: HostTarget,
    pub name: String,
    pub secret: String,
    #[serde(default)]
    pub recover_backup: bool,
}

/// account.backup_dir.v1
#[derive(Debug, Deserialize)]
pub struct BackupDirRequest {
    #[serde(flatten)]
    pub target: HostTarget,
    pub name: String,
}

/// Account as returned to callers, without its secret
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub uid: u32,
    pub gid: u32,
    pub not_found_on_remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<Diagnostic<BackupDirInfo>>,
}

impl From<AccountRecord> for AccountView {
    fn from(record: AccountRecord) -> Self {
        Self {
            name: record.name,
            address: record.host.address,
            port: record.host.port,
            uid: record.uid,
            gid: record.gid,
            not_found_on_remote: record.not_found_on_remote,
            backup_dir: record.backup_dir,
        }
    }
}

/// Blank every account secret in a host report
pub fn without_secrets(mut info: HostInfo) -> HostInfo {
    if let Some(accounts) = info.accounts.as_mut().and_then(|d| d.value.as_mut()) {
        for account in accounts {
            account.secret.clear();
        }
    }
    info.host.admin_secret.clear();
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registration_defaults() {
        let req: HostRegistration = serde_json::from_value(json!({
            "address": "10.0.0.5",
            "port": 22,
            "name": "gpu-01",
            "admin_account": "ops",
            "admin_secret": "s3cret!"
        }))
        .unwrap();
        let record = req.into_record();
        assert_eq!(record.os_type, OsType::Linux);
        assert_eq!(record.description, "");
        assert_eq!(record.addr, HostAddr::new("10.0.0.5", 22));
    }

    #[test]
    fn test_info_request_flattens_target() {
        let req: HostInfoRequest = serde_json::from_value(json!({
            "address": "10.0.0.5",
            "port": 2222,
            "options": { "with_accounts": true }
        }))
        .unwrap();
        assert_eq!(req.target.addr(), HostAddr::new("10.0.0.5", 2222));
        assert!(req.options.with_accounts);
        assert!(!req.options.with_hardware);
    }

    #[test]
    fn test_list_request_defaults() {
        let req: HostListRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!((req.from, req.size), (0, 20));
        assert!(req.keyword.is_none());
    }

    #[test]
    fn test_account_view_has_no_secret() {
        let mut record = AccountRecord::new(HostAddr::new("h", 22), "alice", "Alice123");
        record.uid = 1000;
        let value = serde_json::to_value(AccountView::from(record)).unwrap();
        assert!(value.get("secret").is_none());
        assert_eq!(value["uid"], 1000);
    }

    #[test]
    fn test_without_secrets() {
        let host = HostRecord::new(HostAddr::new("h", 22), "n", "ops", "adm1n!");
        let mut info = HostInfo::new(&host);
        info.accounts = Some(Diagnostic::loaded(
            "",
            vec![AccountRecord::new(HostAddr::new("h", 22), "alice", "Alice123")],
        ));
        let info = without_secrets(info);
        let accounts = info.accounts.unwrap().value.unwrap();
        assert_eq!(accounts[0].secret, "");
        assert_eq!(info.host.admin_secret, "");
    }
}
