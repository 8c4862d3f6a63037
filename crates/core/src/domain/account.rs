// Account Domain Model

use crate::domain::{Diagnostic, DomainError, HostAddr};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Persisted, possibly stale account on a host.
///
/// `uid`, `gid` and `not_found_on_remote` are only ever written by a
/// reconciliation pass against a live executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub name: String,
    pub secret: String,
    pub host: HostAddr,
    pub uid: u32,
    pub gid: u32,
    pub not_found_on_remote: bool,
    /// Loaded on request, never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<Diagnostic<BackupDirInfo>>,
}

impl AccountRecord {
    pub fn new(host: HostAddr, name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            host,
            uid: 0,
            gid: 0,
            not_found_on_remote: false,
            backup_dir: None,
        }
    }
}

/// Account as reported by the remote host right now. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAccountFact {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    #[serde(default)]
    pub secret: String,
}

impl LiveAccountFact {
    pub fn into_record(self, host: HostAddr) -> AccountRecord {
        AccountRecord {
            name: self.name,
            secret: self.secret,
            host,
            uid: self.uid,
            gid: self.gid,
            not_found_on_remote: false,
            backup_dir: None,
        }
    }
}

/// Where an account's home directory would be backed up, and what is there now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDirInfo {
    pub backup_dir: String,
    pub path_exists: bool,
    pub dir_exists: bool,
}

fn secret_policy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][0-9a-zA-Z~!@#$%^&*?]{5,14}$").expect("static regex"))
}

/// Account secrets start with a letter and are 6 to 15 characters long.
pub fn validate_account_secret(secret: &str) -> Result<(), DomainError> {
    if secret_policy().is_match(secret) {
        Ok(())
    } else {
        Err(DomainError::InvalidSecret(
            "must start with a letter and contain 6-15 letters, digits or ~!@#$%^&*?".to_string(),
        ))
    }
}

/// Account names end up inside shell command lines; keep them to the
/// portable POSIX user name set.
pub fn validate_account_name(name: &str) -> Result<(), DomainError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("static regex"));
    if re.is_match(name) {
        Ok(())
    } else {
        Err(DomainError::ValidationError(format!(
            "invalid account name: {:?}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_policy() {
        assert!(validate_account_secret("abc123").is_ok());
        assert!(validate_account_secret("Pa$$w0rd!").is_ok());
        assert!(validate_account_secret("1abcdef").is_err()); // leading digit
        assert!(validate_account_secret("abc12").is_err()); // too short
        assert!(validate_account_secret("a234567890123456").is_err()); // too long
        assert!(validate_account_secret("abc 123").is_err());
    }

    #[test]
    fn test_account_name_rules() {
        assert!(validate_account_name("alice").is_ok());
        assert!(validate_account_name("_svc-01").is_ok());
        assert!(validate_account_name("").is_err());
        assert!(validate_account_name("Alice").is_err());
        assert!(validate_account_name("a;rm -rf /").is_err());
    }

    #[test]
    fn test_fact_into_record() {
        let fact = LiveAccountFact {
            name: "bob".into(),
            uid: 1001,
            gid: 1001,
            secret: String::new(),
        };
        let record = fact.into_record(HostAddr::new("h", 22));
        assert_eq!(record.uid, 1001);
        assert!(!record.not_found_on_remote);
        assert_eq!(record.secret, "");
    }
}
