// Host Domain Model

use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a remote host.
///
/// Display names may change; this pair never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddr {
    pub address: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Operating system tag recorded when the host is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsType {
    Linux,
    WindowsServer,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "linux",
            OsType::WindowsServer => "windows_server",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OsType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(OsType::Linux),
            "windows_server" => Ok(OsType::WindowsServer),
            other => Err(DomainError::UnknownOsType(other.to_string())),
        }
    }
}

/// Persisted host registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub addr: HostAddr,
    pub name: String,
    pub description: String,
    pub admin_account: String,
    pub admin_secret: String,
    pub os_type: OsType,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HostRecord {
    pub fn new(
        addr: HostAddr,
        name: impl Into<String>,
        admin_account: impl Into<String>,
        admin_secret: impl Into<String>,
    ) -> Self {
        Self {
            addr,
            name: name.into(),
            description: String::new(),
            admin_account: admin_account.into(),
            admin_secret: admin_secret.into(),
            os_type: OsType::Linux,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Reject records that could never be used to open a session.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.addr.address.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "host address must not be empty".to_string(),
            ));
        }
        if self.addr.port == 0 {
            return Err(DomainError::ValidationError(
                "host port must not be 0".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "host name must not be empty".to_string(),
            ));
        }
        if self.admin_account.is_empty() || self.admin_secret.is_empty() {
            return Err(DomainError::ValidationError(
                "admin account and secret are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy safe to hand back to callers: the admin secret is blanked.
    pub fn redacted(&self) -> Self {
        Self {
            admin_secret: String::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_display() {
        assert_eq!(HostAddr::new("10.0.0.5", 2222).to_string(), "10.0.0.5:2222");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut host = HostRecord::new(HostAddr::new("10.0.0.5", 22), "gpu-01", "root", "pw");
        assert!(host.validate().is_ok());

        host.addr.port = 0;
        assert!(host.validate().is_err());

        host.addr.port = 22;
        host.admin_secret.clear();
        assert!(host.validate().is_err());
    }

    #[test]
    fn test_os_type_round_trip_through_str() {
        assert_eq!("windows_server".parse::<OsType>().unwrap(), OsType::WindowsServer);
        assert!("solaris".parse::<OsType>().is_err());
    }

    #[test]
    fn test_redacted_blanks_secret_only() {
        let host = HostRecord::new(HostAddr::new("h", 22), "n", "admin", "secret");
        let view = host.redacted();
        assert_eq!(view.admin_secret, "");
        assert_eq!(view.admin_account, "admin");
        assert_eq!(view.addr, host.addr);
    }
}
