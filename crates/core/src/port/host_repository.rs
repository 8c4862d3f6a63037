// Host Repository Port (Interface)

use crate::domain::{HostAddr, HostRecord};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of host registrations
#[async_trait]
pub trait HostRepository: Send + Sync {
    /// Find a host by its (address, port) identity
    async fn get_host(&self, addr: &HostAddr) -> Result<Option<HostRecord>>;

    /// Page through hosts in creation order.
    ///
    /// # Arguments
    /// * `from` - Offset of the first row
    /// * `size` - Page size
    /// * `keyword` - Optional substring matched against address, name and description
    ///
    /// Returns the page and the total number of matching hosts.
    async fn list_hosts(
        &self,
        from: u32,
        size: u32,
        keyword: Option<&str>,
    ) -> Result<(Vec<HostRecord>, u64)>;

    /// Insert a new host
    ///
    /// # Errors
    /// - `AppError::Conflict` if the identity or the name is taken
    async fn create_host(&self, host: &HostRecord) -> Result<()>;

    /// Update a host's mutable fields
    ///
    /// # Errors
    /// - `AppError::NotFound` if no host has this identity
    async fn update_host(&self, host: &HostRecord) -> Result<()>;

    /// Delete a host and its account rows. Returns whether a row was removed.
    async fn delete_host(&self, addr: &HostAddr) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Vec-backed repository preserving insertion order
    #[derive(Default)]
    pub struct InMemoryHostRepository {
        hosts: Mutex<Vec<HostRecord>>,
    }

    impl InMemoryHostRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_hosts(hosts: Vec<HostRecord>) -> Self {
            Self {
                hosts: Mutex::new(hosts),
            }
        }

        pub fn all(&self) -> Vec<HostRecord> {
            self.hosts.lock().unwrap().clone()
        }
    }

    fn matches_keyword(host: &HostRecord, keyword: Option<&str>) -> bool {
        match keyword {
            None | Some("") => true,
            Some(k) => {
                host.addr.address.contains(k) || host.name.contains(k) || host.description.contains(k)
            }
        }
    }

    #[async_trait]
    impl HostRepository for InMemoryHostRepository {
        async fn get_host(&self, addr: &HostAddr) -> Result<Option<HostRecord>> {
            Ok(self
                .hosts
                .lock()
                .unwrap()
                .iter()
                .find(|h| &h.addr == addr)
                .cloned())
        }

        async fn list_hosts(
            &self,
            from: u32,
            size: u32,
            keyword: Option<&str>,
        ) -> Result<(Vec<HostRecord>, u64)> {
            let hosts = self.hosts.lock().unwrap();
            let matching: Vec<&HostRecord> =
                hosts.iter().filter(|h| matches_keyword(h, keyword)).collect();
            let total = matching.len() as u64;
            let page = matching
                .into_iter()
                .skip(from as usize)
                .take(size as usize)
                .cloned()
                .collect();
            Ok((page, total))
        }

        async fn create_host(&self, host: &HostRecord) -> Result<()> {
            let mut hosts = self.hosts.lock().unwrap();
            if hosts.iter().any(|h| h.addr == host.addr || h.name == host.name) {
                return Err(AppError::Conflict(format!("host {} already registered", host.addr)));
            }
            hosts.push(host.clone());
            Ok(())
        }

        async fn update_host(&self, host: &HostRecord) -> Result<()> {
            let mut hosts = self.hosts.lock().unwrap();
            match hosts.iter_mut().find(|h| h.addr == host.addr) {
                Some(existing) => {
                    *existing = host.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("host {}", host.addr))),
            }
        }

        async fn delete_host(&self, addr: &HostAddr) -> Result<bool> {
            let mut hosts = self.hosts.lock().unwrap();
            let before = hosts.len();
            hosts.retain(|h| &h.addr != addr);
            Ok(hosts.len() != before)
        }
    }
}
