// Account Repository Port (Interface)

use crate::domain::{AccountRecord, HostAddr};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of account records.
///
/// Callers rely on single-row atomicity only.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// All stored accounts of one host, ordered by name
    async fn get_accounts_by_host(&self, host: &HostAddr) -> Result<Vec<AccountRecord>>;

    /// Insert or overwrite accounts keyed by (name, host). Never deletes.
    async fn upsert_accounts(&self, accounts: &[AccountRecord]) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Repository that records every upsert call and can be told to fail them
    #[derive(Default)]
    pub struct InMemoryAccountRepository {
        accounts: Mutex<Vec<AccountRecord>>,
        upsert_calls: Mutex<Vec<Vec<AccountRecord>>>,
        fail_upserts: AtomicBool,
    }

    impl InMemoryAccountRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_accounts(accounts: Vec<AccountRecord>) -> Self {
            Self {
                accounts: Mutex::new(accounts),
                ..Default::default()
            }
        }

        pub fn fail_upserts(&self, fail: bool) {
            self.fail_upserts.store(fail, Ordering::SeqCst);
        }

        /// Arguments of every upsert call, including failed ones
        pub fn upsert_calls(&self) -> Vec<Vec<AccountRecord>> {
            self.upsert_calls.lock().unwrap().clone()
        }

        pub fn all(&self) -> Vec<AccountRecord> {
            self.accounts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountRepository for InMemoryAccountRepository {
        async fn get_accounts_by_host(&self, host: &HostAddr) -> Result<Vec<AccountRecord>> {
            let mut found: Vec<AccountRecord> = self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| &a.host == host)
                .cloned()
                .collect();
            found.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(found)
        }

        async fn upsert_accounts(&self, accounts: &[AccountRecord]) -> Result<()> {
            self.upsert_calls.lock().unwrap().push(accounts.to_vec());
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(AppError::Database("upsert rejected".to_string()));
            }
            let mut stored = self.accounts.lock().unwrap();
            for account in accounts {
                match stored
                    .iter_mut()
                    .find(|a| a.name == account.name && a.host == account.host)
                {
                    Some(existing) => *existing = account.clone(),
                    None => stored.push(account.clone()),
                }
            }
            Ok(())
        }
    }
}
