// SQLite AccountRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hostward_core::domain::{AccountRecord, HostAddr};
use hostward_core::error::{AppError, Result};
use hostward_core::port::{AccountRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteAccountRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn get_accounts_by_host(&self, host: &HostAddr) -> Result<Vec<AccountRecord>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT name, address, port, secret, uid, gid, not_found_on_remote
            FROM accounts
            WHERE address = ? AND port = ?
            ORDER BY name ASC
            "#,
        )
        .bind(&host.address)
        .bind(host.port as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(AccountRow::into_account).collect()
    }

    async fn upsert_accounts(&self, accounts: &[AccountRecord]) -> Result<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for account in accounts {
            sqlx::query(
                r#"
                INSERT INTO accounts (
                    name, address, port, secret, uid, gid,
                    not_found_on_remote, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (name, address, port) DO UPDATE SET
                    secret = excluded.secret,
                    uid = excluded.uid,
                    gid = excluded.gid,
                    not_found_on_remote = excluded.not_found_on_remote,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&account.name)
            .bind(&account.host.address)
            .bind(account.host.port as i64)
            .bind(&account.secret)
            .bind(account.uid as i64)
            .bind(account.gid as i64)
            .bind(if account.not_found_on_remote { 1 } else { 0 })
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_sqlx_error(e)
                    .context(format_args!("store account {} on {}", account.name, account.host))
            })?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = accounts.len(), "accounts upserted");
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    name: String,
    address: String,
    port: i64,
    secret: String,
    uid: i64,
    gid: i64,
    not_found_on_remote: i32, // SQLite boolean as integer
}

impl AccountRow {
    fn into_account(self) -> Result<AccountRecord> {
        let port = u16::try_from(self.port).map_err(|_| {
            AppError::Database(format!("stored port {} out of range", self.port))
        })?;
        let id = |value: i64, what: &str| {
            u32::try_from(value)
                .map_err(|_| AppError::Database(format!("stored {} {} out of range", what, value)))
        };

        let mut account = AccountRecord::new(HostAddr::new(self.address, port), self.name, self.secret);
        account.uid = id(self.uid, "uid")?;
        account.gid = id(self.gid, "gid")?;
        account.not_found_on_remote = self.not_found_on_remote != 0;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteHostRepository};
    use hostward_core::domain::HostRecord;
    use hostward_core::port::time_provider::mocks::ManualTimeProvider;
    use hostward_core::port::HostRepository;

    async fn setup() -> (SqliteHostRepository, SqliteAccountRepository) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let hosts = SqliteHostRepository::new(pool.clone());
        for address in ["10.0.0.1", "10.0.0.2"] {
            let host = HostRecord::new(HostAddr::new(address, 22), address, "ops", "adm1n!");
            hosts.create_host(&host).await.unwrap();
        }
        let accounts = SqliteAccountRepository::new(pool, Arc::new(ManualTimeProvider::new(10)));
        (hosts, accounts)
    }

    fn account(address: &str, name: &str, uid: u32) -> AccountRecord {
        let mut account = AccountRecord::new(HostAddr::new(address, 22), name, "");
        account.uid = uid;
        account.gid = uid;
        account
    }

    #[tokio::test]
    async fn test_upsert_and_read_back_by_host() {
        let (_, repo) = setup().await;
        repo.upsert_accounts(&[
            account("10.0.0.1", "zed", 1002),
            account("10.0.0.1", "amy", 1001),
            account("10.0.0.2", "amy", 1500),
        ])
        .await
        .unwrap();

        let found = repo
            .get_accounts_by_host(&HostAddr::new("10.0.0.1", 22))
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(found[0].uid, 1001);
        assert!(found[0].backup_dir.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_mutable_fields() {
        let (_, repo) = setup().await;
        repo.upsert_accounts(&[account("10.0.0.1", "amy", 1001)]).await.unwrap();

        let mut changed = account("10.0.0.1", "amy", 1009);
        changed.secret = "Amy12345".to_string();
        changed.not_found_on_remote = true;
        repo.upsert_accounts(&[changed]).await.unwrap();

        let found = repo
            .get_accounts_by_host(&HostAddr::new("10.0.0.1", 22))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].secret, "Amy12345");
        assert_eq!(found[0].uid, 1009);
        assert!(found[0].not_found_on_remote);
    }

    #[tokio::test]
    async fn test_deleting_host_removes_its_accounts() {
        let (hosts, repo) = setup().await;
        repo.upsert_accounts(&[account("10.0.0.1", "amy", 1001), account("10.0.0.2", "bob", 1001)])
            .await
            .unwrap();

        hosts.delete_host(&HostAddr::new("10.0.0.1", 22)).await.unwrap();

        assert!(repo
            .get_accounts_by_host(&HostAddr::new("10.0.0.1", 22))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.get_accounts_by_host(&HostAddr::new("10.0.0.2", 22))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_accounts_need_a_registered_host() {
        let (_, repo) = setup().await;
        let err = repo
            .upsert_accounts(&[account("10.9.9.9", "amy", 1001)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
