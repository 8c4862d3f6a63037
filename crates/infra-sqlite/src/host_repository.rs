// SQLite HostRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hostward_core::domain::{HostAddr, HostRecord, OsType};
use hostward_core::error::{AppError, Result};
use hostward_core::port::HostRepository;
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteHostRepository {
    pool: SqlitePool,
}

impl SqliteHostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `%keyword%` with LIKE wildcards in the keyword taken literally
fn like_pattern(keyword: Option<&str>) -> Option<String> {
    keyword.filter(|k| !k.is_empty()).map(|k| {
        let escaped = k
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    })
}

const KEYWORD_FILTER: &str = "(?1 IS NULL \
     OR address LIKE ?1 ESCAPE '\\' \
     OR name LIKE ?1 ESCAPE '\\' \
     OR description LIKE ?1 ESCAPE '\\')";

#[async_trait]
impl HostRepository for SqliteHostRepository {
    async fn get_host(&self, addr: &HostAddr) -> Result<Option<HostRecord>> {
        let row = sqlx::query_as::<_, HostRow>("SELECT * FROM hosts WHERE address = ? AND port = ?")
            .bind(&addr.address)
            .bind(addr.port as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(HostRow::into_host).transpose()
    }

    async fn list_hosts(
        &self,
        from: u32,
        size: u32,
        keyword: Option<&str>,
    ) -> Result<(Vec<HostRecord>, u64)> {
        let pattern = like_pattern(keyword);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM hosts WHERE {}", KEYWORD_FILTER))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, HostRow>(&format!(
            "SELECT * FROM hosts WHERE {} ORDER BY created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3",
            KEYWORD_FILTER
        ))
        .bind(&pattern)
        .bind(size as i64)
        .bind(from as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let hosts = rows
            .into_iter()
            .map(HostRow::into_host)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = hosts.len(), total, "hosts listed");
        Ok((hosts, total as u64))
    }

    async fn create_host(&self, host: &HostRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hosts (
                address, port, name, description,
                admin_account, admin_secret, os_type,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&host.addr.address)
        .bind(host.addr.port as i64)
        .bind(&host.name)
        .bind(&host.description)
        .bind(&host.admin_account)
        .bind(&host.admin_secret)
        .bind(host.os_type.as_str())
        .bind(host.created_at)
        .bind(host.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e).context(format_args!("register host {}", host.addr)))?;

        Ok(())
    }

    async fn update_host(&self, host: &HostRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE hosts
            SET name = ?, description = ?, admin_account = ?, admin_secret = ?,
                os_type = ?, updated_at = ?
            WHERE address = ? AND port = ?
            "#,
        )
        .bind(&host.name)
        .bind(&host.description)
        .bind(&host.admin_account)
        .bind(&host.admin_secret)
        .bind(host.os_type.as_str())
        .bind(host.updated_at)
        .bind(&host.addr.address)
        .bind(host.addr.port as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e).context(format_args!("update host {}", host.addr)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("host {}", host.addr)));
        }
        Ok(())
    }

    async fn delete_host(&self, addr: &HostAddr) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM accounts WHERE address = ? AND port = ?")
            .bind(&addr.address)
            .bind(addr.port as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM hosts WHERE address = ? AND port = ?")
            .bind(&addr.address)
            .bind(addr.port as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HostRow {
    address: String,
    port: i64,
    name: String,
    description: String,
    admin_account: String,
    admin_secret: String,
    os_type: String,
    created_at: i64,
    updated_at: i64,
}

impl HostRow {
    fn into_host(self) -> Result<HostRecord> {
        let port = u16::try_from(self.port).map_err(|_| {
            AppError::Database(format!("stored port {} out of range", self.port))
        })?;
        let os_type: OsType = self
            .os_type
            .parse()
            .map_err(|e| AppError::Database(format!("stored host {}: {}", self.address, e)))?;

        Ok(HostRecord {
            addr: HostAddr::new(self.address, port),
            name: self.name,
            description: self.description,
            admin_account: self.admin_account,
            admin_secret: self.admin_secret,
            os_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
