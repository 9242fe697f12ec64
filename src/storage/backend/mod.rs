//! SeaORM storage backend
//!
//! Connection management for SQLite, MySQL/MariaDB and PostgreSQL.
//! Services issue their queries against [`Storage::get_db`].

mod connection;
pub mod retry;

use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::errors::{Result, SeoHubError};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use retry::RetryConfig;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(SeoHubError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage
#[derive(Clone)]
pub struct Storage {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: RetryConfig,
}

impl Storage {
    /// 连接数据库并运行迁移
    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self> {
        if database_url.is_empty() {
            return Err(SeoHubError::database_config("database_url 未设置"));
        }

        let backend_name = infer_backend_from_url(database_url)?;
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, &backend_name, config.pool_size, config.timeout).await?
        };

        let storage = Storage {
            db,
            backend_name,
            retry_config: RetryConfig {
                max_retries: config.retry_count,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
        };

        run_migrations(&storage.db).await?;

        warn!(
            "{} storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    /// 使用默认连接参数（测试与 CLI 场景）
    pub async fn connect_url(database_url: &str) -> Result<Self> {
        Self::connect(database_url, &DatabaseConfig::default()).await
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry_config
    }

    /// 健康检查：执行一次最简单的查询
    pub async fn ping(&self) -> Result<()> {
        self.db
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| SeoHubError::database_connection(e.to_string()))
    }

    /// 关闭连接池（所有克隆共享同一个池）
    pub async fn close(&self) -> Result<()> {
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| SeoHubError::database_connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://data.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("seohub.db").unwrap(), "sqlite");
        assert_eq!(
            infer_backend_from_url("mysql://root@localhost/seohub").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("mariadb://root@localhost/seohub").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/seohub").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }

    #[tokio::test]
    async fn test_connect_sqlite_and_ping() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ping.db").display());
        let storage = Storage::connect_url(&url).await.unwrap();
        assert_eq!(storage.backend_name(), "sqlite");
        storage.ping().await.unwrap();
    }
}
