use async_trait::async_trait;
use common::{LazyResource, ResourceFactory};
use configs::DatabaseConfig;
use models::sample_data::{self, ServerProbe};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::errors::ServiceError;

/// Connect a pool using the tuning knobs from configuration.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(cfg.url.clone());
    opt.max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .connect_timeout(cfg.connect_timeout())
        .acquire_timeout(cfg.acquire_timeout())
        .idle_timeout(cfg.idle_timeout())
        .max_lifetime(cfg.max_lifetime())
        .sqlx_logging(cfg.sqlx_logging);
    // 内存 SQLite 每个连接都是独立的库，只能保留一个连接
    if is_in_memory_sqlite(&cfg.url) {
        opt.max_connections(1).min_connections(1);
    }
    Database::connect(opt).await
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && url.contains(":memory:")
}

/// Builds the process-wide connection pool on first use.
pub struct DatabaseFactory {
    config: DatabaseConfig,
}

impl DatabaseFactory {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ResourceFactory for DatabaseFactory {
    type Handle = DatabaseConnection;

    fn name(&self) -> &str {
        "database"
    }

    async fn create(&self) -> anyhow::Result<DatabaseConnection> {
        let db = connect_with_config(&self.config).await?;
        info!(backend = ?db.get_database_backend(), "database pool connected");
        Ok(db)
    }
}

/// CRUD over the `sample_data` table.
#[derive(Clone)]
pub struct RelationalService {
    pool: LazyResource<DatabaseFactory>,
}

impl RelationalService {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { pool: LazyResource::new(DatabaseFactory::new(config)) }
    }

    pub fn pool(&self) -> &LazyResource<DatabaseFactory> {
        &self.pool
    }

    async fn db(&self) -> Result<DatabaseConnection, ServiceError> {
        Ok(self.pool.acquire().await?)
    }

    /// Acquire the pool and run a no-op query.
    pub async fn ready(&self) -> Result<(), ServiceError> {
        let db = self.db().await?;
        sample_data::ping(&db).await?;
        Ok(())
    }

    pub async fn init_table(&self) -> Result<(), ServiceError> {
        let db = self.db().await?;
        sample_data::reset_table(&db).await?;
        info!(table = "sample_data", "table recreated");
        Ok(())
    }

    pub async fn probe(&self) -> Result<ServerProbe, ServiceError> {
        let db = self.db().await?;
        Ok(sample_data::server_probe(&db).await?)
    }

    /// Validation runs before the pool is touched, so bad input never costs a connection.
    pub async fn insert(&self, key: &str, value: &str) -> Result<sample_data::Model, ServiceError> {
        sample_data::validate_entry(key, value)?;
        let db = self.db().await?;
        Ok(sample_data::create(&db, key, value).await?)
    }

    pub async fn list(&self) -> Result<Vec<sample_data::Model>, ServiceError> {
        let db = self.db().await?;
        Ok(sample_data::list_latest_first(&db).await?)
    }

    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db().await?;
        if sample_data::delete(&db, id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Record not found".into()))
        }
    }
}
