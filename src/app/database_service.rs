//! Connection pool and schema ownership.
//!
//! The service owns the PostgreSQL pool, creates the managed tables on
//! startup and hands out typed repositories that share the pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::domain::entities::{DeviceEntity, ForgotPasswordEntity, ScentEntity, UserEntity};
use crate::domain::entity::Entity;
use crate::infra::config;
use crate::storage::postgres::PgRepository;

/// `(table, CREATE TABLE statement)` in dependency order.
pub const MANAGED_TABLES: [(&str, &str); 4] = [
    (UserEntity::TABLE, UserEntity::CREATE_TABLE_SQL),
    (ForgotPasswordEntity::TABLE, ForgotPasswordEntity::CREATE_TABLE_SQL),
    (DeviceEntity::TABLE, DeviceEntity::CREATE_TABLE_SQL),
    (ScentEntity::TABLE, ScentEntity::CREATE_TABLE_SQL),
];

#[derive(Clone)]
pub struct DatabaseService {
    pool: PgPool,
}

impl DatabaseService {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Connects with `DATABASE_URL` / `DATABASE_MAX_CONNECTIONS`.
    pub async fn connect_from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let database_url = config::database_url()?;
        Self::connect(&database_url, config::database_max_connections()).await
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates any missing managed table. Existing tables are left untouched.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        // gen_random_uuid() is built in from PG13; older servers need pgcrypto.
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pgcrypto")
            .execute(&self.pool)
            .await?;
        for (table, ddl) in MANAGED_TABLES {
            sqlx::query(ddl).execute(&self.pool).await?;
            info!(table, "table ready");
        }
        Ok(())
    }

    /// Managed tables that currently exist in the `public` schema.
    pub async fn existing_tables(&self) -> anyhow::Result<Vec<String>> {
        let names: Vec<&str> = MANAGED_TABLES.iter().map(|(t, _)| *t).collect();
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = 'public' AND table_name = ANY($1)
             ORDER BY table_name",
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn repository<T: Entity>(&self) -> PgRepository<T> {
        PgRepository::new(self.pool.clone())
    }
}
