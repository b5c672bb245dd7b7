//! AuthGate Database Layer
//!
//! Persistence for accounts. The authentication core talks to the
//! [`IdentityStore`] trait only; this crate provides two implementations:
//!
//! - [`AccountRepo`]: PostgreSQL via SQLx, uniqueness enforced by the
//!   `accounts_email_key` / `accounts_username_key` indexes
//! - [`MemoryIdentityStore`] (feature `memory`): in-process store with the
//!   same uniqueness semantics, for tests and development

pub mod config;
pub mod error;
pub mod models;
pub mod repos;
pub mod store;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult, UniqueKey};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryIdentityStore;
pub use models::*;
pub use repos::*;
pub use store::IdentityStore;

/// Database connection pool
pub struct Database {
    /// PostgreSQL connection pool
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok()
    }

    pub fn account_repo(&self) -> AccountRepo {
        AccountRepo::new(self.pg.clone())
    }
}
