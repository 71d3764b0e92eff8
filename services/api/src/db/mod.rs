//! Postgres connection handling for the room and roster stores.
//!
//! One [`LazyDatabase`] is shared by every Postgres-backed store. Its pool is
//! opened by whichever call needs it first; migrations only run in dev mode.

mod error;

pub use error::DbError;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;
use tracing::info;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/sentrydash".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-wide database handle that connects on first use.
///
/// Concurrent first uses wait on the same connection attempt. A failed
/// attempt is not cached, so the next caller tries again.
pub struct LazyDatabase {
    config: DbConfig,
    pool: OnceCell<PgPool>,
}

impl LazyDatabase {
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// The shared pool, connecting if this is the first use.
    pub async fn pool(&self) -> Result<&PgPool, DbError> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<PgPool, DbError> {
        info!(
            max_connections = self.config.max_connections,
            min_connections = self.config.min_connections,
            "Opening room store connection pool"
        );
        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.acquire_timeout)
            .connect(&self.config.database_url)
            .await
            .map_err(DbError::Connect)
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(self.pool().await?)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Apply the bundled SQL migrations.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let migrator = find_migrator().await?;
        migrator
            .run(self.pool().await?)
            .await
            .map_err(DbError::Migration)?;
        info!("Room store migrations applied");
        Ok(())
    }

    /// Returns true once the pool has been opened.
    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    /// Drain the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            info!("Closing room store connection pool");
            pool.close().await;
        }
    }
}

/// Directories searched for migrations, relative to the working directory
/// first and then to this crate.
fn migration_dirs() -> [PathBuf; 3] {
    [
        PathBuf::from("migrations"),
        PathBuf::from("services/api/migrations"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    ]
}

async fn find_migrator() -> Result<Migrator, DbError> {
    let dirs = migration_dirs();
    let mut last_error = String::from("no candidate directories");
    for dir in &dirs {
        match Migrator::new(dir.clone()).await {
            Ok(migrator) => {
                info!(migrations_dir = %dir.display(), "Loaded migrations");
                return Ok(migrator);
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(DbError::MigrationDirNotFound {
        tried: dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_bounds() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }

    #[tokio::test]
    async fn pool_is_not_opened_until_used() {
        let lazy = LazyDatabase::new(DbConfig::default());
        assert!(!lazy.is_initialized());
        lazy.close().await;
        assert!(!lazy.is_initialized());
    }

    #[tokio::test]
    async fn bundled_migrations_are_found() {
        assert!(find_migrator().await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connectivity_error() {
        let lazy = LazyDatabase::new(DbConfig {
            database_url: "postgres://sentrydash@127.0.0.1:1/sentrydash".to_string(),
            acquire_timeout: Duration::from_millis(200),
            ..DbConfig::default()
        });
        let err = lazy.health_check().await.unwrap_err();
        assert!(err.is_connectivity(), "{err}");
        assert!(!lazy.is_initialized());
    }
}
