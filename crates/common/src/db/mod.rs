//! Postgres persistence
//!
//! [`DbPool`] owns the primary connection and an optional read replica;
//! [`Repository`] implements the store on top of it. The SQL schema under
//! `migrations/` is embedded at compile time.

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sqlx::migrate::Migrator;
use std::time::Duration;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Primary for writes, replica (when configured) for reads
#[derive(Clone)]
pub struct DbPool {
    primary: DatabaseConnection,
    replica: Option<DatabaseConnection>,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let primary = connect("primary", connect_options(&config.url, config)).await?;

        let replica = match config.read_url.as_deref() {
            Some(url) => Some(connect("replica", connect_options(url, config)).await?),
            None => None,
        };

        info!(replica = replica.is_some(), "Database connections established");
        Ok(Self { primary, replica })
    }

    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Apply pending migrations; always against the primary
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(self.primary.get_postgres_connection_pool())
            .await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        ping_one("primary", &self.primary).await?;
        if let Some(replica) = &self.replica {
            ping_one("replica", replica).await?;
        }
        Ok(())
    }
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);
    options
}

async fn connect(role: &str, options: ConnectOptions) -> Result<DatabaseConnection> {
    info!(role, "Connecting to database");
    Database::connect(options)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", role, e),
        })
}

async fn ping_one(role: &str, conn: &DatabaseConnection) -> Result<()> {
    conn.execute_unprepared("SELECT 1")
        .await
        .map(|_| ())
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("{} ping failed: {}", role, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_follow_config() {
        let config = DatabaseConfig {
            url: "postgres://localhost/abcledger".to_string(),
            read_url: None,
            max_connections: 12,
            min_connections: 3,
            connect_timeout_secs: 7,
            idle_timeout_secs: 90,
            run_migrations: false,
        };

        let options = connect_options("postgres://replica/abcledger", &config);
        assert_eq!(options.get_url(), "postgres://replica/abcledger");
        assert_eq!(options.get_max_connections(), Some(12));
        assert_eq!(options.get_min_connections(), Some(3));
        assert_eq!(options.get_connect_timeout(), Some(Duration::from_secs(7)));
    }
}
