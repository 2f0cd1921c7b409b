//! Reporting database client wrapper
//!
//! This module wraps the sqlx Postgres pool used for the central
//! reporting database, which holds both the configuration tables and the
//! daily/monthly output tables.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Settings, TableNames};
use crate::db::StoreError;

/// Reporting database client for configuration reads and report writes.
///
/// Each operation acquires a pooled connection and returns it before the
/// call completes; nothing is held across application groups.
#[derive(Clone)]
pub struct ReportingDb {
    /// Application settings
    settings: Arc<Settings>,

    /// sqlx connection pool
    pool: PgPool,
}

impl ReportingDb {
    /// Connect to the reporting database.
    ///
    /// Fails if no connection can be established within the configured
    /// timeout; callers treat that as a startup failure.
    pub async fn connect(settings: Arc<Settings>) -> Result<Self, StoreError> {
        let db = &settings.reporting_db;

        let mut options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .database(&db.name)
            .username(&db.user)
            .application_name(&settings.app_name);
        if let Some(password) = db.password.as_deref() {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connect_timeout_seconds))
            .connect_with(options)
            .await?;

        tracing::info!(
            host = %db.host,
            port = db.port,
            database = %db.name,
            "Connected to reporting database"
        );

        Ok(Self::from_pool(settings, pool))
    }

    /// Wrap an existing pool
    pub fn from_pool(settings: Arc<Settings>, pool: PgPool) -> Self {
        Self { settings, pool }
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Configured table names
    pub fn tables(&self) -> &TableNames {
        &self.settings.tables
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
