//! External database engines
//!
//! Usage figures live in per-application databases reached through the
//! driver registry. Each supported engine implements [`QueryEngine`] and is
//! registered in an [`EngineRegistry`]; the [`EngineConnector`] resolves a
//! driver reference to a registered engine and runs a bound query template.

pub mod connector;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod postgres;
pub mod template;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::models::UsageRow;

pub use connector::EngineConnector;
#[cfg(feature = "oracle")]
pub use self::oracle::OracleEngine;
pub use postgres::PostgresEngine;
pub use template::{BindContext, BindValue, BoundStatement, PlaceholderStyle, QueryTemplate};

// ============================================================================
// Engine kinds
// ============================================================================

/// Database engines usage can be fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Postgres,
    Oracle,
}

impl EngineKind {
    /// Bind-marker syntax the engine expects
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            EngineKind::Postgres => PlaceholderStyle::Dollar,
            EngineKind::Oracle => PlaceholderStyle::Colon,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Postgres => write!(f, "postgresql"),
            EngineKind::Oracle => write!(f, "oracle"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(EngineKind::Postgres),
            "oracle" => Ok(EngineKind::Oracle),
            _ => Err(EngineError::Unsupported(s.to_string())),
        }
    }
}

// ============================================================================
// Connection targets
// ============================================================================

/// Parsed `host:port:database-or-service` driver path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPath {
    pub host: String,
    pub port: u16,
    /// Database name for PostgreSQL, service name for Oracle
    pub database: String,
}

impl FromStr for ConnectionPath {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [host, port, database] = parts.as_slice() else {
            return Err(EngineError::InvalidPath(format!(
                "expected host:port:database, got {:?}",
                s
            )));
        };

        if host.is_empty() || database.is_empty() {
            return Err(EngineError::InvalidPath(format!(
                "empty host or database in {:?}",
                s
            )));
        }

        let port = port
            .parse()
            .map_err(|_| EngineError::InvalidPath(format!("invalid port {:?} in {:?}", port, s)))?;

        Ok(Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
        })
    }
}

impl fmt::Display for ConnectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.database)
    }
}

/// Everything needed to open a connection to an external engine
#[derive(Clone)]
pub struct ConnectionTarget {
    pub path: ConnectionPath,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Engine trait and registry
// ============================================================================

/// A database engine that can run a bound statement and return usage rows.
///
/// Implementations open a fresh connection per call and must close it on
/// every exit path. Each returned row has already been checked to have the
/// `(application group, platform, measured value)` shape.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine kind this implementation serves
    fn kind(&self) -> EngineKind;

    /// Run `statement` against `target`
    async fn fetch_usage(
        &self,
        target: &ConnectionTarget,
        statement: &BoundStatement,
    ) -> Result<Vec<UsageRow>, EngineError>;
}

/// Registered engines, keyed by kind
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<EngineKind, Arc<dyn QueryEngine>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every engine compiled into this build
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresEngine::new()));
        #[cfg(feature = "oracle")]
        registry.register(Arc::new(OracleEngine::new()));
        registry
    }

    /// Register an engine, replacing any previous one of the same kind
    pub fn register(&mut self, engine: Arc<dyn QueryEngine>) {
        let kind = engine.kind();
        if self.engines.insert(kind, engine).is_some() {
            tracing::debug!(engine = %kind, "Replaced registered engine");
        }
    }

    /// Look up the engine for a kind
    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn QueryEngine>> {
        self.engines.get(&kind).cloned()
    }

    /// Kinds with a registered engine
    pub fn kinds(&self) -> Vec<EngineKind> {
        self.engines.keys().copied().collect()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while talking to an external engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Unsupported database engine: {0}")]
    Unsupported(String),

    #[error("No engine registered for {0}")]
    Unregistered(EngineKind),

    #[error("Invalid connection path: {0}")]
    InvalidPath(String),

    #[error("Invalid query template: {0}")]
    Template(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unexpected row shape: {0}")]
    RowShape(String),
}

// ============================================================================
// Usage row contract
// ============================================================================

/// Number of columns every usage query must return:
/// `(application group, platform, measured value)`
pub const USAGE_COLUMNS: usize = 3;

/// Reject a result set whose rows do not have exactly [`USAGE_COLUMNS`] columns
pub fn check_usage_arity(columns: usize) -> Result<(), EngineError> {
    if columns != USAGE_COLUMNS {
        return Err(EngineError::RowShape(format!(
            "expected {} columns, got {}",
            USAGE_COLUMNS, columns
        )));
    }
    Ok(())
}

/// A NULL measured value cannot be priced
pub fn require_measured(value: Option<f64>) -> Result<f64, EngineError> {
    value.ok_or_else(|| EngineError::RowShape("measured column is NULL".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("PostgreSQL".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!("pg".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!(" ORACLE ".parse::<EngineKind>().unwrap(), EngineKind::Oracle);

        let err = "mysql".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(ref name) if name == "mysql"));
    }

    #[test]
    fn test_connection_path_parsing() {
        let path: ConnectionPath = "db1.internal:5432:usage".parse().unwrap();
        assert_eq!(path.host, "db1.internal");
        assert_eq!(path.port, 5432);
        assert_eq!(path.database, "usage");
        assert_eq!(path.to_string(), "db1.internal:5432:usage");
    }

    #[test]
    fn test_connection_path_rejects_malformed() {
        assert!("db1:5432".parse::<ConnectionPath>().is_err());
        assert!("db1:5432:usage:extra".parse::<ConnectionPath>().is_err());
        assert!("db1:port:usage".parse::<ConnectionPath>().is_err());
        assert!(":5432:usage".parse::<ConnectionPath>().is_err());
        assert!("db1:5432:".parse::<ConnectionPath>().is_err());
    }

    #[test]
    fn test_registry_defaults() {
        let registry = EngineRegistry::with_defaults();
        assert!(registry.get(EngineKind::Postgres).is_some());
        #[cfg(feature = "oracle")]
        assert!(registry.get(EngineKind::Oracle).is_some());
        assert!(EngineRegistry::new().get(EngineKind::Postgres).is_none());
    }

    #[test]
    fn test_usage_arity() {
        assert!(check_usage_arity(3).is_ok());
        assert!(matches!(check_usage_arity(2), Err(EngineError::RowShape(_))));

        let err = check_usage_arity(4).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected row shape: expected 3 columns, got 4");
    }

    #[test]
    fn test_null_measured_value_rejected() {
        assert_eq!(require_measured(Some(12.5)).unwrap(), 12.5);
        assert!(matches!(require_measured(None), Err(EngineError::RowShape(_))));
    }
}
