//! Engine connector
//!
//! Turns a driver reference plus a stored query into usage rows. Any
//! failure on the way (unsupported engine, malformed path, bad template,
//! connection or query error) is logged with the engine name and reported
//! to the caller as zero rows.

use super::{
    BindContext, ConnectionPath, ConnectionTarget, EngineError, EngineKind, EngineRegistry,
    QueryTemplate,
};
use crate::db::models::{DriverReference, UsageRow};
use crate::utils::{single_line, truncate_with_suffix};

/// Longest query preview written to the logs
const QUERY_PREVIEW_CHARS: usize = 200;

/// Dispatches stored queries to registered engines
#[derive(Clone)]
pub struct EngineConnector {
    registry: EngineRegistry,
}

impl EngineConnector {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    /// Fetch usage rows, treating every failure as an empty result
    pub async fn fetch_usage(
        &self,
        driver: &DriverReference,
        template: &QueryTemplate,
        ctx: &BindContext,
    ) -> Vec<UsageRow> {
        match self.try_fetch_usage(driver, template, ctx).await {
            Ok(rows) => {
                tracing::info!(
                    engine = %driver.engine,
                    driver_reference = driver.reference,
                    rows = rows.len(),
                    "Retrieved usage rows"
                );
                rows
            }
            Err(e) => {
                tracing::error!(
                    engine = %driver.engine,
                    driver_reference = driver.reference,
                    error = %e,
                    "Failed to execute query"
                );
                Vec::new()
            }
        }
    }

    /// Fetch usage rows, surfacing the failure
    ///
    /// No connection is attempted unless the engine kind is registered, the
    /// connection path is well formed and the template binds.
    pub async fn try_fetch_usage(
        &self,
        driver: &DriverReference,
        template: &QueryTemplate,
        ctx: &BindContext,
    ) -> Result<Vec<UsageRow>, EngineError> {
        let kind: EngineKind = driver.engine.parse()?;
        let engine = self
            .registry
            .get(kind)
            .ok_or(EngineError::Unregistered(kind))?;
        let path: ConnectionPath = driver.connection_path.parse()?;
        let statement = template.bind(kind.placeholder_style(), ctx)?;

        tracing::debug!(
            engine = %kind,
            path = %path,
            params = statement.params.len(),
            query = %truncate_with_suffix(&single_line(&statement.sql), QUERY_PREVIEW_CHARS, "..."),
            "Executing query"
        );

        let target = ConnectionTarget {
            path,
            username: driver.username.clone(),
            password: driver.password.clone(),
        };

        engine.fetch_usage(&target, &statement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::BindValue;
    use crate::testing::{driver, ScriptedEngine};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn ctx() -> BindContext {
        BindContext::new("G2", Some(2023), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    fn connector_with(engine: Arc<ScriptedEngine>) -> EngineConnector {
        let mut registry = EngineRegistry::new();
        registry.register(engine);
        EngineConnector::new(registry)
    }

    #[tokio::test]
    async fn test_postgres_rows_returned() {
        let engine = Arc::new(ScriptedEngine::returning(
            EngineKind::Postgres,
            vec![UsageRow::new("G2", Some("linux"), 3650.0)],
        ));
        let connector = connector_with(engine.clone());
        let template = QueryTemplate::new("SELECT grp, platform, units FROM usage WHERE grp = :application_group");

        let rows = connector
            .fetch_usage(&driver(1, "PostgreSQL", "db1:5432:usage"), &template, &ctx())
            .await;

        assert_eq!(rows, vec![UsageRow::new("G2", Some("linux"), 3650.0)]);
        assert_eq!(engine.calls(), 1);

        let statement = engine.last_statement().unwrap();
        assert_eq!(statement.sql, "SELECT grp, platform, units FROM usage WHERE grp = $1");
        assert_eq!(statement.params, vec![BindValue::Text("G2".to_string())]);

        let target = engine.last_target().unwrap();
        assert_eq!(target.path.database, "usage");
        assert_eq!(target.username, "reader");
    }

    #[tokio::test]
    async fn test_unsupported_engine_yields_no_rows_and_no_connection() {
        let engine = Arc::new(ScriptedEngine::returning(
            EngineKind::Postgres,
            vec![UsageRow::new("G2", None, 1.0)],
        ));
        let connector = connector_with(engine.clone());
        let template = QueryTemplate::new("SELECT a, b, c FROM t");
        let mysql = driver(2, "mysql", "db1:3306:usage");

        let err = connector.try_fetch_usage(&mysql, &template, &ctx()).await.unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));

        assert!(connector.fetch_usage(&mysql, &template, &ctx()).await.is_empty());
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_engine_kind() {
        let engine = Arc::new(ScriptedEngine::returning(EngineKind::Postgres, vec![]));
        let connector = connector_with(engine.clone());
        let template = QueryTemplate::new("SELECT a, b, c FROM t");

        let err = connector
            .try_fetch_usage(&driver(3, "oracle", "ora1:1521:BILLING"), &template, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unregistered(EngineKind::Oracle)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_path_skips_connection() {
        let engine = Arc::new(ScriptedEngine::returning(EngineKind::Postgres, vec![]));
        let connector = connector_with(engine.clone());
        let template = QueryTemplate::new("SELECT a, b, c FROM t");

        let err = connector
            .try_fetch_usage(&driver(4, "postgresql", "db1/usage"), &template, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPath(_)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_empty_result() {
        let engine = Arc::new(ScriptedEngine::failing(
            EngineKind::Postgres,
            EngineError::Connection("connection refused".to_string()),
        ));
        let connector = connector_with(engine.clone());
        let template = QueryTemplate::new("SELECT a, b, c FROM t");

        let rows = connector
            .fetch_usage(&driver(5, "postgresql", "db1:5432:usage"), &template, &ctx())
            .await;
        assert!(rows.is_empty());
        assert_eq!(engine.calls(), 1);
    }
}
