//! Oracle usage source
//!
//! The Oracle client is blocking, so each call runs on tokio's blocking
//! thread pool. Connections use the easy-connect form
//! `//host:port/service_name`.

use async_trait::async_trait;
use ::oracle::sql_type::{OracleType, ToSql};
use ::oracle::Connection;

use super::{
    check_usage_arity, require_measured, BindValue, BoundStatement, ConnectionTarget, EngineError,
    EngineKind, QueryEngine,
};
use crate::db::models::UsageRow;

/// Runs usage queries against Oracle, one connection per call
#[derive(Debug, Clone, Default)]
pub struct OracleEngine;

impl OracleEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryEngine for OracleEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Oracle
    }

    async fn fetch_usage(
        &self,
        target: &ConnectionTarget,
        statement: &BoundStatement,
    ) -> Result<Vec<UsageRow>, EngineError> {
        let target = target.clone();
        let statement = statement.clone();

        tokio::task::spawn_blocking(move || fetch_blocking(&target, &statement))
            .await
            .map_err(|e| EngineError::Query(format!("Oracle worker failed: {}", e)))?
    }
}

/// Only numeric columns carry a measured value
fn check_measured_type(oracle_type: &OracleType) -> Result<(), EngineError> {
    match oracle_type {
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble
        | OracleType::Int64
        | OracleType::UInt64 => Ok(()),
        other => Err(EngineError::RowShape(format!(
            "measured column has non-numeric type {}",
            other
        ))),
    }
}

/// Easy-connect string for a target
fn connect_string(target: &ConnectionTarget) -> String {
    format!("//{}:{}/{}", target.path.host, target.path.port, target.path.database)
}

fn fetch_blocking(
    target: &ConnectionTarget,
    statement: &BoundStatement,
) -> Result<Vec<UsageRow>, EngineError> {
    let conn = Connection::connect(&target.username, &target.password, connect_string(target))
        .map_err(|e| EngineError::Connection(e.to_string()))?;

    let result = run_statement(&conn, statement);

    if let Err(e) = conn.close() {
        tracing::debug!(error = %e, path = %target.path, "Error closing Oracle connection");
    }

    result
}

fn run_statement(conn: &Connection, statement: &BoundStatement) -> Result<Vec<UsageRow>, EngineError> {
    let params: Vec<&dyn ToSql> = statement
        .params
        .iter()
        .map(|param| match param {
            BindValue::Text(value) => value as &dyn ToSql,
            BindValue::Int(value) => value as &dyn ToSql,
            BindValue::Date(value) => value as &dyn ToSql,
        })
        .collect();

    let rows = conn
        .query(&statement.sql, &params)
        .map_err(|e| EngineError::Query(e.to_string()))?;

    let columns = rows.column_info();
    check_usage_arity(columns.len())?;
    check_measured_type(columns[2].oracle_type())?;

    let mut usage = Vec::new();
    for row in rows {
        let row = row.map_err(|e| EngineError::Query(e.to_string()))?;

        let application_group: String = row
            .get(0)
            .map_err(|e| EngineError::RowShape(format!("application group column: {}", e)))?;
        let platform: Option<String> = row
            .get(1)
            .map_err(|e| EngineError::RowShape(format!("platform column: {}", e)))?;
        let measured: Option<f64> = row
            .get(2)
            .map_err(|e| EngineError::RowShape(format!("measured column: {}", e)))?;

        usage.push(UsageRow {
            application_group,
            platform,
            measured: require_measured(measured)?,
        });
    }

    Ok(usage)
}
