//! PostgreSQL usage source

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};

use super::{
    check_usage_arity, require_measured, BindValue, BoundStatement, ConnectionTarget, EngineError,
    EngineKind, QueryEngine,
};
use crate::db::models::UsageRow;

/// Runs usage queries against PostgreSQL, one connection per call
#[derive(Debug, Clone, Default)]
pub struct PostgresEngine;

impl PostgresEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryEngine for PostgresEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    async fn fetch_usage(
        &self,
        target: &ConnectionTarget,
        statement: &BoundStatement,
    ) -> Result<Vec<UsageRow>, EngineError> {
        let options = PgConnectOptions::new()
            .host(&target.path.host)
            .port(target.path.port)
            .database(&target.path.database)
            .username(&target.username)
            .password(&target.password);

        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let result = run_statement(&mut conn, statement).await;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, path = %target.path, "Error closing PostgreSQL connection");
        }

        result
    }
}

async fn run_statement(
    conn: &mut PgConnection,
    statement: &BoundStatement,
) -> Result<Vec<UsageRow>, EngineError> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            BindValue::Text(value) => query.bind(value.as_str()),
            BindValue::Int(value) => query.bind(*value),
            BindValue::Date(value) => query.bind(*value),
        };
    }

    let rows = query
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| EngineError::Query(e.to_string()))?;

    rows.iter().map(usage_row).collect()
}

/// Decode one `(group, platform, measured)` row
fn usage_row(row: &PgRow) -> Result<UsageRow, EngineError> {
    check_usage_arity(row.len())?;

    let application_group: String = row
        .try_get(0)
        .map_err(|e| EngineError::RowShape(format!("application group column: {}", e)))?;
    let platform: Option<String> = row
        .try_get(1)
        .map_err(|e| EngineError::RowShape(format!("platform column: {}", e)))?;
    let measured = require_measured(measured_value(row)?)?;

    Ok(UsageRow {
        application_group,
        platform,
        measured,
    })
}

/// Column types a measured value can be decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeasuredType {
    Float8,
    Float4,
    Int8,
    Int4,
    Int2,
    Numeric,
}

impl MeasuredType {
    fn from_type_name(name: &str) -> Result<Self, EngineError> {
        match name {
            "FLOAT8" => Ok(MeasuredType::Float8),
            "FLOAT4" => Ok(MeasuredType::Float4),
            "INT8" => Ok(MeasuredType::Int8),
            "INT4" => Ok(MeasuredType::Int4),
            "INT2" => Ok(MeasuredType::Int2),
            "NUMERIC" => Ok(MeasuredType::Numeric),
            other => Err(EngineError::RowShape(format!(
                "measured column has non-numeric type {}",
                other
            ))),
        }
    }
}

/// Decode the measured value from whichever numeric type the query returned
fn measured_value(row: &PgRow) -> Result<Option<f64>, EngineError> {
    let measured_type = MeasuredType::from_type_name(row.column(2).type_info().name())?;
    let decode_err = |e: sqlx::Error| EngineError::RowShape(format!("measured column: {}", e));

    let value = match measured_type {
        MeasuredType::Float8 => row.try_get::<Option<f64>, _>(2).map_err(decode_err)?,
        MeasuredType::Float4 => row
            .try_get::<Option<f32>, _>(2)
            .map_err(decode_err)?
            .map(f64::from),
        MeasuredType::Int8 => row
            .try_get::<Option<i64>, _>(2)
            .map_err(decode_err)?
            .map(|v| v as f64),
        MeasuredType::Int4 => row
            .try_get::<Option<i32>, _>(2)
            .map_err(decode_err)?
            .map(f64::from),
        MeasuredType::Int2 => row
            .try_get::<Option<i16>, _>(2)
            .map_err(decode_err)?
            .map(f64::from),
        MeasuredType::Numeric => row
            .try_get::<Option<Decimal>, _>(2)
            .map_err(decode_err)?
            .and_then(|d| d.to_f64()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::USAGE_COLUMNS;

    #[test]
    fn test_numeric_measured_types_accepted() {
        assert_eq!(MeasuredType::from_type_name("FLOAT8").unwrap(), MeasuredType::Float8);
        assert_eq!(MeasuredType::from_type_name("INT4").unwrap(), MeasuredType::Int4);
        assert_eq!(MeasuredType::from_type_name("NUMERIC").unwrap(), MeasuredType::Numeric);
    }

    #[test]
    fn test_non_numeric_measured_type_rejected() {
        for name in ["TEXT", "VARCHAR", "BOOL", "DATE"] {
            let err = MeasuredType::from_type_name(name).unwrap_err();
            assert!(matches!(err, EngineError::RowShape(ref msg) if msg.contains(name)));
        }
    }

    #[test]
    fn test_usage_row_contract() {
        assert!(check_usage_arity(USAGE_COLUMNS).is_ok());
        assert!(check_usage_arity(2).is_err());
        assert!(check_usage_arity(4).is_err());
        assert!(matches!(require_measured(None), Err(EngineError::RowShape(_))));
    }
}
