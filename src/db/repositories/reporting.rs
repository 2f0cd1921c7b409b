//! Reporting repository
//!
//! Writes daily and monthly figures into a sink's table pair. All records
//! of one call share a transaction, so a failure after the daily insert
//! leaves neither row behind.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{SinkTables, WritePolicy};
use crate::db::models::{ReportingPeriod, ReportingRecord};
use crate::db::{ReportingDb, ReportingStore, StoreError};

/// Repository for the reporting output tables
#[derive(Clone)]
pub struct ReportingRepository {
    client: Arc<ReportingDb>,
    policy: WritePolicy,
}

impl ReportingRepository {
    /// Create a new reporting repository
    pub fn new(client: Arc<ReportingDb>, policy: WritePolicy) -> Self {
        Self { client, policy }
    }
}

#[async_trait]
impl ReportingStore for ReportingRepository {
    async fn write_batch(
        &self,
        tables: &SinkTables,
        records: &[ReportingRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.client.pool().begin().await?;

        for record in records {
            let sql = insert_statement(tables, &record.period, self.policy);
            let query = sqlx::query(&sql)
                .bind(&record.application_group)
                .bind(record.platform.as_deref());
            let query = match &record.period {
                ReportingPeriod::Daily(date) => query.bind(*date),
                ReportingPeriod::Monthly(month) => query.bind(month.as_str()),
            };
            query.bind(record.price).execute(&mut *tx).await?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().await?;

        tracing::debug!(
            daily_table = %tables.daily,
            monthly_table = %tables.monthly,
            records = records.len(),
            "Committed reporting batch"
        );

        Ok(())
    }
}

/// Build the INSERT statement for one record
///
/// The upsert conflict target needs a `UNIQUE NULLS NOT DISTINCT` index on
/// `(application_group_name, platform, date|month)` in the sink table.
fn insert_statement(tables: &SinkTables, period: &ReportingPeriod, policy: WritePolicy) -> String {
    let (table, period_column) = match period {
        ReportingPeriod::Daily(_) => (&tables.daily, "date"),
        ReportingPeriod::Monthly(_) => (&tables.monthly, "month"),
    };

    let insert = format!(
        "INSERT INTO {} (application_group_name, platform, {}, price) VALUES ($1, $2, $3, $4)",
        table, period_column
    );

    match policy {
        WritePolicy::Append => insert,
        WritePolicy::Upsert => format!(
            "{} ON CONFLICT (application_group_name, platform, {}) DO UPDATE SET price = EXCLUDED.price",
            insert, period_column
        ),
    }
}

/// Reporting store that logs records instead of writing them
#[derive(Debug, Default)]
pub struct DryRunReportingStore {
    written: AtomicUsize,
}

impl DryRunReportingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records that would have been written
    pub fn records_seen(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportingStore for DryRunReportingStore {
    async fn write_batch(
        &self,
        tables: &SinkTables,
        records: &[ReportingRecord],
    ) -> Result<(), StoreError> {
        for record in records {
            let table = if record.period.is_monthly() {
                &tables.monthly
            } else {
                &tables.daily
            };
            tracing::info!(
                table = %table,
                application_group = %record.application_group,
                platform = record.platform.as_deref().unwrap_or("-"),
                period = %record.period,
                price = record.price,
                "Dry run: would insert reporting record"
            );
        }
        self.written.fetch_add(records.len(), Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tables() -> SinkTables {
        SinkTables {
            daily: "daily_table".to_string(),
            monthly: "monthly_table".to_string(),
        }
    }

    #[test]
    fn test_append_statements() {
        let daily = ReportingPeriod::Daily(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(
            insert_statement(&tables(), &daily, WritePolicy::Append),
            "INSERT INTO daily_table (application_group_name, platform, date, price) VALUES ($1, $2, $3, $4)"
        );

        let monthly = ReportingPeriod::Monthly("2024-05".to_string());
        assert_eq!(
            insert_statement(&tables(), &monthly, WritePolicy::Append),
            "INSERT INTO monthly_table (application_group_name, platform, month, price) VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn test_upsert_statement_keys_on_period() {
        let monthly = ReportingPeriod::Monthly("2024-05".to_string());
        let sql = insert_statement(&tables(), &monthly, WritePolicy::Upsert);
        assert!(sql.starts_with("INSERT INTO monthly_table"));
        assert!(sql.ends_with(
            "ON CONFLICT (application_group_name, platform, month) DO UPDATE SET price = EXCLUDED.price"
        ));
    }

    #[tokio::test]
    async fn test_dry_run_counts_records() {
        let store = DryRunReportingStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let records = vec![
            ReportingRecord {
                application_group: "G1".to_string(),
                platform: None,
                period: ReportingPeriod::Daily(date),
                price: 20.0,
            },
            ReportingRecord {
                application_group: "G1".to_string(),
                platform: None,
                period: ReportingPeriod::month_of(date),
                price: 608.33,
            },
        ];

        store.write_batch(&tables(), &records).await.unwrap();
        assert_eq!(store.records_seen(), 2);
    }
}
