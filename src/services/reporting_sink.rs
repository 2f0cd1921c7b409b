//! Reporting sink
//!
//! Converts a yearly figure into the daily (and, at a month boundary,
//! monthly) records of one sink and persists them as a single batch.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::{MonthlyPolicy, SinkTables};
use crate::db::models::{ReportingPeriod, ReportingRecord};
use crate::db::{ReportingStore, StoreError};

// ============================================================================
// Period conversion
// ============================================================================

pub const DAYS_PER_YEAR: f64 = 365.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Round to two decimal places, half away from zero
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Daily and optional monthly share of a yearly figure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodPrices {
    pub daily: f64,
    pub monthly: Option<f64>,
}

impl PeriodPrices {
    pub fn from_yearly(yearly: f64, emit_monthly: bool) -> Self {
        Self {
            daily: round_price(yearly / DAYS_PER_YEAR),
            monthly: emit_monthly.then(|| round_price(yearly / MONTHS_PER_YEAR)),
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

/// One reporting destination: a daily and a monthly table
#[derive(Clone)]
pub struct ReportingSink {
    name: &'static str,
    store: Arc<dyn ReportingStore>,
    tables: SinkTables,
    policy: MonthlyPolicy,
    report_date: NaiveDate,
}

impl ReportingSink {
    pub fn new(
        name: &'static str,
        store: Arc<dyn ReportingStore>,
        tables: SinkTables,
        policy: MonthlyPolicy,
        report_date: NaiveDate,
    ) -> Self {
        Self {
            name,
            store,
            tables,
            policy,
            report_date,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Records a yearly figure expands to on the report date
    pub fn records_for(
        &self,
        application_group: &str,
        platform: Option<&str>,
        yearly: f64,
    ) -> Vec<ReportingRecord> {
        let prices = PeriodPrices::from_yearly(yearly, self.policy.emits_monthly(self.report_date));

        let mut records = vec![ReportingRecord {
            application_group: application_group.to_string(),
            platform: platform.map(str::to_string),
            period: ReportingPeriod::Daily(self.report_date),
            price: prices.daily,
        }];

        if let Some(monthly) = prices.monthly {
            records.push(ReportingRecord {
                application_group: application_group.to_string(),
                platform: platform.map(str::to_string),
                period: ReportingPeriod::month_of(self.report_date),
                price: monthly,
            });
        }

        records
    }

    /// Persist a yearly figure, returning the number of records written
    ///
    /// Daily and monthly records go out in one batch; on error neither is
    /// visible.
    pub async fn report(
        &self,
        application_group: &str,
        platform: Option<&str>,
        yearly: f64,
    ) -> Result<usize, StoreError> {
        let records = self.records_for(application_group, platform, yearly);

        self.store.write_batch(&self.tables, &records).await?;

        for record in &records {
            tracing::info!(
                sink = self.name,
                application_group = %record.application_group,
                platform = ?record.platform,
                period = %record.period,
                price = record.price,
                "Inserted reporting record"
            );
        }

        Ok(records.len())
    }
}
