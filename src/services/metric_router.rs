//! Metric routing
//!
//! Sends each usage row to the sink matching its group's purpose: pricing
//! figures to the pricing tables, SLA metrics to the SLA tables.

use crate::db::models::{Purpose, UsageRow};
use crate::db::StoreError;

use super::reporting_sink::ReportingSink;

#[derive(Clone)]
pub struct MetricRouter {
    pricing: ReportingSink,
    sla: ReportingSink,
}

impl MetricRouter {
    pub fn new(pricing: ReportingSink, sla: ReportingSink) -> Self {
        Self { pricing, sla }
    }

    pub fn sink_for(&self, purpose: Purpose) -> &ReportingSink {
        match purpose {
            Purpose::Pricing => &self.pricing,
            Purpose::Sla => &self.sla,
        }
    }

    /// Persist one usage row, treating its measured value as a yearly figure
    pub async fn route(&self, row: &UsageRow, purpose: Purpose) -> Result<usize, StoreError> {
        let sink = self.sink_for(purpose);
        tracing::debug!(
            sink = sink.name(),
            application_group = %row.application_group,
            platform = ?row.platform,
            measured = row.measured,
            "Routing usage row"
        );
        sink.report(&row.application_group, row.platform.as_deref(), row.measured)
            .await
    }
}
