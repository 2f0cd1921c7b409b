//! Pipeline controller
//!
//! Drives one invocation: every application group is resolved in turn,
//! matrix prices are reported directly and usage-based groups fan out over
//! their mapped sources. Each group ends with a [`GroupOutcome`]; a failing
//! group never stops the next one.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::models::{ApplicationGroup, Purpose};
use crate::db::{ConfigStore, ReportingStore};
use crate::engines::{BindContext, EngineConnector, EngineRegistry, QueryTemplate};
use crate::error::PipelineError;

use super::mapping_resolver::ApplicationMappingResolver;
use super::metric_router::MetricRouter;
use super::pricing_model::{PricingModelResolver, Resolution, SkipReason, TargetYear};
use super::reporting_sink::ReportingSink;

// ============================================================================
// Outcomes
// ============================================================================

/// How a single application group ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    Completed { records: usize },
    Skipped { reason: SkipReason },
    /// `records` counts what was committed before the failure
    Failed {
        records: usize,
        category: &'static str,
        error: String,
    },
}

impl GroupOutcome {
    fn failed(err: &PipelineError, records: usize) -> Self {
        GroupOutcome::Failed {
            records,
            category: err.category(),
            error: err.to_string(),
        }
    }

    /// Records committed for the group
    pub fn records(&self) -> usize {
        match self {
            GroupOutcome::Completed { records } | GroupOutcome::Failed { records, .. } => *records,
            GroupOutcome::Skipped { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub application_group: String,
    pub pricing_model: String,
    #[serde(flatten)]
    pub outcome: GroupOutcome,
}

/// Everything one invocation did, in group order
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report_date: NaiveDate,
    pub target_year: String,
    pub groups: Vec<GroupReport>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, GroupOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, GroupOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, GroupOutcome::Failed { .. }))
    }

    pub fn records_written(&self) -> usize {
        self.groups.iter().map(|g| g.outcome.records()).sum()
    }

    pub fn outcome_of(&self, application_group: &str) -> Option<&GroupOutcome> {
        self.groups
            .iter()
            .find(|g| g.application_group == application_group)
            .map(|g| &g.outcome)
    }

    fn count(&self, pred: impl Fn(&GroupOutcome) -> bool) -> usize {
        self.groups.iter().filter(|g| pred(&g.outcome)).count()
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct PipelineController {
    config_store: Arc<dyn ConfigStore>,
    pricing: PricingModelResolver,
    mappings: ApplicationMappingResolver,
    connector: EngineConnector,
    router: MetricRouter,
    report_date: NaiveDate,
}

impl PipelineController {
    pub fn new(
        settings: &Settings,
        config_store: Arc<dyn ConfigStore>,
        reporting_store: Arc<dyn ReportingStore>,
        registry: EngineRegistry,
        report_date: NaiveDate,
    ) -> Self {
        let sink = |name, tables| {
            ReportingSink::new(
                name,
                reporting_store.clone(),
                tables,
                settings.monthly_policy,
                report_date,
            )
        };
        let router = MetricRouter::new(
            sink("pricing", settings.tables.pricing_sink.clone()),
            sink("sla", settings.tables.sla_sink.clone()),
        );

        Self {
            pricing: PricingModelResolver::new(config_store.clone(), settings.matrix_years),
            mappings: ApplicationMappingResolver::new(config_store.clone()),
            connector: EngineConnector::new(registry),
            router,
            config_store,
            report_date,
        }
    }

    /// Process every application group once
    ///
    /// Only a failure to list the groups is returned as an error; anything
    /// that goes wrong inside a group is recorded in the summary.
    pub async fn run(&self, year: &TargetYear, run_id: Uuid) -> Result<RunSummary, PipelineError> {
        let span = tracing::info_span!("run", %run_id, target_year = %year, report_date = %self.report_date);
        self.run_groups(year, run_id).instrument(span).await
    }

    async fn run_groups(&self, year: &TargetYear, run_id: Uuid) -> Result<RunSummary, PipelineError> {
        let rows = self.config_store.application_groups().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load application groups");
            PipelineError::from(e)
        })?;
        let groups = unique_groups(rows);

        tracing::info!(groups = groups.len(), "Loaded application groups");

        let mut reports = Vec::with_capacity(groups.len());
        for group in groups {
            let span = tracing::info_span!(
                "group",
                application_group = %group.name,
                pricing_model = %group.pricing_model
            );
            let outcome = self.process_group(&group, year).instrument(span).await;

            match &outcome {
                GroupOutcome::Completed { records } => {
                    tracing::info!(application_group = %group.name, records, "Group completed")
                }
                GroupOutcome::Skipped { reason } => {
                    tracing::info!(application_group = %group.name, %reason, "Group skipped")
                }
                GroupOutcome::Failed { records, category, error } => {
                    tracing::error!(
                        application_group = %group.name,
                        records,
                        category,
                        error = %error,
                        "Group failed"
                    )
                }
            }

            reports.push(GroupReport {
                application_group: group.name.clone(),
                pricing_model: group.pricing_model.to_string(),
                outcome,
            });
        }

        let summary = RunSummary {
            run_id,
            report_date: self.report_date,
            target_year: year.raw().to_string(),
            groups: reports,
        };

        tracing::info!(
            completed = summary.completed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            records = summary.records_written(),
            "Run finished"
        );

        Ok(summary)
    }

    async fn process_group(&self, group: &ApplicationGroup, year: &TargetYear) -> GroupOutcome {
        tracing::info!(application_group = %group.name, "Processing application group");

        let resolution = match self.pricing.resolve(group, year).await {
            Ok(resolution) => resolution,
            Err(e) => return GroupOutcome::failed(&e, 0),
        };

        let mut records = 0;
        let result = match resolution {
            Resolution::Skipped(reason) => return GroupOutcome::Skipped { reason },
            Resolution::Matrix { yearly_price } => {
                self.report_yearly(group, yearly_price, &mut records).await
            }
            Resolution::UsageBased { yearly_price } => {
                self.fan_out(group, year, yearly_price, &mut records).await
            }
        };

        match result {
            Ok(None) => GroupOutcome::Completed { records },
            Ok(Some(reason)) => GroupOutcome::Skipped { reason },
            Err(e) => GroupOutcome::failed(&e, records),
        }
    }

    /// Report a group's own yearly price to the pricing sink, without a platform
    async fn report_yearly(
        &self,
        group: &ApplicationGroup,
        yearly_price: f64,
        records: &mut usize,
    ) -> Result<Option<SkipReason>, PipelineError> {
        *records += self
            .router
            .sink_for(Purpose::Pricing)
            .report(&group.name, None, yearly_price)
            .await?;
        Ok(None)
    }

    /// Fetch usage from every mapped source and route each row, then report
    /// the PXQ yearly price
    ///
    /// `records` is updated after every committed batch so a later failure
    /// still accounts for what was written.
    async fn fan_out(
        &self,
        group: &ApplicationGroup,
        year: &TargetYear,
        yearly_price: Option<f64>,
        records: &mut usize,
    ) -> Result<Option<SkipReason>, PipelineError> {
        let resolved = self.mappings.resolve(&group.name).await?;
        if resolved.is_empty() {
            return Ok(Some(SkipReason::NoMappings));
        }

        let ctx = BindContext::new(group.name.clone(), year.value(), self.report_date);
        let purpose = group.routing_purpose();

        for entry in resolved {
            let template = QueryTemplate::new(entry.mapping.query.clone());
            let rows = self.connector.fetch_usage(&entry.driver, &template, &ctx).await;

            for row in &rows {
                *records += self.router.route(row, purpose).await?;
            }
        }

        match yearly_price {
            Some(yearly_price) => self.report_yearly(group, yearly_price, records).await,
            None => {
                tracing::warn!(
                    application_group = %group.name,
                    "PXQ record has no yearly price, only usage figures reported"
                );
                Ok(None)
            }
        }
    }
}

/// Keep the first row of every group so each is processed once per run
fn unique_groups(rows: Vec<ApplicationGroup>) -> Vec<ApplicationGroup> {
    let mut seen = HashSet::new();
    let mut groups = Vec::with_capacity(rows.len());
    for group in rows {
        if seen.insert(group.name.clone()) {
            groups.push(group);
        } else {
            tracing::warn!(
                application_group = %group.name,
                pricing_model = %group.pricing_model,
                "Duplicate pricing model row ignored"
            );
        }
    }
    groups
}
