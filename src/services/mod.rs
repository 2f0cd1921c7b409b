//! Services module
//!
//! The pricing pipeline: model resolution, mapping fan-out, metric routing
//! and the reporting sinks, driven by [`PipelineController`].

pub mod mapping_resolver;
pub mod metric_router;
pub mod pipeline;
pub mod pricing_model;
pub mod reporting_sink;

pub use mapping_resolver::{ApplicationMappingResolver, ResolvedMapping};
pub use metric_router::MetricRouter;
pub use pipeline::{GroupOutcome, GroupReport, PipelineController, RunSummary};
pub use pricing_model::{PricingModelResolver, Resolution, SkipReason, TargetYear};
pub use reporting_sink::{round_price, PeriodPrices, ReportingSink};
