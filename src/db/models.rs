//! Reporting database models
//!
//! Typed records for the configuration tables the pipeline reads and the
//! reporting rows it writes. Raw rows are decoded with `sqlx::FromRow` and
//! converted into these types at the data-access boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag stored in the pricing model table for usage-based groups
pub const PXQ_MODEL_TAG: &str = "PXQ";

/// How an application group is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingModel {
    /// "PXQ": charge derived from usage fetched from external systems
    UsageBased,
    /// Static, year-indexed price table
    FixedMatrix,
}

impl PricingModel {
    /// Anything other than the PXQ tag is billed from the price matrix
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case(PXQ_MODEL_TAG) {
            PricingModel::UsageBased
        } else {
            PricingModel::FixedMatrix
        }
    }
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingModel::UsageBased => write!(f, "PXQ"),
            PricingModel::FixedMatrix => write!(f, "matrix"),
        }
    }
}

/// Which reporting sink a group's usage feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Pricing,
    Sla,
}

impl Purpose {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "pricing" | "price" => Some(Purpose::Pricing),
            "sla" => Some(Purpose::Sla),
            _ => None,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Pricing => write!(f, "pricing"),
            Purpose::Sla => write!(f, "sla"),
        }
    }
}

/// The billing/reporting unit every mapping and price is keyed by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationGroup {
    pub name: String,
    pub pricing_model: PricingModel,
    pub purpose: Option<Purpose>,
}

impl ApplicationGroup {
    pub fn new(name: impl Into<String>, pricing_model: PricingModel, purpose: Option<Purpose>) -> Self {
        Self {
            name: name.into(),
            pricing_model,
            purpose,
        }
    }

    /// Purpose used to route usage rows; untagged groups report pricing
    pub fn routing_purpose(&self) -> Purpose {
        self.purpose.unwrap_or(Purpose::Pricing)
    }
}

/// Raw row of the pricing model table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationGroupRow {
    pub application_group_name: String,
    pub pricing_model: String,
    pub purpose: Option<String>,
}

impl From<ApplicationGroupRow> for ApplicationGroup {
    fn from(row: ApplicationGroupRow) -> Self {
        let purpose = row.purpose.as_deref().and_then(Purpose::from_tag);
        if purpose.is_none() {
            if let Some(raw) = row.purpose.as_deref() {
                tracing::warn!(
                    application_group = %row.application_group_name,
                    purpose = %raw,
                    "Unknown purpose tag, routing to pricing"
                );
            }
        }

        Self {
            pricing_model: PricingModel::from_tag(&row.pricing_model),
            name: row.application_group_name,
            purpose,
        }
    }
}

/// The PXQ pricing model row of a usage-billed group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PxqRecord {
    #[sqlx(rename = "application_group_name")]
    pub application_group: String,
    /// Yearly base price reported alongside the usage figures
    #[sqlx(rename = "dupricing_model")]
    pub yearly_price: Option<f64>,
}

/// Fixed yearly prices for a matrix-billed group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatrixPriceEntry {
    #[sqlx(rename = "application_group_name")]
    pub application_group: String,
    pub price_year1: f64,
    pub price_year2: f64,
}

/// Connection details behind an opaque driver reference number
#[derive(Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DriverReference {
    #[sqlx(rename = "db_driver_reference_number")]
    pub reference: i64,
    #[sqlx(rename = "db_engine")]
    pub engine: String,
    /// `host:port:database-or-service`
    #[sqlx(rename = "db_driver_path")]
    pub connection_path: String,
    #[sqlx(rename = "db_driver_class")]
    pub driver_class: Option<String>,
    #[sqlx(rename = "db_username")]
    pub username: String,
    #[serde(skip_serializing)]
    #[sqlx(rename = "db_password")]
    pub password: String,
}

impl fmt::Debug for DriverReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverReference")
            .field("reference", &self.reference)
            .field("engine", &self.engine)
            .field("connection_path", &self.connection_path)
            .field("driver_class", &self.driver_class)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One stored query describing where a group's usage comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationMapping {
    #[sqlx(rename = "application_group_name")]
    pub application_group: String,
    pub app_name: String,
    pub db_name: Option<String>,
    pub environment: String,
    #[sqlx(rename = "db_driver_reference_number")]
    pub driver_reference: i64,
    /// Query template; see [`crate::engines::QueryTemplate`]
    #[sqlx(rename = "sql_query")]
    pub query: String,
}

/// A measured usage figure returned by an external engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    pub application_group: String,
    pub platform: Option<String>,
    pub measured: f64,
}

impl UsageRow {
    pub fn new(application_group: impl Into<String>, platform: Option<&str>, measured: f64) -> Self {
        Self {
            application_group: application_group.into(),
            platform: platform.map(str::to_string),
            measured,
        }
    }
}

/// Reporting period of a persisted figure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ReportingPeriod {
    Daily(NaiveDate),
    /// `YYYY-MM`
    Monthly(String),
}

impl ReportingPeriod {
    /// Monthly period containing `date`
    pub fn month_of(date: NaiveDate) -> Self {
        ReportingPeriod::Monthly(date.format("%Y-%m").to_string())
    }

    pub fn is_monthly(&self) -> bool {
        matches!(self, ReportingPeriod::Monthly(_))
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportingPeriod::Daily(date) => write!(f, "{}", date),
            ReportingPeriod::Monthly(month) => write!(f, "{}", month),
        }
    }
}

/// A computed price or metric ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingRecord {
    pub application_group: String,
    pub platform: Option<String>,
    pub period: ReportingPeriod,
    pub price: f64,
}
