//! Application settings and configuration
//!
//! This module provides configuration management for the pipeline,
//! loading settings from environment variables with sensible defaults.
//! The resulting [`Settings`] value is passed explicitly to every component
//! that needs it; nothing reads configuration from process-wide state.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::utils::is_sql_identifier;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// When a monthly reporting record is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonthlyPolicy {
    /// Emit a monthly record iff the run date is the first day of the month
    FirstDay,
    /// Never emit monthly records
    Disabled,
}

impl MonthlyPolicy {
    /// Whether a run on `date` reaches the monthly period boundary
    pub fn emits_monthly(&self, date: NaiveDate) -> bool {
        match self {
            MonthlyPolicy::FirstDay => date.day() == 1,
            MonthlyPolicy::Disabled => false,
        }
    }
}

impl Default for MonthlyPolicy {
    fn default() -> Self {
        MonthlyPolicy::FirstDay
    }
}

impl std::str::FromStr for MonthlyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-day" | "first_day" => Ok(MonthlyPolicy::FirstDay),
            "disabled" | "off" => Ok(MonthlyPolicy::Disabled),
            _ => anyhow::bail!("Invalid monthly policy: {}. Expected: first-day or disabled", s),
        }
    }
}

/// How reporting rows are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Plain INSERT; reruns on the same day produce duplicate rows
    Append,
    /// INSERT ... ON CONFLICT DO UPDATE keyed on (group, platform, period)
    ///
    /// Needs a unique index on those columns in every sink table. Group-level
    /// yearly prices are written with a NULL platform, so the index must be
    /// `UNIQUE NULLS NOT DISTINCT` (PostgreSQL 15+) or those rows never
    /// conflict and are appended as before.
    Upsert,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy::Append
    }
}

impl std::str::FromStr for WritePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" | "insert" => Ok(WritePolicy::Append),
            "upsert" => Ok(WritePolicy::Upsert),
            _ => anyhow::bail!("Invalid write policy: {}. Expected: append or upsert", s),
        }
    }
}

/// Connection settings for the central reporting database
#[derive(Clone, Deserialize, Serialize)]
pub struct ReportingDbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl fmt::Debug for ReportingDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingDbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .finish()
    }
}

impl Default for ReportingDbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "reporting".to_string(),
            user: "postgres".to_string(),
            password: None,
            max_connections: 2,
            connect_timeout_seconds: 10,
        }
    }
}

/// The two calendar years a price matrix carries prices for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixYears {
    /// Year priced by `price_year1`
    pub year1: i32,
    /// Year priced by `price_year2`
    pub year2: i32,
}

impl Default for MatrixYears {
    fn default() -> Self {
        Self {
            year1: 2022,
            year2: 2023,
        }
    }
}

/// Daily and monthly tables written by one reporting sink
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SinkTables {
    pub daily: String,
    pub monthly: String,
}

/// Table names for the configuration and output stores
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableNames {
    pub pricing_model: String,
    pub pricing_matrix: String,
    pub application_mapping: String,
    pub driver_registry: String,
    pub pricing_sink: SinkTables,
    pub sla_sink: SinkTables,
}

impl TableNames {
    fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("PRICING_MODEL_TABLE", &self.pricing_model),
            ("PRICING_MATRIX_TABLE", &self.pricing_matrix),
            ("APPLICATION_MAPPING_TABLE", &self.application_mapping),
            ("DRIVER_REGISTRY_TABLE", &self.driver_registry),
            ("DAILY_TABLE", &self.pricing_sink.daily),
            ("MONTHLY_TABLE", &self.pricing_sink.monthly),
            ("SLA_DAILY_TABLE", &self.sla_sink.daily),
            ("SLA_MONTHLY_TABLE", &self.sla_sink.monthly),
        ]
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            pricing_model: "pricing_model_table".to_string(),
            pricing_matrix: "pricing_matrix_table".to_string(),
            application_mapping: "database_table".to_string(),
            driver_registry: "database_driver_table".to_string(),
            pricing_sink: SinkTables {
                daily: "daily_table".to_string(),
                monthly: "monthly_table".to_string(),
            },
            sla_sink: SinkTables {
                daily: "sla_daily_table".to_string(),
                monthly: "sla_monthly_table".to_string(),
            },
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,
    /// Directory for per-run and shared log files; console only when unset
    pub log_dir: Option<PathBuf>,

    // Central reporting database
    pub reporting_db: ReportingDbConfig,

    // Pricing
    pub matrix_years: MatrixYears,
    pub monthly_policy: MonthlyPolicy,
    pub write_policy: WritePolicy,

    // Tables
    pub tables: TableNames,

    /// Log reporting records instead of writing them
    #[serde(default)]
    pub dry_run: bool,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = TableNames::default();

        let settings = Self {
            app_name: env_or_default("APP_NAME", "pricing-pipeline"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),
            log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),

            reporting_db: ReportingDbConfig {
                host: env_or_default("REPORTING_DB_HOST", "localhost"),
                port: env_or_default("REPORTING_DB_PORT", "5432")
                    .parse()
                    .context("Invalid REPORTING_DB_PORT value")?,
                name: env_or_default("REPORTING_DB_NAME", "reporting"),
                user: env_or_default("REPORTING_DB_USER", "postgres"),
                password: env::var("REPORTING_DB_PASSWORD").ok(),
                max_connections: env_or_default("REPORTING_DB_MAX_CONNECTIONS", "2")
                    .parse()
                    .context("Invalid REPORTING_DB_MAX_CONNECTIONS value")?,
                connect_timeout_seconds: env_or_default("REPORTING_DB_CONNECT_TIMEOUT_SECONDS", "10")
                    .parse()
                    .unwrap_or(10),
            },

            matrix_years: MatrixYears {
                year1: env_or_default("MATRIX_YEAR1", "2022")
                    .parse()
                    .context("Invalid MATRIX_YEAR1 value")?,
                year2: env_or_default("MATRIX_YEAR2", "2023")
                    .parse()
                    .context("Invalid MATRIX_YEAR2 value")?,
            },
            monthly_policy: env_or_default("MONTHLY_POLICY", "first-day").parse()?,
            write_policy: env_or_default("WRITE_POLICY", "append").parse()?,

            tables: TableNames {
                pricing_model: env_or_default("PRICING_MODEL_TABLE", &defaults.pricing_model),
                pricing_matrix: env_or_default("PRICING_MATRIX_TABLE", &defaults.pricing_matrix),
                application_mapping: env_or_default(
                    "APPLICATION_MAPPING_TABLE",
                    &defaults.application_mapping,
                ),
                driver_registry: env_or_default("DRIVER_REGISTRY_TABLE", &defaults.driver_registry),
                pricing_sink: SinkTables {
                    daily: env_or_default("DAILY_TABLE", &defaults.pricing_sink.daily),
                    monthly: env_or_default("MONTHLY_TABLE", &defaults.pricing_sink.monthly),
                },
                sla_sink: SinkTables {
                    daily: env_or_default("SLA_DAILY_TABLE", &defaults.sla_sink.daily),
                    monthly: env_or_default("SLA_MONTHLY_TABLE", &defaults.sla_sink.monthly),
                },
            },

            dry_run: env_or_default("DRY_RUN", "false").parse().unwrap_or(false),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.matrix_years.year1 == self.matrix_years.year2 {
            anyhow::bail!(
                "MATRIX_YEAR1 and MATRIX_YEAR2 must differ (both are {})",
                self.matrix_years.year1
            );
        }

        if self.reporting_db.max_connections == 0 {
            anyhow::bail!("REPORTING_DB_MAX_CONNECTIONS must be > 0");
        }

        // Table names are interpolated into SQL, so only plain identifiers pass
        for (key, name) in self.tables.all() {
            if !is_sql_identifier(name) {
                anyhow::bail!("{} is not a valid table name: {:?}", key, name);
            }
        }

        Ok(())
    }

    /// Non-fatal configuration problems, for logging once tracing is up
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.is_production() && self.reporting_db.password.is_none() {
            warnings.push("Running in production without REPORTING_DB_PASSWORD set".to_string());
        }
        if self.is_production() && self.dry_run {
            warnings.push("Dry run in production: nothing will be written".to_string());
        }
        warnings
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "pricing-pipeline".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            log_dir: None,
            reporting_db: ReportingDbConfig::default(),
            matrix_years: MatrixYears::default(),
            monthly_policy: MonthlyPolicy::default(),
            write_policy: WritePolicy::default(),
            tables: TableNames::default(),
            dry_run: false,
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
