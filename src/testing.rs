//! In-memory fakes for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::SinkTables;
use crate::db::models::{
    ApplicationGroup, ApplicationMapping, DriverReference, MatrixPriceEntry, PxqRecord, ReportingRecord,
    UsageRow,
};
use crate::db::{ConfigStore, ReportingStore, StoreError};
use crate::engines::{BoundStatement, ConnectionTarget, EngineError, EngineKind, QueryEngine};

pub fn driver(reference: i64, engine: &str, path: &str) -> DriverReference {
    DriverReference {
        reference,
        engine: engine.to_string(),
        connection_path: path.to_string(),
        driver_class: None,
        username: "reader".to_string(),
        password: "secret".to_string(),
    }
}

pub fn mapping(group: &str, app_name: &str, driver_reference: i64, query: &str) -> ApplicationMapping {
    ApplicationMapping {
        application_group: group.to_string(),
        app_name: app_name.to_string(),
        db_name: None,
        environment: "prod".to_string(),
        driver_reference,
        query: query.to_string(),
    }
}

// ============================================================================
// Configuration store
// ============================================================================

#[derive(Default)]
pub struct InMemoryConfigStore {
    groups: Vec<ApplicationGroup>,
    pxq: HashMap<String, Option<f64>>,
    matrix: HashMap<String, MatrixPriceEntry>,
    mappings: HashMap<String, Vec<ApplicationMapping>>,
    drivers: HashMap<i64, DriverReference>,
    failing_groups_list: bool,
    failing_mappings: HashSet<String>,
    failing_drivers: HashSet<i64>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: ApplicationGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// PXQ record without a yearly price
    pub fn with_pxq_record(mut self, group: &str) -> Self {
        self.pxq.insert(group.to_string(), None);
        self
    }

    pub fn with_pxq_price(mut self, group: &str, yearly_price: f64) -> Self {
        self.pxq.insert(group.to_string(), Some(yearly_price));
        self
    }

    pub fn with_matrix(mut self, group: &str, price_year1: f64, price_year2: f64) -> Self {
        self.matrix.insert(
            group.to_string(),
            MatrixPriceEntry {
                application_group: group.to_string(),
                price_year1,
                price_year2,
            },
        );
        self
    }

    pub fn with_mapping(mut self, mapping: ApplicationMapping) -> Self {
        self.mappings
            .entry(mapping.application_group.clone())
            .or_default()
            .push(mapping);
        self
    }

    pub fn with_driver(mut self, driver: DriverReference) -> Self {
        self.drivers.insert(driver.reference, driver);
        self
    }

    pub fn failing_groups_list(mut self) -> Self {
        self.failing_groups_list = true;
        self
    }

    pub fn failing_mappings_for(mut self, group: &str) -> Self {
        self.failing_mappings.insert(group.to_string());
        self
    }

    pub fn failing_driver(mut self, reference: i64) -> Self {
        self.failing_drivers.insert(reference);
        self
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn application_groups(&self) -> Result<Vec<ApplicationGroup>, StoreError> {
        if self.failing_groups_list {
            return Err(StoreError::Database("relation does not exist".to_string()));
        }
        Ok(self.groups.clone())
    }

    async fn pxq_record(&self, application_group: &str) -> Result<Option<PxqRecord>, StoreError> {
        Ok(self.pxq.get(application_group).map(|yearly_price| PxqRecord {
            application_group: application_group.to_string(),
            yearly_price: *yearly_price,
        }))
    }

    async fn matrix_entry(
        &self,
        application_group: &str,
    ) -> Result<Option<MatrixPriceEntry>, StoreError> {
        Ok(self.matrix.get(application_group).cloned())
    }

    async fn application_mappings(
        &self,
        application_group: &str,
    ) -> Result<Vec<ApplicationMapping>, StoreError> {
        if self.failing_mappings.contains(application_group) {
            return Err(StoreError::Database("connection reset".to_string()));
        }
        Ok(self.mappings.get(application_group).cloned().unwrap_or_default())
    }

    async fn driver_reference(&self, reference: i64) -> Result<Option<DriverReference>, StoreError> {
        if self.failing_drivers.contains(&reference) {
            return Err(StoreError::ParseError("db_driver_path is NULL".to_string()));
        }
        Ok(self.drivers.get(&reference).cloned())
    }
}

// ============================================================================
// Reporting store
// ============================================================================

#[derive(Default)]
pub struct RecordingReportingStore {
    rows: Mutex<Vec<(String, ReportingRecord)>>,
    batches: AtomicUsize,
    failing_groups: HashSet<String>,
    fail_after: Option<usize>,
}

impl RecordingReportingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every batch containing a record for `group`
    pub fn failing_for(mut self, group: &str) -> Self {
        self.failing_groups.insert(group.to_string());
        self
    }

    /// Fail every batch once `batches` batches have been committed
    pub fn failing_after(mut self, batches: usize) -> Self {
        self.fail_after = Some(batches);
        self
    }

    /// Records written to `table`, in write order
    pub fn rows_in(&self, table: &str) -> Vec<ReportingRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportingStore for RecordingReportingStore {
    async fn write_batch(
        &self,
        tables: &SinkTables,
        records: &[ReportingRecord],
    ) -> Result<(), StoreError> {
        if records
            .iter()
            .any(|r| self.failing_groups.contains(&r.application_group))
            || self.fail_after.is_some_and(|n| self.batches() >= n)
        {
            // Nothing from a failed batch becomes visible
            return Err(StoreError::Database("deadlock detected".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        for record in records {
            let table = if record.period.is_monthly() {
                &tables.monthly
            } else {
                &tables.daily
            };
            rows.push((table.clone(), record.clone()));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Query engine
// ============================================================================

pub struct ScriptedEngine {
    kind: EngineKind,
    rows: Vec<UsageRow>,
    failure: Option<EngineError>,
    calls: AtomicUsize,
    last_statement: Mutex<Option<BoundStatement>>,
    last_target: Mutex<Option<ConnectionTarget>>,
}

impl ScriptedEngine {
    pub fn returning(kind: EngineKind, rows: Vec<UsageRow>) -> Self {
        Self {
            kind,
            rows,
            failure: None,
            calls: AtomicUsize::new(0),
            last_statement: Mutex::new(None),
            last_target: Mutex::new(None),
        }
    }

    pub fn failing(kind: EngineKind, failure: EngineError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::returning(kind, Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_statement(&self) -> Option<BoundStatement> {
        self.last_statement.lock().unwrap().clone()
    }

    pub fn last_target(&self) -> Option<ConnectionTarget> {
        self.last_target.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryEngine for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn fetch_usage(
        &self,
        target: &ConnectionTarget,
        statement: &BoundStatement,
    ) -> Result<Vec<UsageRow>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_statement.lock().unwrap() = Some(statement.clone());
        *self.last_target.lock().unwrap() = Some(target.clone());

        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(self.rows.clone()),
        }
    }
}
