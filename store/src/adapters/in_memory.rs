use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tablesess_core::{EntityFilter, SessionEntity, TableError, TableResult, TableService};
use tracing::debug;

type Rows = BTreeMap<(String, String), SessionEntity>;

/// In-memory implementation of TableService, for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryTableService {
    /// Thread-safe storage of tables and their rows
    tables: Arc<RwLock<HashMap<String, Rows>>>,
    /// Row keys whose reads and deletes fail as if the service were unreachable
    failing_rows: Arc<RwLock<HashSet<String>>>,
    /// Tables whose lookups and creates fail the same way
    failing_tables: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryTableService {
    /// Create a new InMemoryTableService with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every get/delete of `row_key` fail with a 503
    pub fn fail_row(&self, row_key: &str) {
        if let Ok(mut failing) = self.failing_rows.write() {
            failing.insert(row_key.to_string());
        }
    }

    /// Make every get/create of `table` fail with a 503
    pub fn fail_table(&self, table: &str) {
        if let Ok(mut failing) = self.failing_tables.write() {
            failing.insert(table.to_string());
        }
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(table))
            .unwrap_or(false)
    }

    /// Direct row access, bypassing failure injection
    pub fn row(&self, table: &str, partition_key: &str, row_key: &str) -> Option<SessionEntity> {
        let tables = self.tables.read().ok()?;
        tables
            .get(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    /// Number of rows in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).map(|rows| rows.len()))
            .unwrap_or(0)
    }

    fn check_row(&self, row_key: &str) -> TableResult<()> {
        check_failing(&self.failing_rows, row_key)
    }

    fn check_table(&self, table: &str) -> TableResult<()> {
        check_failing(&self.failing_tables, table)
    }

    /// Runs `f` against the rows of `table`, which must exist
    fn with_rows<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Rows) -> TableResult<R>,
    ) -> TableResult<R> {
        let mut tables = self.tables.write().map_err(|e| {
            TableError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| TableError::not_found(table))?;
        f(rows)
    }
}

fn check_failing(failing: &RwLock<HashSet<String>>, name: &str) -> TableResult<()> {
    let failing = failing
        .read()
        .map_err(|e| TableError::Storage(format!("Failed to acquire read lock: {}", e)))?;
    if failing.contains(name) {
        return Err(TableError::Http {
            status_code: 503,
            message: format!("Injected failure for {}", name),
        });
    }
    Ok(())
}

fn key_of(entity: &SessionEntity) -> (String, String) {
    (entity.partition_key.clone(), entity.row_key.clone())
}

#[async_trait]
impl TableService for InMemoryTableService {
    async fn get_table(&self, table: &str) -> TableResult<()> {
        self.check_table(table)?;
        if self.table_exists(table) {
            Ok(())
        } else {
            Err(TableError::not_found(table))
        }
    }

    async fn create_table(&self, table: &str) -> TableResult<()> {
        self.check_table(table)?;
        let mut tables = self.tables.write().map_err(|e| {
            TableError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        if tables.contains_key(table) {
            return Err(TableError::conflict(table));
        }
        tables.insert(table.to_string(), Rows::new());
        debug!("Created table: {}", table);
        Ok(())
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<SessionEntity> {
        self.check_row(row_key)?;
        self.with_rows(table, |rows| {
            rows.get(&(partition_key.to_string(), row_key.to_string()))
                .cloned()
                .ok_or_else(|| TableError::not_found(row_key))
        })
    }

    async fn insert_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        self.with_rows(table, |rows| {
            let key = key_of(entity);
            if rows.contains_key(&key) {
                return Err(TableError::conflict(&entity.row_key));
            }
            rows.insert(key, entity.clone());
            Ok(())
        })
    }

    async fn update_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        self.with_rows(table, |rows| match rows.get_mut(&key_of(entity)) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(())
            }
            None => Err(TableError::not_found(&entity.row_key)),
        })
    }

    async fn insert_or_replace_entity(
        &self,
        table: &str,
        entity: &SessionEntity,
    ) -> TableResult<()> {
        self.with_rows(table, |rows| {
            rows.insert(key_of(entity), entity.clone());
            Ok(())
        })
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<()> {
        self.check_row(row_key)?;
        self.with_rows(table, |rows| {
            rows.remove(&(partition_key.to_string(), row_key.to_string()))
                .map(|_| ())
                .ok_or_else(|| TableError::not_found(row_key))
        })
    }

    async fn query_entities(
        &self,
        table: &str,
        filter: &EntityFilter,
    ) -> TableResult<Vec<SessionEntity>> {
        self.with_rows(table, |rows| {
            Ok(rows
                .values()
                .filter(|entity| filter.matches(entity))
                .cloned()
                .collect())
        })
    }
}
