//! In-memory [`Database`] for unit tests

use crate::db::{ColumnDescriptor, Database, DbError, DbResult, QueryResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
    catalog_error: Option<String>,
    responses: VecDeque<DbResult<QueryResult>>,
    executed: Vec<String>,
}

/// Tables and canned query responses held in memory
///
/// Queries pop responses in the order they were queued; with none queued a
/// query returns no rows.
#[derive(Default)]
pub struct FakeDatabase {
    state: Mutex<State>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(name.to_string(), columns);
        self
    }

    pub fn with_query_rows(self, rows: QueryResult) -> Self {
        self.state.lock().unwrap().responses.push_back(Ok(rows));
        self
    }

    pub fn with_query_error(self, err: DbError) -> Self {
        self.state.lock().unwrap().responses.push_back(Err(err));
        self
    }

    pub fn drop_table(&self, name: &str) {
        self.state.lock().unwrap().tables.remove(name);
    }

    /// Make every catalog lookup fail with a connectivity error
    pub fn fail_catalog(&self, message: &str) {
        self.state.lock().unwrap().catalog_error = Some(message.to_string());
    }

    /// SQL strings passed to `execute_read_only`, in call order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.catalog_error {
            return Err(DbError::Connectivity(message.clone()));
        }
        Ok(state.tables.keys().cloned().collect())
    }

    async fn table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.catalog_error {
            return Err(DbError::Connectivity(message.clone()));
        }
        Ok(state.tables.get(table).cloned().unwrap_or_default())
    }

    async fn execute_read_only(&self, sql: &str) -> DbResult<QueryResult> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        state.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
