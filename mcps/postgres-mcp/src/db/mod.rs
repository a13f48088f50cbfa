//! PostgreSQL access
//!
//! Everything above this module talks to the database through the
//! [`Database`] trait. [`PgDatabase`] is the pooled implementation.

pub mod catalog;
pub mod error;
pub mod query;
pub mod value;
pub mod wire;

pub use error::{DbError, DbResult};
pub use value::{Row, SqlValue};

use crate::config::DatabaseSettings;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// One column of a table, as reported by `information_schema.columns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Rows returned by a query, in result-set order
pub type QueryResult = Vec<Row>;

/// Schema lookups and read-only query execution
#[async_trait]
pub trait Database: Send + Sync {
    /// Names of the tables in the configured schema
    async fn list_tables(&self) -> DbResult<Vec<String>>;

    /// Columns of `table`; empty when the table does not exist
    async fn table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>>;

    /// Execute `sql` in a read-only transaction that is always rolled back
    async fn execute_read_only(&self, sql: &str) -> DbResult<QueryResult>;
}

/// Pool-backed [`Database`]
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    schema: String,
}

impl PgDatabase {
    /// Open the pool and verify the database is reachable
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(&settings.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self::from_pool(pool, settings.schema.clone()))
    }

    pub fn from_pool(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Close the pool, waiting for checked-out connections to come back
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn list_tables(&self) -> DbResult<Vec<String>> {
        catalog::list_tables(&self.pool, &self.schema).await
    }

    async fn table_schema(&self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        catalog::table_schema(&self.pool, &self.schema, table).await
    }

    async fn execute_read_only(&self, sql: &str) -> DbResult<QueryResult> {
        query::execute_read_only(&self.pool, sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_descriptor_field_order() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer"),
            ColumnDescriptor::new("name", "text"),
        ];
        let json = serde_json::to_string(&columns).unwrap();
        assert_eq!(
            json,
            r#"[{"column_name":"id","data_type":"integer"},{"column_name":"name","data_type":"text"}]"#
        );
    }

    #[tokio::test]
    async fn test_lazy_pool_keeps_schema() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let db = PgDatabase::from_pool(pool, "reporting");
        assert_eq!(db.schema(), "reporting");
        db.close().await;
        assert!(db.pool().is_closed());
    }
}
