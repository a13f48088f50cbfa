//! Table and column lookups against `information_schema`
//!
//! Names are cast to `text` so the rows decode as plain strings rather than
//! the catalog's `sql_identifier` domain.

use super::error::DbResult;
use super::ColumnDescriptor;
use sqlx::PgPool;

const LIST_TABLES: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema = $1 \
     ORDER BY table_name";

const TABLE_COLUMNS: &str = "SELECT column_name::text AS column_name, data_type::text AS data_type \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

/// Names of every table in `schema`, sorted
pub async fn list_tables(pool: &PgPool, schema: &str) -> DbResult<Vec<String>> {
    let tables = sqlx::query_scalar::<_, String>(LIST_TABLES)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    Ok(tables)
}

/// Columns of `schema.table` in ordinal order
///
/// A table that does not exist yields an empty list.
pub async fn table_schema(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> DbResult<Vec<ColumnDescriptor>> {
    let columns = sqlx::query_as::<_, ColumnDescriptor>(TABLE_COLUMNS)
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await?;
    Ok(columns)
}
