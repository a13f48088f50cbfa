//! Read-only statement execution

use super::error::{DbError, DbResult};
use super::value::decode_row;
use super::QueryResult;
use sqlx::PgPool;

/// Run `sql` inside a transaction that cannot write, then roll it back
///
/// The statement text is sent as-is through the extended query protocol, so
/// only a single statement is accepted. Mutations are refused by the engine
/// because the transaction is marked `READ ONLY` before the statement runs.
pub async fn execute_read_only(pool: &PgPool, sql: &str) -> DbResult<QueryResult> {
    let mut tx = pool.begin().await?;

    let outcome = run_in_transaction(&mut tx, sql).await;

    // Dropping `tx` would also roll back, but only lazily on the next checkout.
    let rollback = tx.rollback().await;

    match (outcome, rollback) {
        (Ok(rows), Ok(())) => Ok(rows),
        (Ok(_), Err(e)) => Err(DbError::from(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(rollback_err)) => {
            tracing::warn!("Rollback after failed query also failed: {}", rollback_err);
            Err(e)
        }
    }
}

async fn run_in_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    sql: &str,
) -> DbResult<QueryResult> {
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut **tx)
        .await?;

    tracing::debug!(sql, "Executing read-only query");

    let rows = sqlx::query(sql)
        .persistent(false)
        .fetch_all(&mut **tx)
        .await?;

    rows.iter()
        .map(|row| decode_row(row).map_err(DbError::from))
        .collect()
}
