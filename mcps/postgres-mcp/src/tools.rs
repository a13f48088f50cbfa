//! The `query` and `list_tables` tools

use crate::db::Database;
use mcp_common::{invalid_params, json_success, tool_error, CallToolResult, McpError, Tool};
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

pub const QUERY_TOOL: &str = "query";
pub const LIST_TABLES_TOOL: &str = "list_tables";

/// Arguments of the `query` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// The SQL query to execute
    pub sql: String,
}

/// Tool definition advertised in `tools/list`
pub fn query_tool() -> Tool {
    let schema = schemars::schema_for!(QueryParams);
    let input_schema: JsonObject = schema.as_object().cloned().unwrap_or_default();
    Tool::new(QUERY_TOOL, "Run a read-only SQL query", Arc::new(input_schema))
}

/// `list_tables` takes no arguments
#[derive(Debug, JsonSchema)]
pub struct ListTablesParams {}

pub fn list_tables_tool() -> Tool {
    let schema = schemars::schema_for!(ListTablesParams);
    let input_schema: JsonObject = schema.as_object().cloned().unwrap_or_default();
    Tool::new(
        LIST_TABLES_TOOL,
        "List the tables in the configured schema",
        Arc::new(input_schema),
    )
}

/// Dispatch a tool call by name
///
/// Argument problems and database failures come back as tool errors so the
/// client can read them; only an unknown tool name is a protocol error.
pub async fn call_tool(
    db: &dyn Database,
    name: &str,
    arguments: Option<&JsonObject>,
) -> Result<CallToolResult, McpError> {
    match name {
        QUERY_TOOL => {}
        LIST_TABLES_TOOL => return list_tables(db).await,
        _ => return Err(invalid_params(format!("Unknown tool: {}", name))),
    }

    let Some(sql) = arguments
        .and_then(|args| args.get("sql"))
        .and_then(|sql| sql.as_str())
    else {
        return Ok(tool_error("SQL query is required"));
    };

    run_query(db, sql).await
}

/// Execute `sql` read-only and render the rows as pretty JSON
pub async fn run_query(db: &dyn Database, sql: &str) -> Result<CallToolResult, McpError> {
    match db.execute_read_only(sql).await {
        Ok(rows) => json_success(&rows),
        Err(e) => {
            tracing::debug!("Query failed: {}", e);
            Ok(tool_error(format!("Failed to execute query: {}", e)))
        }
    }
}

/// Current table names as pretty JSON
pub async fn list_tables(db: &dyn Database) -> Result<CallToolResult, McpError> {
    match db.list_tables().await {
        Ok(tables) => json_success(&tables),
        Err(e) => {
            tracing::debug!("Listing tables failed: {}", e);
            Ok(tool_error(format!("Failed to list tables: {}", e)))
        }
    }
}
