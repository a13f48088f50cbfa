//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: [`init_tracing`] logs to stderr, text or JSON
//! - **Results**: [`json_success`] and [`tool_error`] for `CallToolResult`s
//! - **Errors**: constructors and conversion traits for `ErrorData`
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{json_success, tool_error};
//!
//! match run_query(sql).await {
//!     Ok(rows) => json_success(&rows),
//!     Err(e) => Ok(tool_error(format!("Failed to execute query: {}", e))),
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

pub use error::{
    internal_error, invalid_params, method_not_found, resource_not_found, IntoMcpError,
    McpResult, ResultExt,
};
pub use init::{init_tracing, level_for_verbosity, LogFormat};
pub use result::{json_success, tool_error};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};
