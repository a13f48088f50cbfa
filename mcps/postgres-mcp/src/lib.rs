//! PostgreSQL MCP Library
//!
//! Publishes each table of a PostgreSQL schema as an MCP resource and offers
//! a `query` tool that runs SQL inside a read-only transaction, plus a
//! `list_tables` tool.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use postgres_mcp::{db::PgDatabase, PostgresMcpServer};
//!
//! let db = Arc::new(PgDatabase::connect(&settings.database).await?);
//! let server = PostgresMcpServer::setup(db, &settings.resource_base).await?;
//! ```

pub mod app;
pub mod config;
pub mod db;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main server type
pub use server::PostgresMcpServer;

pub use config::{Config, ConfigError, Overrides, Settings};
pub use db::{ColumnDescriptor, Database, DbError, PgDatabase, QueryResult, Row, SqlValue};
pub use tools::QueryParams;
