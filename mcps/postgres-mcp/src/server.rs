//! PostgreSQL MCP Server implementation
//!
//! The server core is transport-agnostic: the `rmcp` handler below and the
//! HTTP JSON-RPC dispatcher both call the same inherent methods.

use crate::db::Database;
use crate::resources::ResourceRegistry;
use crate::tools::{self, list_tables_tool, query_tool};
use mcp_common::{CallToolResult, McpError};
use rmcp::{
    model::{
        CallToolRequestParam, Implementation, JsonObject, ListResourcesResult, ListToolsResult,
        PaginatedRequestParam, ReadResourceRequestParam, ReadResourceResult, Resource,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    RoleServer, ServerHandler,
};
use std::sync::Arc;

const INSTRUCTIONS: &str = "PostgreSQL MCP server. Each table is exposed as a resource \
    holding its column names and types as JSON. Use the query tool to run read-only SQL; \
    statements that modify data are rejected by the database. The list_tables tool \
    returns the current table names.";

/// PostgreSQL MCP Server
#[derive(Clone)]
pub struct PostgresMcpServer {
    db: Arc<dyn Database>,
    resources: Arc<ResourceRegistry>,
}

impl PostgresMcpServer {
    pub fn new(db: Arc<dyn Database>, resources: ResourceRegistry) -> Self {
        Self {
            db,
            resources: Arc::new(resources),
        }
    }

    /// Discover the database's tables and build a server over them
    pub async fn setup(db: Arc<dyn Database>, resource_base: &str) -> anyhow::Result<Self> {
        let resources = ResourceRegistry::discover(db.as_ref(), resource_base).await?;
        Ok(Self::new(db, resources))
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "postgres-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn tools(&self) -> Vec<Tool> {
        vec![query_tool(), list_tables_tool()]
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        tools::call_tool(self.db.as_ref(), name, arguments).await
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.resources.list()
    }

    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        self.resources.read(self.db.as_ref(), uri).await
    }
}

impl ServerHandler for PostgresMcpServer {
    fn get_info(&self) -> ServerInfo {
        self.info()
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments.as_ref()).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }
}
