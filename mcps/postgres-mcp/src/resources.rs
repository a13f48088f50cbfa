//! Per-table schema resources
//!
//! Every table found at startup is published as one resource whose URI is
//! the credential-free connection string followed by `/<table>/schema`.
//! Reading a resource fetches the column list fresh from the database.

use crate::config::ConfigError;
use crate::db::Database;
use mcp_common::{internal_error, resource_not_found, McpResult, ResultExt};
use rmcp::model::{AnnotateAble, RawResource, ReadResourceResult, Resource, ResourceContents};
use url::Url;

pub const SCHEMA_MIME_TYPE: &str = "application/json";

/// Derive the resource URI prefix from a connection string
///
/// The scheme becomes `postgres`, credentials and any query string or
/// fragment are removed, and a trailing `/` is trimmed.
pub fn resource_base_url(connection: &str) -> Result<String, ConfigError> {
    let mut url =
        Url::parse(connection).map_err(|e| ConfigError::InvalidDatabaseUrl(e.to_string()))?;

    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    url.set_scheme("postgres")
        .map_err(|_| ConfigError::InvalidDatabaseUrl("cannot rewrite scheme".to_string()))?;
    if !url.username().is_empty() {
        url.set_username("")
            .map_err(|_| ConfigError::InvalidDatabaseUrl("cannot strip username".to_string()))?;
    }
    if url.password().is_some() {
        url.set_password(None)
            .map_err(|_| ConfigError::InvalidDatabaseUrl("cannot strip password".to_string()))?;
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// One table's schema resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaResource {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub table: String,
}

impl SchemaResource {
    pub fn new(base: &str, table: &str) -> Self {
        Self {
            uri: format!("{}/{}/schema", base, table),
            name: format!("\"{}\" database schema", table),
            description: format!("Schema information for table {}", table),
            table: table.to_string(),
        }
    }

    /// Protocol view of this resource
    pub fn to_resource(&self) -> Resource {
        let mut raw = RawResource::new(self.uri.clone(), self.name.clone());
        raw.description = Some(self.description.clone());
        raw.mime_type = Some(SCHEMA_MIME_TYPE.to_string());
        raw.no_annotation()
    }
}

/// Resources discovered at startup, in table-name order
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: Vec<SchemaResource>,
}

impl ResourceRegistry {
    /// Register one resource per table name
    pub fn new(base: &str, tables: &[String]) -> Self {
        Self {
            resources: tables
                .iter()
                .map(|table| SchemaResource::new(base, table))
                .collect(),
        }
    }

    /// Enumerate the database's tables once and register them
    pub async fn discover(db: &dyn Database, base: &str) -> anyhow::Result<Self> {
        let tables = db.list_tables().await?;
        tracing::info!("Registered {} table schema resources", tables.len());
        Ok(Self::new(base, &tables))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, uri: &str) -> Option<&SchemaResource> {
        self.resources.iter().find(|r| r.uri == uri)
    }

    pub fn list(&self) -> Vec<Resource> {
        self.resources.iter().map(SchemaResource::to_resource).collect()
    }

    /// Read the current schema document for `uri`
    ///
    /// A table dropped since startup reads as an empty array.
    pub async fn read(&self, db: &dyn Database, uri: &str) -> McpResult<ReadResourceResult> {
        let resource = self.get(uri).ok_or_else(|| resource_not_found(uri))?;

        let columns = db
            .table_schema(&resource.table)
            .await
            .map_err(|e| internal_error(format!("Failed to read schema: {}", e)))?;

        let text = serde_json::to_string_pretty(&columns).to_mcp_err()?;

        let mut contents = ResourceContents::text(text, uri);
        if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
            *mime_type = Some(SCHEMA_MIME_TYPE.to_string());
        }

        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }
}
