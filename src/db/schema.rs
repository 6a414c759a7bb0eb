use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, info};

use super::models::{SampleData, SchemaInfo, TableDetail};
use crate::mcp::{McpError, ToolSession};

async fn call_and_parse<T: DeserializeOwned>(
    session: &mut ToolSession,
    tool: &str,
    arguments: Value,
) -> Result<T, McpError> {
    let text = session.call_tool_text(tool, arguments).await?;
    serde_json::from_str(&text).map_err(|e| {
        McpError::InvalidPayload(format!("could not parse '{}' response: {}", tool, e))
    })
}

/// Lists the tables available for prompt grounding.
pub async fn fetch_schema(session: &mut ToolSession) -> Result<SchemaInfo, McpError> {
    match call_and_parse::<SchemaInfo>(session, "get_schema", json!({})).await {
        Ok(schema) => {
            info!("Fetched schema with {} tables", schema.tables.len());
            Ok(schema)
        }
        Err(e) => {
            error!("Schema fetch failed: {}", e);
            Err(e)
        }
    }
}

/// Column details for a single table.
pub async fn describe_table(session: &mut ToolSession, table_name: &str) -> Result<TableDetail, McpError> {
    call_and_parse(session, "get_schema", json!({ "table_name": table_name }))
        .await
        .inspect_err(|e| error!("Describing table {} failed: {}", table_name, e))
}

/// The first few rows of a table, as chosen by the tool server.
pub async fn sample_data(session: &mut ToolSession, table_name: &str) -> Result<SampleData, McpError> {
    call_and_parse(session, "get_sample_data", json!({ "table_name": table_name }))
        .await
        .inspect_err(|e| error!("Sampling table {} failed: {}", table_name, e))
}
