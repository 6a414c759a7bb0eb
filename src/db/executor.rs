use serde_json::json;
use tracing::{error, info};

use super::models::QueryResult;
use crate::mcp::{McpError, ToolSession};

/// Runs `sql` through the tool server's `execute_query` tool.
///
/// Never fails: transport, tool and parse errors all come back as
/// [`QueryResult::Error`]. The statement is passed through as generated;
/// nothing here checks that it is read-only.
pub async fn execute_query(session: &mut ToolSession, sql: &str) -> QueryResult {
    info!("Executing SQL: {}", sql);

    let text = match session.call_tool_text("execute_query", json!({ "sql": sql })).await {
        Ok(text) => text,
        Err(McpError::ToolError(message)) => {
            error!("Query rejected by tool server: {}", message);
            return QueryResult::Error { error: message };
        }
        Err(e) => {
            error!("Query call failed: {}", e);
            return QueryResult::Error { error: e.to_string() };
        }
    };

    match QueryResult::from_payload(&text) {
        Ok(result) => {
            if let Some(count) = result.row_count() {
                info!("Query returned {} rows", count);
            }
            result
        }
        Err(e) => {
            error!("Could not parse query result: {}", e);
            QueryResult::Error {
                error: format!("Could not parse query result: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::testing::FakeToolServer;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn users_server() -> FakeToolServer {
        FakeToolServer::new(|_, args| {
            let sql = args["sql"].as_str().unwrap_or_default();
            if sql.contains("missing") {
                return Err("Database error: relation \"missing\" does not exist".to_string());
            }
            Ok(json!({
                "rowCount": 2,
                "rows": [{ "name": "ann" }, { "name": "bob" }],
                "fields": [{ "name": "name", "dataTypeID": 25 }]
            }))
        })
    }

    #[tokio::test]
    async fn rows_come_back_with_count_and_columns() {
        let server = users_server();
        let mut session = server.connect().await.unwrap();

        match execute_query(&mut session, "SELECT name FROM users").await {
            QueryResult::Rows { row_count, columns, rows } => {
                assert_eq!(row_count, 2);
                assert_eq!(columns, vec!["name"]);
                assert_eq!(rows[1].get("name"), Some(&Value::from("bob")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn repeated_execution_is_stable() {
        let server = users_server();
        let mut session = server.connect().await.unwrap();

        let first = execute_query(&mut session, "SELECT name FROM users").await;
        let second = execute_query(&mut session, "SELECT name FROM users").await;
        assert_eq!(first.row_count(), second.row_count());
    }

    #[tokio::test]
    async fn tool_errors_become_error_results() {
        let server = users_server();
        let mut session = server.connect().await.unwrap();

        assert_eq!(
            execute_query(&mut session, "SELECT * FROM missing").await,
            QueryResult::Error {
                error: "Database error: relation \"missing\" does not exist".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unparseable_payload_becomes_error_result() {
        let server = FakeToolServer::new(|_, _| Ok(json!("not an object")));
        let mut session = server.connect().await.unwrap();

        let result = execute_query(&mut session, "SELECT 1").await;
        assert!(matches!(result, QueryResult::Error { .. }));
    }
}
