use futures::future::BoxFuture;
use tracing::{debug, info};

use super::models::ConnectionConfig;
use crate::config::ToolServerConfig;
use crate::mcp::{McpError, ToolSession};

/// Opens a tool-server session for `conn`, runs `op` against it and tears the
/// session down afterwards.
///
/// The session is not reused: every logical operation gets its own server
/// process. If `op` panics the child is still killed when the session drops.
/// There is no cancellation; a server that hangs stalls the caller until the
/// per-request timeout fires.
pub async fn with_session<T, F>(
    server: &ToolServerConfig,
    conn: &ConnectionConfig,
    op: F,
) -> Result<T, McpError>
where
    F: for<'s> FnOnce(&'s mut ToolSession) -> BoxFuture<'s, T>,
{
    info!(
        "Opening tool session for {}@{}:{}/{}",
        conn.user, conn.host, conn.port, conn.database
    );
    let mut session = ToolSession::open(server, &conn.to_env()).await?;
    if let Some(info) = session.server_info() {
        debug!("Session established with {} {}", info.name, info.version);
    }

    let output = op(&mut session).await;

    session.shutdown().await;
    debug!("Tool session closed");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::fetch_schema;
    use crate::mcp::testing::ScriptToolServer;
    use futures::FutureExt;

    #[tokio::test]
    async fn spawn_failure_is_reported_without_running_the_operation() {
        let server = ToolServerConfig {
            command: "pg-nl-query-missing-tool-server".to_string(),
            args: vec![],
            working_dir: None,
            request_timeout_secs: 1,
            shutdown_grace_secs: 1,
        };
        let conn = ConnectionConfig::from_input("localhost", "5432", "postgres", "postgres", "").unwrap();

        let mut ran = false;
        let result = with_session(&server, &conn, |_session| {
            ran = true;
            async {}.boxed()
        })
        .await;

        assert!(matches!(result, Err(McpError::SpawnError(_))));
        assert!(!ran);
    }

    #[tokio::test]
    async fn operation_runs_and_the_server_is_gone_afterwards() {
        let server = ScriptToolServer::new();
        let conn = ConnectionConfig::from_input("localhost", "5432", "shop", "postgres", "secret").unwrap();

        let schema = with_session(&server.config(), &conn, |session| fetch_schema(session).boxed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["users", "orders"]);
        assert_eq!(server.starts(), 1);
        assert_eq!(server.exits(), 1);

        // A second operation gets a fresh process
        let tables = with_session(&server.config(), &conn, |session| {
            async move { fetch_schema(session).await.map(|s| s.tables.len()) }.boxed()
        })
        .await
        .unwrap();
        assert_eq!(tables.unwrap(), 2);
        assert_eq!(server.starts(), 2);
        assert_eq!(server.exits(), 2);
    }
}
