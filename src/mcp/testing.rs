//! Tool server stand-ins: an in-process one driven over an in-memory duplex
//! pipe, and a real child process backed by a shell script.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use uuid::Uuid;

use super::protocol::PROTOCOL_VERSION;
use super::{McpError, ToolSession};
use crate::config::ToolServerConfig;

type Handler = dyn Fn(&str, &Value) -> Result<Value, String> + Send + Sync;

pub struct FakeToolServer {
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<String>>>,
    chatter: bool,
}

impl FakeToolServer {
    /// `handler` receives the tool name and arguments; `Ok` becomes the JSON text
    /// payload, `Err` an `isError` result.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            log: Arc::new(Mutex::new(Vec::new())),
            chatter: false,
        }
    }

    /// Interleave a notification and a ping before every tool result.
    pub fn with_chatter(mut self) -> Self {
        self.chatter = true;
        self
    }

    /// Methods received so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub async fn connect(&self) -> Result<ToolSession, McpError> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve(
            server,
            Arc::clone(&self.handler),
            Arc::clone(&self.log),
            self.chatter,
        ));
        let (reader, writer) = tokio::io::split(client);
        ToolSession::connect(reader, writer, Duration::from_secs(5)).await
    }
}

async fn send(writer: &mut WriteHalf<DuplexStream>, message: Value) {
    let mut line = message.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();
}

async fn serve(
    stream: DuplexStream,
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<String>>>,
    chatter: bool,
) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let message: Value = serde_json::from_str(&line).unwrap();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            continue;
        };
        log.lock().unwrap().push(method.to_string());
        let Some(id) = message.get("id").cloned() else {
            continue;
        };

        let result = match method {
            "initialize" => json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "fake-postgres", "version": "0.0.1" }
            }),
            "tools/call" => {
                if chatter {
                    send(&mut writer, json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/message",
                        "params": { "level": "info", "data": "working" }
                    }))
                    .await;
                    send(&mut writer, json!({ "jsonrpc": "2.0", "id": "srv-ping", "method": "ping" })).await;
                    if let Ok(Some(reply)) = lines.next_line().await {
                        let reply: Value = serde_json::from_str(&reply).unwrap();
                        if reply["id"] == "srv-ping" && reply.get("result").is_some() {
                            log.lock().unwrap().push("ping-reply".to_string());
                        }
                    }
                }

                let name = message["params"]["name"].as_str().unwrap_or_default();
                let arguments = &message["params"]["arguments"];
                match handler(name, arguments) {
                    Ok(payload) => json!({
                        "content": [{ "type": "text", "text": payload.to_string() }]
                    }),
                    Err(text) => json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": true
                    }),
                }
            }
            other => {
                send(&mut writer, json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("Method not found: {}", other) }
                }))
                .await;
                continue;
            }
        };

        send(&mut writer, json!({ "jsonrpc": "2.0", "id": id, "result": result })).await;
    }
}

// Answers by request id; the JSON payloads are pre-escaped for the `text` field.
// POSTGRES_DB is echoed back as the server version so tests can see the env.
const TOOL_SERVER_SCRIPT: &str = r##"log="$1"
echo started >> "$log"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  if [ -z "$id" ]; then
    continue
  fi
  case "$line" in
    *'"method":"initialize"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"script-postgres","version":"'"$POSTGRES_DB"'"}}}'
      ;;
    *'"name":"get_schema"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"{\"tables\":[{\"table_name\":\"users\"},{\"table_name\":\"orders\"}]}"}]}}'
      ;;
    *'"name":"execute_query"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"{\"rowCount\":2,\"rows\":[{\"name\":\"ada\"},{\"name\":\"bob\"}],\"fields\":[{\"name\":\"name\"}]}"}]}}'
      ;;
    *)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"error":{"code":-32601,"message":"Method not found"}}'
      ;;
  esac
done
echo exited >> "$log"
"##;

/// A tool server run as a real child process (`sh` script). It knows
/// `get_schema` (tables `users`, `orders`) and `execute_query` (two rows), and
/// logs every start and orderly exit so tests can check process teardown.
pub struct ScriptToolServer {
    dir: PathBuf,
}

impl ScriptToolServer {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("pgnlq-tool-server-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("server.sh"), TOOL_SERVER_SCRIPT).unwrap();
        Self { dir }
    }

    pub fn config(&self) -> ToolServerConfig {
        ToolServerConfig {
            command: "sh".to_string(),
            args: vec![
                self.dir.join("server.sh").display().to_string(),
                self.dir.join("lifecycle.log").display().to_string(),
            ],
            working_dir: None,
            request_timeout_secs: 5,
            shutdown_grace_secs: 2,
        }
    }

    fn count(&self, event: &str) -> usize {
        std::fs::read_to_string(self.dir.join("lifecycle.log"))
            .unwrap_or_default()
            .lines()
            .filter(|l| *l == event)
            .count()
    }

    /// Processes spawned so far.
    pub fn starts(&self) -> usize {
        self.count("started")
    }

    /// Processes that saw stdin close and left their read loop.
    pub fn exits(&self) -> usize {
        self.count("exited")
    }
}

impl Drop for ScriptToolServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
