use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;

/// PostgreSQL connection parameters handed to the tool server.
#[derive(Clone, Serialize, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

// Hand-written so the password never reaches the logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

#[derive(Debug, PartialEq)]
pub enum ConnectionInputError {
    InvalidPort(String),
    MissingField(&'static str),
}

impl fmt::Display for ConnectionInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionInputError::InvalidPort(port) => {
                write!(f, "Port must be a number between 1 and 65535 (got '{}')", port)
            }
            ConnectionInputError::MissingField(field) => write!(f, "{} is required", field),
        }
    }
}

impl Error for ConnectionInputError {}

impl ConnectionConfig {
    /// Validates raw form input.
    pub fn from_input(
        host: &str,
        port: &str,
        database: &str,
        user: &str,
        password: &str,
    ) -> Result<Self, ConnectionInputError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConnectionInputError::MissingField("Host"));
        }
        let database = database.trim();
        if database.is_empty() {
            return Err(ConnectionInputError::MissingField("Database"));
        }
        let user = user.trim();
        if user.is_empty() {
            return Err(ConnectionInputError::MissingField("User"));
        }
        let port = match port.trim().parse::<u16>() {
            Ok(p) if p >= 1 => p,
            _ => return Err(ConnectionInputError::InvalidPort(port.to_string())),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Environment the tool server reads its connection settings from.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("POSTGRES_HOST", self.host.clone()),
            ("POSTGRES_PORT", self.port.to_string()),
            ("POSTGRES_DB", self.database.clone()),
            ("POSTGRES_USER", self.user.clone()),
            ("POSTGRES_PASSWORD", self.password.clone()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Table list returned by the `get_schema` tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaInfo {
    pub tables: Vec<TableInfo>,
}

impl SchemaInfo {
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.table_name.as_str())
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table_names().any(|t| t == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    #[serde(default)]
    pub character_maximum_length: Option<i64>,
    #[serde(default)]
    pub is_nullable: Option<String>,
    #[serde(default)]
    pub column_default: Option<String>,
}

/// Column listing for one table (`get_schema` with `table_name`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDetail {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

/// First rows of a table (`get_sample_data`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleData {
    pub table: String,
    #[serde(rename = "rowCount", default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FieldInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExecutePayload {
    #[serde(rename = "rowCount", default)]
    row_count: Option<u64>,
    #[serde(default)]
    rows: Vec<Map<String, Value>>,
    #[serde(default)]
    fields: Vec<FieldInfo>,
    #[serde(default)]
    error: Option<String>,
}

/// Outcome of one `execute_query` call.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows {
        row_count: u64,
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    },
    Error {
        error: String,
    },
}

impl QueryResult {
    /// Parses the tool's JSON text payload.
    pub fn from_payload(text: &str) -> Result<Self, serde_json::Error> {
        let payload: ExecutePayload = serde_json::from_str(text)?;
        if let Some(error) = payload.error {
            return Ok(QueryResult::Error { error });
        }

        let columns = if payload.fields.is_empty() {
            payload
                .rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            payload.fields.into_iter().map(|f| f.name).collect()
        };
        // rowCount is null for some statements; fall back to what came back
        let row_count = payload.row_count.unwrap_or(payload.rows.len() as u64);

        Ok(QueryResult::Rows {
            row_count,
            columns,
            rows: payload.rows,
        })
    }

    pub fn row_count(&self) -> Option<u64> {
        match self {
            QueryResult::Rows { row_count, .. } => Some(*row_count),
            QueryResult::Error { .. } => None,
        }
    }
}

/// Renders a JSON cell for an HTML table.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn connection_input_is_validated() {
        let ok = ConnectionConfig::from_input(" localhost ", "5432", "postgres", "postgres", "pw").unwrap();
        assert_eq!(ok.host, "localhost");
        assert_eq!(ok.port, 5432);

        assert_eq!(
            ConnectionConfig::from_input("localhost", "0", "postgres", "postgres", ""),
            Err(ConnectionInputError::InvalidPort("0".to_string()))
        );
        assert_eq!(
            ConnectionConfig::from_input("localhost", "70000", "postgres", "postgres", ""),
            Err(ConnectionInputError::InvalidPort("70000".to_string()))
        );
        assert_eq!(
            ConnectionConfig::from_input("", "5432", "postgres", "postgres", ""),
            Err(ConnectionInputError::MissingField("Host"))
        );
    }

    #[test]
    fn env_carries_every_setting_and_debug_hides_password() {
        let config = ConnectionConfig::from_input("db", "6543", "shop", "app", "s3cret").unwrap();
        let env = config.to_env();
        assert_eq!(
            env,
            vec![
                ("POSTGRES_HOST", "db".to_string()),
                ("POSTGRES_PORT", "6543".to_string()),
                ("POSTGRES_DB", "shop".to_string()),
                ("POSTGRES_USER", "app".to_string()),
                ("POSTGRES_PASSWORD", "s3cret".to_string()),
            ]
        );
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test]
    fn schema_keeps_extra_columns() {
        let schema: SchemaInfo = serde_json::from_value(json!({
            "tables": [
                { "table_name": "users", "table_type": "BASE TABLE" },
                { "table_name": "orders", "table_type": "BASE TABLE", "owner": "app" }
            ]
        }))
        .unwrap();
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["users", "orders"]);
        assert_eq!(schema.tables[1].extra.get("owner"), Some(&json!("app")));
        assert!(schema.contains_table("orders"));
        assert!(!schema.contains_table("order"));
    }

    #[test]
    fn payload_columns_follow_fields_then_row_order() {
        let with_fields = QueryResult::from_payload(
            r#"{"rowCount":1,"rows":[{"name":"ann","id":1}],"fields":[{"name":"id","dataTypeID":23},{"name":"name","dataTypeID":25}]}"#,
        )
        .unwrap();
        match with_fields {
            QueryResult::Rows { columns, row_count, .. } => {
                assert_eq!(columns, vec!["id", "name"]);
                assert_eq!(row_count, 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let without_fields = QueryResult::from_payload(r#"{"rowCount":null,"rows":[{"b":1,"a":2}]}"#).unwrap();
        match without_fields {
            QueryResult::Rows { columns, row_count, .. } => {
                assert_eq!(columns, vec!["b", "a"]);
                assert_eq!(row_count, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn payload_error_field_wins() {
        assert_eq!(
            QueryResult::from_payload(r#"{"error":"permission denied"}"#).unwrap(),
            QueryResult::Error { error: "permission denied".to_string() }
        );
    }

    #[test]
    fn cells_render_plainly() {
        assert_eq!(display_value(&json!(null)), "NULL");
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(3.5)), "3.5");
        assert_eq!(display_value(&json!({"k": [1]})), r#"{"k":[1]}"#);
    }
}
