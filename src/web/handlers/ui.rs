use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use futures::FutureExt;
use minijinja::context;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{finish_action, known_session, Flash};
use crate::db::models::{display_value, ColumnInfo};
use crate::db::schema::{describe_table, sample_data};
use crate::db::session::with_session;
use crate::mcp::McpError;
use crate::web::session::{SessionContext, HISTORY_WINDOW};
use crate::web::state::AppState;
use crate::web::templates::render_template;

const SAMPLE_QUESTIONS: [&str; 3] = [
    "Show all users",
    "How many orders were placed last month?",
    "Top 10 products by revenue",
];

/// Rows ready for an HTML table, cells already stringified.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn new(columns: Vec<String>, rows: &[Map<String, Value>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(display_value).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Columns taken from the first row, for payloads that carry no field list.
    pub fn from_rows(rows: &[Map<String, Value>]) -> Self {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self::new(columns, rows)
    }
}

/// What the query panel shows after generate or execute.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutcome {
    pub sql: Option<String>,
    pub row_count: Option<u64>,
    pub table: Option<TableView>,
}

pub fn render_index(
    state: &AppState,
    session: &SessionContext,
    flashes: &[Flash],
    question: &str,
    outcome: Option<&QueryOutcome>,
) -> Html<String> {
    let tables: Option<Vec<&str>> = session.schema.as_ref().map(|s| s.table_names().collect());

    render_template(
        &state.template_env,
        "index.html",
        context! {
            version => env!("CARGO_PKG_VERSION"),
            connection => &session.connection,
            tables => tables,
            flashes => flashes,
            question => question,
            outcome => outcome,
            history => session.history.recent(HISTORY_WINDOW),
            history_total => session.history.len(),
            llm_warning => state.llm.as_ref().err().map(|e| e.to_string()),
            sample_questions => SAMPLE_QUESTIONS,
        },
    )
}

pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Html<String> {
    match known_session(&state, &jar).await {
        Some(handle) => {
            let session = handle.lock().await;
            render_index(&state, &session, &[], "", None)
        }
        // Fresh form from the defaults; a session starts with the first action
        None => render_index(&state, &SessionContext::new(&state.config.database), &[], "", None),
    }
}

#[derive(Debug, Serialize)]
struct TableDetailView {
    columns: Vec<ColumnInfo>,
    sample: TableView,
}

pub async fn table_detail(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Html<String> {
    let handle = known_session(&state, &jar).await;

    let task = tokio::spawn(async move {
        let (flashes, detail) = match handle {
            Some(handle) => {
                let session = handle.lock_owned().await;
                load_table_detail(&state, &session, &name).await
            }
            None => load_table_detail(&state, &SessionContext::new(&state.config.database), &name).await,
        };
        render_template(
            &state.template_env,
            "table.html",
            context! {
                version => env!("CARGO_PKG_VERSION"),
                table => &name,
                flashes => flashes,
                detail => detail,
            },
        )
    });
    finish_action(task).await
}

async fn load_table_detail(
    state: &AppState,
    session: &SessionContext,
    name: &str,
) -> (Vec<Flash>, Option<TableDetailView>) {
    let known = session
        .schema
        .as_ref()
        .is_some_and(|schema| schema.contains_table(name));
    if !known {
        return (
            vec![Flash::warning(format!("Unknown table '{}'. Connect and pick a table from the list.", name))],
            None,
        );
    }

    info!("Loading detail for table {}", name);
    let table = name.to_string();
    let result = with_session(&state.config.tool_server, &session.connection, move |tool| {
        async move {
            let detail = describe_table(tool, &table).await?;
            let sample = sample_data(tool, &table).await?;
            Ok::<_, McpError>((detail, sample))
        }
        .boxed()
    })
    .await;

    match result {
        Ok(Ok((detail, sample))) => (
            vec![],
            Some(TableDetailView {
                columns: detail.columns,
                sample: TableView::from_rows(&sample.rows),
            }),
        ),
        Ok(Err(e)) => {
            error!("Failed to load table {}: {}", name, e);
            (vec![Flash::error(format!("Schema fetch error: {}", e))], None)
        }
        Err(e) => {
            error!("Failed to open tool session: {}", e);
            (vec![Flash::error(format!("Connection error: {}", e))], None)
        }
    }
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now() - state.startup_time;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime.num_seconds(),
        "sessions": state.sessions.len().await,
        "llm_available": state.llm.is_ok(),
    }))
}
