use axum::{extract::State, response::Html, Form};
use axum_extra::extract::cookie::CookieJar;
use futures::FutureExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ui::{render_index, QueryOutcome, TableView};
use super::{finish_action, session_for, Flash};
use crate::db::executor::execute_query;
use crate::db::models::{ConnectionConfig, ConnectionInputError, QueryResult};
use crate::db::schema::fetch_schema;
use crate::db::session::with_session;
use crate::web::session::{QueryHistoryEntry, SessionContext};
use crate::web::state::AppState;

/// The main page form. Connection fields travel with every action so the
/// page keeps what the user typed.
#[derive(Debug, Default, Deserialize)]
pub struct ActionForm {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub action: String,
}

impl ActionForm {
    fn connection(&self) -> Result<ConnectionConfig, ConnectionInputError> {
        ConnectionConfig::from_input(&self.host, &self.port, &self.database, &self.user, &self.password)
    }
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ActionForm>,
) -> (CookieJar, Html<String>) {
    let (jar, session) = session_for(&state, jar).await;

    let task = tokio::spawn(async move {
        let mut session = session.lock_owned().await;
        let flashes = test_connection(&state, &mut session, &form).await;
        render_index(&state, &session, &flashes, &form.question, None)
    });
    (jar, finish_action(task).await)
}

/// Fetches the schema with the submitted settings. On failure the previous
/// schema stays in place.
async fn test_connection(state: &AppState, session: &mut SessionContext, form: &ActionForm) -> Vec<Flash> {
    let conn = match form.connection() {
        Ok(conn) => conn,
        Err(e) => return vec![Flash::warning(e.to_string())],
    };
    session.connection = conn.clone();

    let result = with_session(&state.config.tool_server, &conn, |tool| fetch_schema(tool).boxed()).await;
    match result {
        Ok(Ok(schema)) => {
            info!("Connected to {}@{}, {} tables", conn.database, conn.host, schema.tables.len());
            let message = format!("Connected. Tables: {}", schema.tables.len());
            session.schema = Some(schema);
            vec![Flash::success(message)]
        }
        Ok(Err(e)) => {
            error!("Schema fetch failed: {}", e);
            vec![
                Flash::error(format!("Schema fetch error: {}", e)),
                Flash::error("Connection failed"),
            ]
        }
        Err(e) => {
            error!("Connection test failed: {}", e);
            vec![Flash::error(format!("Connection error: {}", e))]
        }
    }
}

pub async fn run_query(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ActionForm>,
) -> (CookieJar, Html<String>) {
    let (jar, session) = session_for(&state, jar).await;

    let task = tokio::spawn(async move {
        let mut session = session.lock_owned().await;
        let (flashes, outcome) = answer_question(&state, &mut session, &form).await;
        render_index(&state, &session, &flashes, &form.question, outcome.as_ref())
    });
    (jar, finish_action(task).await)
}

async fn answer_question(
    state: &AppState,
    session: &mut SessionContext,
    form: &ActionForm,
) -> (Vec<Flash>, Option<QueryOutcome>) {
    // Only blank-checked; the prompt and the history get the text as typed
    let question = form.question.as_str();
    if question.trim().is_empty() {
        return (vec![Flash::info("Enter a question first.")], None);
    }
    let execute = match form.action.as_str() {
        "execute" => true,
        "generate" | "" => false,
        other => return (vec![Flash::warning(format!("Unknown action '{}'", other))], None),
    };

    let conn = match form.connection() {
        Ok(conn) => conn,
        Err(e) => return (vec![Flash::warning(e.to_string())], None),
    };
    session.connection = conn.clone();

    let llm = match &state.llm {
        Ok(llm) => llm,
        Err(e) => {
            return (
                vec![Flash::warning(format!("Set GROQ_API_KEY (or configure an LLM backend) first. {}", e))],
                None,
            );
        }
    };
    let Some(schema) = session.schema.as_ref() else {
        return (vec![Flash::warning("Connect to the database first to load its schema.")], None);
    };

    let sql = match llm.generate_sql(question, schema).await {
        Ok(sql) => sql,
        Err(e) => {
            error!("SQL generation failed: {}", e);
            return (vec![Flash::error(format!("SQL generation error: {}", e))], None);
        }
    };
    info!("Generated SQL for question ({} chars)", question.len());

    let mut outcome = QueryOutcome {
        sql: Some(sql.clone()),
        ..QueryOutcome::default()
    };
    if !execute {
        return (vec![], Some(outcome));
    }

    let statement = sql.clone();
    let result = with_session(&state.config.tool_server, &conn, move |tool| {
        async move { execute_query(tool, &statement).await }.boxed()
    })
    .await;

    match result {
        Ok(QueryResult::Rows { row_count, columns, rows }) => {
            session.history.push(QueryHistoryEntry {
                query: question.to_string(),
                sql,
                result_count: row_count,
            });
            outcome.row_count = Some(row_count);
            if !rows.is_empty() {
                outcome.table = Some(TableView::new(columns, &rows));
            }
            (vec![], Some(outcome))
        }
        Ok(QueryResult::Error { error }) => {
            warn!("Query failed: {}", error);
            (vec![Flash::error(format!("Error: {}", error))], Some(outcome))
        }
        Err(e) => {
            error!("Failed to open tool session: {}", e);
            (vec![Flash::error(format!("Connection error: {}", e))], Some(outcome))
        }
    }
}
