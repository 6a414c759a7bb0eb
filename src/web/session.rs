use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseDefaults;
use crate::db::models::{ConnectionConfig, SchemaInfo};
use crate::util::format::preview;

pub const HISTORY_WINDOW: usize = 5;
pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryHistoryEntry {
    pub query: String,
    pub sql: String,
    pub result_count: u64,
}

/// What the history panel shows for one entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryItemView {
    /// 1-based position in the full history.
    pub number: usize,
    pub preview: String,
    pub query: String,
    pub sql: String,
    pub result_count: u64,
}

/// Append-only record of successful executions. Everything is kept; only
/// the display is windowed.
#[derive(Debug, Default)]
pub struct QueryHistory {
    entries: Vec<QueryHistoryEntry>,
}

impl QueryHistory {
    pub fn push(&mut self, entry: QueryHistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `window` entries, newest first.
    pub fn recent(&self, window: usize) -> Vec<HistoryItemView> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .take(window)
            .map(|(i, entry)| HistoryItemView {
                number: i + 1,
                preview: preview(&entry.query, PREVIEW_CHARS),
                query: entry.query.clone(),
                sql: entry.sql.clone(),
                result_count: entry.result_count,
            })
            .collect()
    }
}

/// Per-browser state: last connection form values, fetched schema and history.
#[derive(Debug)]
pub struct SessionContext {
    pub connection: ConnectionConfig,
    pub schema: Option<SchemaInfo>,
    pub history: QueryHistory,
}

impl SessionContext {
    pub fn new(defaults: &DatabaseDefaults) -> Self {
        Self {
            connection: ConnectionConfig {
                host: defaults.host.clone(),
                port: defaults.port,
                database: defaults.database.clone(),
                user: defaults.user.clone(),
                password: String::new(),
            },
            schema: None,
            history: QueryHistory::default(),
        }
    }
}

pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// All live sessions, keyed by the session cookie. Only form actions add
/// entries; page views without a known cookie render from the defaults.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    /// The session for `id`, if one was started.
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).map(Arc::clone)
    }

    /// Returns the session for `id`, creating one (with a fresh id) when it is unknown.
    pub async fn get_or_create(&self, id: Option<Uuid>, defaults: &DatabaseDefaults) -> (Uuid, SessionHandle) {
        if let Some(id) = id {
            if let Some(handle) = self.sessions.read().await.get(&id) {
                return (id, Arc::clone(handle));
            }
        }

        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(SessionContext::new(defaults)));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        debug!("Created session {}", id);
        (id, handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
