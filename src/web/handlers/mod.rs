pub mod query;
pub mod stocks;
pub mod ui;

use axum::response::Html;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::error;
use uuid::Uuid;

use crate::web::session::SessionHandle;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "pgnlq_session";

/// A one-shot notice rendered at the top of a page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Flash {
    pub level: &'static str,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: "success", message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: "info", message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: "warning", message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: "error", message: message.into() }
    }
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// The caller's session if it already has one. Read-only pages use this so
/// that cookieless requests never allocate session state.
pub async fn known_session(state: &AppState, jar: &CookieJar) -> Option<SessionHandle> {
    state.sessions.get(session_id(jar)?).await
}

/// Looks up (or starts) the caller's session and makes sure the cookie points at it.
/// Only form actions call this.
pub async fn session_for(state: &AppState, jar: CookieJar) -> (CookieJar, SessionHandle) {
    let known = session_id(&jar);

    let (id, handle) = state
        .sessions
        .get_or_create(known, &state.config.database)
        .await;

    let jar = if known == Some(id) {
        jar
    } else {
        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        jar.add(cookie)
    };
    (jar, handle)
}

/// Waits for a spawned page action. The action runs to completion even if the
/// client goes away, so a half-applied session update is never left behind.
pub async fn finish_action(task: JoinHandle<Html<String>>) -> Html<String> {
    match task.await {
        Ok(page) => page,
        Err(e) => {
            error!("Page action failed: {}", e);
            Html("<h1>Internal Error</h1><p>The request could not be completed.</p>".to_string())
        }
    }
}
