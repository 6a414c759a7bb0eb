use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - server-rendered pages
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index))
        .route("/connect", post(handlers::query::connect))
        .route("/query", post(handlers::query::run_query))
        .route("/tables/{name}", get(handlers::ui::table_detail))
        .route("/stocks", get(handlers::stocks::stocks))
        .route("/static/{*path}", get(static_handler))
}

// Liveness for process supervisors
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(handlers::ui::healthz))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(ui_routes())
        .merge(api_routes())
        // Pages echo the connection form, password included
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
