use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG` (default `info`).
///
/// Set `PGNLQ_LOG_FORMAT=json` to emit one JSON object per event instead of
/// the human-readable format.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PGNLQ_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
