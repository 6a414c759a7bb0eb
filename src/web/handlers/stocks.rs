use axum::{
    extract::{Query, State},
    response::Html,
};
use minijinja::context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::Flash;
use crate::market::{PriceBar, PriceHistory};
use crate::util::format::{currency_prefix, with_thousands};
use crate::web::chart::line_chart_svg;
use crate::web::state::AppState;
use crate::web::templates::render_template;

const RECENT_BARS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    pub ticker: Option<String>,
}

#[derive(Debug, Serialize)]
struct BarRow {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

#[derive(Debug, Serialize)]
struct StockView {
    title: String,
    latest_close: String,
    change: String,
    change_direction: &'static str,
    latest_open: String,
    latest_volume: String,
    chart: Option<String>,
    recent: Vec<BarRow>,
}

fn price_decimals(currency: Option<&str>) -> usize {
    match currency {
        Some("JPY") => 0,
        _ => 2,
    }
}

fn stock_view(history: &PriceHistory) -> Option<StockView> {
    let metrics = history.metrics()?;
    let prefix = currency_prefix(history.currency.as_deref());
    let decimals = price_decimals(history.currency.as_deref());
    let price = |v: f64| format!("{}{}", prefix, with_thousands(v, decimals));
    let bar_row = |bar: &PriceBar| BarRow {
        date: bar.date.to_string(),
        open: price(bar.open),
        high: price(bar.high),
        low: price(bar.low),
        close: price(bar.close),
        volume: with_thousands(bar.volume as f64, 0),
    };

    let (change, change_direction) = match metrics.change_pct {
        Some(pct) if pct > 0.0 => (format!("+{:.2}%", pct), "up"),
        Some(pct) if pct < 0.0 => (format!("{:.2}%", pct), "down"),
        Some(pct) => (format!("{:.2}%", pct), "flat"),
        None => ("n/a".to_string(), "flat"),
    };

    Some(StockView {
        title: format!("{} ({})", history.display_name(), history.symbol),
        latest_close: price(metrics.latest_close),
        change,
        change_direction,
        latest_open: price(metrics.latest_open),
        latest_volume: with_thousands(metrics.latest_volume as f64, 0),
        chart: line_chart_svg(&history.closes()),
        // Newest first in the table
        recent: history.tail(RECENT_BARS).iter().rev().map(bar_row).collect(),
    })
}

pub async fn stocks(State(state): State<Arc<AppState>>, Query(query): Query<StocksQuery>) -> Html<String> {
    let ticker = query
        .ticker
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| state.config.market.default_ticker.clone());

    let (flashes, view) = match state.market.fetch_history(&ticker).await {
        Ok(history) => match stock_view(&history) {
            Some(view) => (vec![], Some(view)),
            None => (vec![Flash::error(format!("No price data available for '{}'", ticker))], None),
        },
        Err(e) => {
            error!("Market data for {} unavailable: {}", ticker, e);
            (
                vec![
                    Flash::error(e.to_string()),
                    Flash::info("Check the ticker format, e.g. 7203.T for Tokyo listings."),
                ],
                None,
            )
        }
    };

    render_template(
        &state.template_env,
        "stocks.html",
        context! {
            version => env!("CARGO_PKG_VERSION"),
            ticker => &ticker,
            flashes => flashes,
            stock => view,
        },
    )
}
