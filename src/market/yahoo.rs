use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{MarketDataError, PriceBar, PriceHistory};
use crate::config::MarketConfig;

// Yahoo rejects requests without a browser-ish user agent
const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; pg-nl-query/", env!("CARGO_PKG_VERSION"), ")");

/// Daily price history from the Yahoo Finance chart API.
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
    range: String,
    interval: String,
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

/// Parses a chart API body. Bars without a close are dropped; an empty result is [`MarketDataError::NoData`].
pub fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory, MarketDataError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| MarketDataError::ResponseError(format!("unexpected chart payload: {}", e)))?;

    if let Some(err) = envelope.chart.error {
        return Err(MarketDataError::ResponseError(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(MarketDataError::NoData(symbol.to_string()));
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let offset = result.meta.gmtoffset;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i) else {
            continue;
        };
        let Some(when) = DateTime::from_timestamp(ts + offset, 0) else {
            continue;
        };
        bars.push(PriceBar {
            date: when.date_naive(),
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            volume: at(&quote.volume, i).unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(MarketDataError::NoData(symbol.to_string()));
    }

    Ok(PriceHistory {
        symbol: symbol.to_string(),
        long_name: result.meta.long_name.or(result.meta.short_name),
        currency: result.meta.currency,
        bars,
    })
}

impl YahooClient {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketDataError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            range: config.range.clone(),
            interval: config.interval.clone(),
        })
    }

    pub async fn fetch_history(&self, symbol: &str) -> Result<PriceHistory, MarketDataError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| MarketDataError::RequestError(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MarketDataError::RequestError("base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        info!("Fetching {} of {} bars for {}", self.range, self.interval, symbol);

        let response = self
            .client
            .get(url)
            .query(&[("range", self.range.as_str()), ("interval", self.interval.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("Market data request for {} failed: {}", symbol, e);
                MarketDataError::RequestError(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::ResponseError(e.to_string()))?;
        debug!("Chart response for {}: {} ({} bytes)", symbol, status, body.len());

        if !status.is_success() {
            // Error bodies usually still carry a chart.error object worth surfacing
            let detail = serde_json::from_str::<ChartEnvelope>(&body)
                .ok()
                .and_then(|e| e.chart.error)
                .map(|e| format!("{}: {}", e.code, e.description))
                .unwrap_or_else(|| format!("API responded with status code: {}", status));
            error!("Market data request for {} failed: {}", symbol, detail);
            return Err(MarketDataError::ResponseError(detail));
        }

        let history = parse_chart(symbol, &body)?;
        info!("Fetched {} bars for {}", history.bars.len(), symbol);
        Ok(history)
    }
}
