pub mod yahoo;

use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum MarketDataError {
    RequestError(String),
    ResponseError(String),
    NoData(String),
}

impl fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketDataError::RequestError(msg) => write!(f, "Market data request failed: {}", msg),
            MarketDataError::ResponseError(msg) => write!(f, "Market data response error: {}", msg),
            MarketDataError::NoData(symbol) => {
                write!(f, "No price data available for '{}'", symbol)
            }
        }
    }
}

impl Error for MarketDataError {}

/// One daily bar.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub long_name: Option<String>,
    pub currency: Option<String>,
    /// Oldest first.
    pub bars: Vec<PriceBar>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceMetrics {
    pub latest_close: f64,
    /// Percent change against the previous close; `None` with a single bar or a zero previous close.
    pub change_pct: Option<f64>,
    pub latest_open: f64,
    pub latest_volume: u64,
}

impl PriceHistory {
    pub fn metrics(&self) -> Option<PriceMetrics> {
        let latest = self.bars.last()?;
        let change_pct = match self.bars.len() {
            0 | 1 => None,
            n => {
                let previous = self.bars[n - 2].close;
                if previous == 0.0 {
                    None
                } else {
                    Some((latest.close - previous) / previous * 100.0)
                }
            }
        };

        Some(PriceMetrics {
            latest_close: latest.close,
            change_pct,
            latest_open: latest.open,
            latest_volume: latest.volume,
        })
    }

    /// Most recent `n` bars, oldest first.
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn closes(&self) -> Vec<(NaiveDate, f64)> {
        self.bars.iter().map(|b| (b.date, b.close)).collect()
    }

    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or("N/A")
    }
}
