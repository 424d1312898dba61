// =============================================================================
// Binance — funding rate, open-interest momentum, spot price
// =============================================================================
//
// Funding rates are periodic payments between longs and shorts that anchor the
// perpetual price to spot.  Persistently positive funding means longs are
// paying to stay levered, which is what the structure pillar measures.
//
// Open interest is compared over a 30-day window of daily snapshots: a fast
// build-up of outstanding contracts means a more fragile market.
//
// The spot price is display context only and never enters the score.

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::errors::FetchError;
use crate::fetch::SignalSource;
use crate::types::{BTC_PRICE_USD, FUNDING_RATE_PCT, OI_MOM_PCT};

use super::{as_f64, pct_change, send_json};

const FAPI_BASE_URL: &str = "https://fapi.binance.com";
const SPOT_BASE_URL: &str = "https://api.binance.com";

/// Daily OI snapshots requested (30 intervals).
const OI_HISTORY_LIMIT: &str = "31";

// =============================================================================
// Funding rate
// =============================================================================

/// Latest funding rate for one perpetual, expressed in percent
/// (0.0001 raw → 0.01).
pub struct FundingRateSource {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl FundingRateSource {
    pub fn new(client: reqwest::Client, symbol: impl Into<String>) -> Self {
        Self::with_base_url(client, FAPI_BASE_URL, symbol)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            symbol: symbol.into(),
        }
    }

    async fn fetch_rate(&self) -> Result<f64, FetchError> {
        let url = format!("{}/fapi/v1/fundingRate", self.base_url);
        let req = self
            .client
            .get(&url)
            .query(&[("symbol", self.symbol.as_str()), ("limit", "1")]);
        let body = send_json(self.name(), req).await?;

        let rate = body
            .as_array()
            .and_then(|arr| arr.last())
            .and_then(|entry| as_f64(&entry["fundingRate"]))
            .ok_or_else(|| FetchError::parse(self.name(), "missing fundingRate"))?;
        let rate_pct = rate * 100.0;

        debug!(
            symbol = %self.symbol,
            rate_pct = format!("{:.4}", rate_pct),
            "funding rate fetched"
        );
        Ok(rate_pct)
    }
}

impl SignalSource for FundingRateSource {
    fn name(&self) -> &str {
        "binance-funding"
    }

    fn signal(&self) -> &str {
        FUNDING_RATE_PCT
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_rate())
    }
}

// =============================================================================
// Open interest
// =============================================================================

/// 30-day change in total open interest for one perpetual.
pub struct OpenInterestSource {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl OpenInterestSource {
    pub fn new(client: reqwest::Client, symbol: impl Into<String>) -> Self {
        Self::with_base_url(client, FAPI_BASE_URL, symbol)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            symbol: symbol.into(),
        }
    }

    async fn fetch_momentum(&self) -> Result<f64, FetchError> {
        let url = format!("{}/futures/data/openInterestHist", self.base_url);
        let req = self.client.get(&url).query(&[
            ("symbol", self.symbol.as_str()),
            ("period", "1d"),
            ("limit", OI_HISTORY_LIMIT),
        ]);
        let body = send_json(self.name(), req).await?;

        let history = oi_history(&body)
            .ok_or_else(|| FetchError::parse(self.name(), "expected an array"))?;
        let change = match (history.first(), history.last()) {
            (Some(first), Some(last)) if history.len() >= 2 => pct_change(*first, *last),
            _ => None,
        }
        .ok_or_else(|| FetchError::parse(self.name(), "insufficient OI history"))?;

        debug!(symbol = %self.symbol, points = history.len(), change, "open interest fetched");
        Ok(change)
    }
}

/// Oldest-first `sumOpenInterest` values.
fn oi_history(body: &Value) -> Option<Vec<f64>> {
    let mut points: Vec<(i64, f64)> = body
        .as_array()?
        .iter()
        .filter_map(|p| Some((p["timestamp"].as_i64()?, as_f64(&p["sumOpenInterest"])?)))
        .collect();
    points.sort_by_key(|(ts, _)| *ts);
    Some(points.into_iter().map(|(_, v)| v).collect())
}

impl SignalSource for OpenInterestSource {
    fn name(&self) -> &str {
        "binance-oi"
    }

    fn signal(&self) -> &str {
        OI_MOM_PCT
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_momentum())
    }
}

// =============================================================================
// Spot price
// =============================================================================

/// Last traded spot price for one symbol, in quote currency.
pub struct SpotPriceSource {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl SpotPriceSource {
    pub fn new(client: reqwest::Client, symbol: impl Into<String>) -> Self {
        Self::with_base_url(client, SPOT_BASE_URL, symbol)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            symbol: symbol.into(),
        }
    }

    async fn fetch_price(&self) -> Result<f64, FetchError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let req = self.client.get(&url).query(&[("symbol", self.symbol.as_str())]);
        let body = send_json(self.name(), req).await?;

        let price = as_f64(&body["price"])
            .filter(|p| *p > 0.0)
            .ok_or_else(|| FetchError::parse(self.name(), "missing or non-positive price"))?;

        debug!(symbol = %self.symbol, price, "spot price fetched");
        Ok(price)
    }
}

impl SignalSource for SpotPriceSource {
    fn name(&self) -> &str {
        "binance-spot"
    }

    fn signal(&self) -> &str {
        BTC_PRICE_USD
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_price())
    }
}
