// =============================================================================
// Macro & flow momentum — Yahoo charts, FRED series, DefiLlama stablecoins
// =============================================================================
//
// All three sources reduce a short history to a single percent change:
//
//   Yahoo       first → last daily close over the past month
//   FRED        previous → latest monthly observation
//   DefiLlama   total circulating USD, 30 days ago → today

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::errors::FetchError;
use crate::fetch::SignalSource;
use crate::types::STABLECOIN_MOM_PCT;

use super::{as_f64, pct_change, send_json};

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const FRED_BASE_URL: &str = "https://api.stlouisfed.org";
const LLAMA_BASE_URL: &str = "https://stablecoins.llama.fi";

/// Days between the two stablecoin supply points compared.
const STABLECOIN_LOOKBACK_DAYS: usize = 30;

// =============================================================================
// Yahoo Finance chart momentum
// =============================================================================

/// 1-month close-to-close change of a Yahoo-listed instrument.
pub struct YahooMomentumSource {
    client: reqwest::Client,
    base_url: String,
    ticker: String,
    signal: String,
}

impl YahooMomentumSource {
    pub fn new(client: reqwest::Client, ticker: impl Into<String>, signal: impl Into<String>) -> Self {
        Self::with_base_url(client, YAHOO_BASE_URL, ticker, signal)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        ticker: impl Into<String>,
        signal: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            ticker: ticker.into(),
            signal: signal.into(),
        }
    }

    async fn fetch_momentum(&self) -> Result<f64, FetchError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            self.ticker.replace('^', "%5E")
        );
        let req = self
            .client
            .get(&url)
            .query(&[("range", "1mo"), ("interval", "1d")]);
        let body = send_json(self.name(), req).await?;

        let closes: Vec<f64> = body["chart"]["result"][0]["indicators"]["quote"][0]["close"]
            .as_array()
            .ok_or_else(|| FetchError::parse(self.name(), "missing close series"))?
            .iter()
            .filter_map(as_f64)
            .collect();

        let (first, last) = match (closes.first(), closes.last()) {
            (Some(f), Some(l)) if closes.len() >= 2 => (*f, *l),
            _ => return Err(FetchError::parse(self.name(), "fewer than two closes")),
        };
        let change = pct_change(first, last)
            .ok_or_else(|| FetchError::parse(self.name(), "zero starting close"))?;

        debug!(ticker = %self.ticker, first, last, change, "yahoo momentum fetched");
        Ok(change)
    }
}

impl SignalSource for YahooMomentumSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn signal(&self) -> &str {
        &self.signal
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_momentum())
    }
}

// =============================================================================
// FRED month-over-month
// =============================================================================

/// Month-over-month change of a FRED series (M2SL for money supply).
pub struct FredMomentumSource {
    client: reqwest::Client,
    base_url: String,
    series_id: String,
    api_key: String,
    signal: String,
}

impl FredMomentumSource {
    pub fn new(
        client: reqwest::Client,
        series_id: impl Into<String>,
        api_key: impl Into<String>,
        signal: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: FRED_BASE_URL.to_string(),
            series_id: series_id.into(),
            api_key: api_key.into(),
            signal: signal.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_momentum(&self) -> Result<f64, FetchError> {
        let url = format!("{}/fred/series/observations", self.base_url);
        let req = self.client.get(&url).query(&[
            ("series_id", self.series_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", "2"),
        ]);
        let body = send_json(self.name(), req).await?;

        // Newest first; FRED marks missing observations with ".".
        let values: Vec<f64> = body["observations"]
            .as_array()
            .ok_or_else(|| FetchError::parse(self.name(), "missing observations"))?
            .iter()
            .filter_map(|o| as_f64(&o["value"]))
            .collect();

        let change = match values.as_slice() {
            [latest, previous, ..] => pct_change(*previous, *latest),
            _ => None,
        }
        .ok_or_else(|| FetchError::parse(self.name(), "need two observations"))?;

        debug!(series = %self.series_id, change, "fred momentum fetched");
        Ok(change)
    }
}

impl SignalSource for FredMomentumSource {
    fn name(&self) -> &str {
        "fred"
    }

    fn signal(&self) -> &str {
        &self.signal
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_momentum())
    }
}

// =============================================================================
// DefiLlama stablecoin supply
// =============================================================================

pub struct StablecoinSupplySource {
    client: reqwest::Client,
    base_url: String,
}

impl StablecoinSupplySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, LLAMA_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_growth(&self) -> Result<f64, FetchError> {
        let url = format!("{}/stablecoincharts/all", self.base_url);
        let body = send_json(self.name(), self.client.get(&url)).await?;

        let supply = circulating_series(&body)
            .ok_or_else(|| FetchError::parse(self.name(), "expected a daily array"))?;
        if supply.len() <= STABLECOIN_LOOKBACK_DAYS {
            return Err(FetchError::parse(self.name(), "history shorter than lookback"));
        }

        let last = supply[supply.len() - 1];
        let first = supply[supply.len() - 1 - STABLECOIN_LOOKBACK_DAYS];
        let change = pct_change(first, last)
            .ok_or_else(|| FetchError::parse(self.name(), "zero starting supply"))?;

        debug!(first, last, change, "stablecoin supply fetched");
        Ok(change)
    }
}

fn circulating_series(body: &Value) -> Option<Vec<f64>> {
    Some(
        body.as_array()?
            .iter()
            .filter_map(|day| as_f64(&day["totalCirculatingUSD"]["peggedUSD"]))
            .collect(),
    )
}

impl SignalSource for StablecoinSupplySource {
    fn name(&self) -> &str {
        "defillama"
    }

    fn signal(&self) -> &str {
        STABLECOIN_MOM_PCT
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_growth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DXY_MOM_PCT, M2_MOM_PCT};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn yahoo_skips_null_closes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/DX-Y.NYB"))
            .and(query_param("range", "1mo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": { "result": [{
                    "indicators": { "quote": [{ "close": [100.0, null, 99.0, 98.55, null] }] }
                }]}
            })))
            .mount(&server)
            .await;

        let src = YahooMomentumSource::with_base_url(
            reqwest::Client::new(),
            server.uri(),
            "DX-Y.NYB",
            DXY_MOM_PCT,
        );
        assert_eq!(src.signal(), DXY_MOM_PCT);
        let v = src.fetch().await.unwrap();
        assert!((v + 1.45).abs() < 1e-9, "got {v}");
    }

    #[tokio::test]
    async fn yahoo_single_close_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": { "result": [{ "indicators": { "quote": [{ "close": [101.0] }] } }] }
            })))
            .mount(&server)
            .await;

        let src = YahooMomentumSource::with_base_url(reqwest::Client::new(), server.uri(), "CL=F", "wti_mom_pct");
        assert!(matches!(src.fetch().await, Err(FetchError::Parse { .. })));
    }

    #[tokio::test]
    async fn fred_uses_latest_two_observations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .and(query_param("series_id", "M2SL"))
            .and(query_param("sort_order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "observations": [
                    { "date": "2025-09-01", "value": "22030.0" },
                    { "date": "2025-08-01", "value": "22000.0" }
                ]
            })))
            .mount(&server)
            .await;

        let src = FredMomentumSource::new(reqwest::Client::new(), "M2SL", "key", M2_MOM_PCT)
            .with_base_url(server.uri());
        let v = src.fetch().await.unwrap();
        assert!((v - (30.0 / 22000.0 * 100.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stablecoin_growth_over_lookback() {
        let days: Vec<Value> = (0..=STABLECOIN_LOOKBACK_DAYS)
            .map(|i| {
                json!({
                    "date": (1_700_000_000 + i * 86_400).to_string(),
                    "totalCirculatingUSD": { "peggedUSD": 100.0 + i as f64 * 0.1 }
                })
            })
            .collect();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stablecoincharts/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(days)))
            .mount(&server)
            .await;

        let src = StablecoinSupplySource::with_base_url(reqwest::Client::new(), server.uri());
        let v = src.fetch().await.unwrap();
        assert!((v - 3.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn circulating_series_rejects_non_array() {
        assert_eq!(circulating_series(&json!({ "error": "x" })), None);
    }
}
