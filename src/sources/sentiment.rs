// =============================================================================
// Sentiment & cycle indices — Fear & Greed, CBBI
// =============================================================================
//
// Both indices are published on a 0–100 scale (CBBI as a 0–1 confidence) and
// pass through the engine unscaled.

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::errors::FetchError;
use crate::fetch::SignalSource;
use crate::types::{CBBI, FGI};

use super::{as_f64, send_json};

const FEAR_GREED_BASE_URL: &str = "https://api.alternative.me";
const CBBI_BASE_URL: &str = "https://colintalkscrypto.com";

// =============================================================================
// Fear & Greed
// =============================================================================

pub struct FearGreedSource {
    client: reqwest::Client,
    base_url: String,
}

impl FearGreedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, FEAR_GREED_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_index(&self) -> Result<f64, FetchError> {
        let url = format!("{}/fng/", self.base_url);
        let body = send_json(self.name(), self.client.get(&url).query(&[("limit", "1")])).await?;

        let value = body["data"]
            .get(0)
            .and_then(|entry| as_f64(&entry["value"]))
            .ok_or_else(|| FetchError::parse(self.name(), "missing data[0].value"))?;

        debug!(value, "fear & greed fetched");
        Ok(value)
    }
}

impl SignalSource for FearGreedSource {
    fn name(&self) -> &str {
        "alternative.me"
    }

    fn signal(&self) -> &str {
        FGI
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_index())
    }
}

// =============================================================================
// CBBI
// =============================================================================

pub struct CbbiSource {
    client: reqwest::Client,
    base_url: String,
}

impl CbbiSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, CBBI_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_confidence(&self) -> Result<f64, FetchError> {
        let url = format!("{}/cbbi/data/latest.json", self.base_url);
        let body = send_json(self.name(), self.client.get(&url)).await?;

        let confidence = latest_confidence(&body)
            .ok_or_else(|| FetchError::parse(self.name(), "no Confidence series"))?;

        let value = confidence * 100.0;
        debug!(value, "cbbi fetched");
        Ok(value)
    }
}

/// The `Confidence` series is an object keyed by unix timestamp; take the
/// newest point.
fn latest_confidence(body: &Value) -> Option<f64> {
    body["Confidence"]
        .as_object()?
        .iter()
        .filter_map(|(ts, v)| Some((ts.parse::<i64>().ok()?, as_f64(v)?)))
        .max_by_key(|(ts, _)| *ts)
        .map(|(_, v)| v)
}

impl SignalSource for CbbiSource {
    fn name(&self) -> &str {
        "cbbi"
    }

    fn signal(&self) -> &str {
        CBBI
    }

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>> {
        Box::pin(self.fetch_confidence())
    }
}
