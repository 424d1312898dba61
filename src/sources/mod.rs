// =============================================================================
// Upstream Sources
// =============================================================================
//
// One `SignalSource` per raw signal.  Each source turns a single public HTTP
// endpoint into one scalar:
//
//   sentiment  Fear & Greed (alternative.me), CBBI confidence
//   markets    Yahoo 1-month momentum (DXY, 10Y, WTI), FRED M2 growth,
//              DefiLlama stablecoin supply growth
//   binance    perpetual funding rate, open-interest momentum
//
// Sources share one `reqwest::Client` built at startup.  They never retry and
// never fall back: that is the fetcher's job.

pub mod binance;
pub mod markets;
pub mod sentiment;

pub use binance::{FundingRateSource, OpenInterestSource, SpotPriceSource};
pub use markets::{FredMomentumSource, StablecoinSupplySource, YahooMomentumSource};
pub use sentiment::{CbbiSource, FearGreedSource};

use serde_json::Value;

use crate::errors::FetchError;

/// Send `req` and decode a JSON body, mapping every failure to `FetchError`.
pub(crate) async fn send_json(source: &str, req: reqwest::RequestBuilder) -> Result<Value, FetchError> {
    let resp = req.send().await.map_err(|error| FetchError::Http {
        source_name: source.to_string(),
        error,
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            source_name: source.to_string(),
            status: status.as_u16(),
        });
    }

    resp.json::<Value>()
        .await
        .map_err(|e| FetchError::parse(source, e.to_string()))
}

/// Read a number that upstream APIs variously encode as a JSON number or a
/// decimal string.
pub(crate) fn as_f64(v: &Value) -> Option<f64> {
    let parsed: Option<f64> = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

/// Percent change from `first` to `last`.
pub(crate) fn pct_change(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 || !first.is_finite() || !last.is_finite() {
        return None;
    }
    Some((last - first) / first * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn as_f64_accepts_numbers_and_strings() {
        assert_eq!(as_f64(&json!(44)), Some(44.0));
        assert_eq!(as_f64(&json!("0.00010000")), Some(0.0001));
        assert_eq!(as_f64(&json!(".")), None);
        assert_eq!(as_f64(&json!(null)), None);
    }

    #[test]
    fn pct_change_basic() {
        assert!((pct_change(100.0, 108.22).unwrap() - 8.22).abs() < 1e-9);
        assert!((pct_change(100.0, 98.55).unwrap() + 1.45).abs() < 1e-9);
        assert_eq!(pct_change(0.0, 5.0), None);
    }
}
