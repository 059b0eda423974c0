use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracker_core::{PriceSource, TrackerError};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const VS_CURRENCY: &str = "usd";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Simple-price client for a single CoinGecko asset quoted in USD.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    asset_id: String,
}

impl CoinGeckoClient {
    /// Build a client for `asset_id`. Fails if the HTTP client (with its request
    /// timeout) cannot be constructed.
    pub fn with_base_url(
        asset_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        Self::with_timeout(asset_id, base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    fn with_timeout(
        asset_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .inspect_err(|e| tracing::error!("Failed to build CoinGecko HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            asset_id: asset_id.into(),
        })
    }

    /// Get the current USD price of the configured asset
    pub async fn get_price(&self) -> Result<f64, TrackerError> {
        let url = format!("{}/simple/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("ids", self.asset_id.as_str()), ("vs_currencies", VS_CURRENCY)])
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Fetch(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(request_error)?;

        extract_price(&json, &self.asset_id)
    }
}

fn request_error(e: reqwest::Error) -> TrackerError {
    if e.is_timeout() {
        TrackerError::Fetch(format!("request timed out: {}", e))
    } else if e.is_decode() {
        TrackerError::Fetch(format!("invalid JSON: {}", e))
    } else {
        TrackerError::Fetch(e.to_string())
    }
}

/// Pull `json[asset_id]["usd"]` out of a simple-price payload.
fn extract_price(json: &Value, asset_id: &str) -> Result<f64, TrackerError> {
    let price = json
        .get(asset_id)
        .and_then(|asset| asset.get(VS_CURRENCY))
        .and_then(Value::as_f64)
        .ok_or_else(|| TrackerError::Fetch("Unexpected API response format".to_string()))?;

    if !price.is_finite() || price < 0.0 {
        return Err(TrackerError::Fetch(format!("Unexpected price value: {}", price)));
    }

    Ok(price)
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch(&self) -> Result<f64, TrackerError> {
        match self.get_price().await {
            Ok(price) => Ok(price),
            Err(e) => {
                tracing::error!("Price fetch error for {}: {}", self.asset_id, e);
                Err(e)
            }
        }
    }
}
