use anyhow::Context;
use async_trait::async_trait;
use domain::{AssetDetail, AssetSummary, PriceHistory};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Upstream-facing failure taxonomy. Rate limiting is split out because the
/// gateway degrades differently for it (stale fallback instead of an error).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limited")]
    RateLimited,
    #[error("invalid upstream data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// The opaque price source behind the gateway. Implemented by the CoinGecko
/// client in production and by scripted stubs in tests.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<AssetSummary>, UpstreamError>;
    async fn fetch_asset(&self, asset_id: &str) -> Result<AssetDetail, UpstreamError>;
    async fn fetch_market_chart(
        &self,
        asset_id: &str,
        days: u32,
    ) -> Result<PriceHistory, UpstreamError>;
}

#[derive(Clone)]
pub struct CoingeckoProvider {
    client: Client,
    api_base: String,
    markets_per_page: u32,
}

impl CoingeckoProvider {
    pub fn new(api_base: String, markets_per_page: u32) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            markets_per_page,
        }
    }

    async fn get_json(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("coingecko request to {url} failed"))?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited);
        }
        if !status.is_success() {
            return Err(UpstreamError::Failed(anyhow::anyhow!(
                "coingecko returned status {status} for {url}"
            )));
        }
        let body = resp
            .json()
            .await
            .context("failed to decode coingecko response")?;
        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for CoingeckoProvider {
    async fn fetch_markets(&self) -> Result<Vec<AssetSummary>, UpstreamError> {
        let body = self
            .get_json(
                format!("{}/coins/markets", self.api_base),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", self.markets_per_page.to_string()),
                    ("page", "1".to_string()),
                    ("sparkline", "false".to_string()),
                ],
            )
            .await?;
        let rows = body.as_array().ok_or_else(|| {
            UpstreamError::InvalidData("markets response is not an array".to_string())
        })?;
        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn fetch_asset(&self, asset_id: &str) -> Result<AssetDetail, UpstreamError> {
        let body = self
            .get_json(
                format!("{}/coins/{asset_id}", self.api_base),
                &[
                    ("localization", "false".to_string()),
                    ("tickers", "false".to_string()),
                    ("market_data", "true".to_string()),
                    ("community_data", "false".to_string()),
                    ("developer_data", "false".to_string()),
                    ("sparkline", "false".to_string()),
                ],
            )
            .await?;
        Ok(detail_from_coin(&body))
    }

    async fn fetch_market_chart(
        &self,
        asset_id: &str,
        days: u32,
    ) -> Result<PriceHistory, UpstreamError> {
        let body = self
            .get_json(
                format!("{}/coins/{asset_id}/market_chart", self.api_base),
                &chart_params(days),
            )
            .await?;
        let history: PriceHistory = serde_json::from_value(body)
            .map_err(|err| UpstreamError::InvalidData(format!("malformed market chart: {err}")))?;
        if history.prices.is_empty() {
            return Err(UpstreamError::InvalidData(format!(
                "empty price series for {asset_id}"
            )));
        }
        Ok(history)
    }
}

// CoinGecko rejects the interval parameter below seven days; finer-grained
// responses are only valid without it.
fn chart_params(days: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("vs_currency", "usd".to_string()),
        ("days", days.to_string()),
    ];
    if days >= 7 {
        params.push(("interval", "daily".to_string()));
    }
    params
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// Upstream sends null for optional numerics on thin markets; those normalize
// to zero rather than propagating nulls to the client.
fn num(value: &Value, pointer: &str) -> f64 {
    value.pointer(pointer).and_then(Value::as_f64).unwrap_or(0.0)
}

fn summary_from_row(row: &Value) -> AssetSummary {
    AssetSummary {
        id: text(row, "id"),
        symbol: text(row, "symbol"),
        name: text(row, "name"),
        current_price: num(row, "/current_price"),
        market_cap: num(row, "/market_cap"),
        total_volume: num(row, "/total_volume"),
        price_change_percentage_24h: num(row, "/price_change_percentage_24h"),
        image: text(row, "image"),
    }
}

fn detail_from_coin(coin: &Value) -> AssetDetail {
    AssetDetail {
        id: text(coin, "id"),
        symbol: text(coin, "symbol"),
        name: text(coin, "name"),
        current_price: num(coin, "/market_data/current_price/usd"),
        market_cap: num(coin, "/market_data/market_cap/usd"),
        total_volume: num(coin, "/market_data/total_volume/usd"),
        price_change_percentage_24h: num(coin, "/market_data/price_change_percentage_24h"),
        price_change_24h: num(coin, "/market_data/price_change_24h"),
        image: coin
            .pointer("/image/small")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: coin
            .pointer("/description/en")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        links: coin.get("links").cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chart_params_add_daily_interval_only_from_seven_days() {
        let short = chart_params(1);
        assert!(!short.iter().any(|(key, _)| *key == "interval"));
        let week = chart_params(7);
        assert!(week.contains(&("interval", "daily".to_string())));
        let month = chart_params(30);
        assert!(month.contains(&("interval", "daily".to_string())));
    }

    #[test]
    fn summary_normalizes_null_numerics_to_zero() {
        let row = json!({
            "id": "newcoin",
            "symbol": "new",
            "name": "New Coin",
            "current_price": 1.25,
            "market_cap": null,
            "total_volume": null,
            "price_change_percentage_24h": null,
            "image": "https://img.example/new.png"
        });
        let summary = summary_from_row(&row);
        assert_eq!(summary.id, "newcoin");
        assert_eq!(summary.current_price, 1.25);
        assert_eq!(summary.market_cap, 0.0);
        assert_eq!(summary.price_change_percentage_24h, 0.0);
    }

    #[test]
    fn detail_flattens_nested_market_data() {
        let coin = json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "market_data": {
                "current_price": { "usd": 50000.0 },
                "market_cap": { "usd": 1.0e12 },
                "total_volume": { "usd": 3.0e10 },
                "price_change_percentage_24h": -1.5,
                "price_change_24h": -760.0
            },
            "image": { "small": "https://img.example/btc.png" },
            "description": { "en": "Digital gold." },
            "links": { "homepage": ["https://bitcoin.org"] }
        });
        let detail = detail_from_coin(&coin);
        assert_eq!(detail.current_price, 50000.0);
        assert_eq!(detail.market_cap, 1.0e12);
        assert_eq!(detail.price_change_24h, -760.0);
        assert_eq!(detail.image, "https://img.example/btc.png");
        assert_eq!(detail.description, "Digital gold.");
        assert!(detail.links.get("homepage").is_some());
    }

    #[test]
    fn detail_defaults_missing_optionals() {
        let coin = json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "market_data": { "current_price": { "usd": 50000.0 } }
        });
        let detail = detail_from_coin(&coin);
        assert_eq!(detail.description, "");
        assert_eq!(detail.market_cap, 0.0);
        assert!(detail.links.is_null());
    }
}
