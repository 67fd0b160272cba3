use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use domain::{AssetDetail, AssetSummary, PriceHistory};
use metrics::counter;
use tracing::warn;

use crate::cache::{CacheLookup, TtlCache};
use crate::error::GatewayError;
use crate::services::coingecko::{MarketDataProvider, UpstreamError};

/// Shields the upstream price provider from excessive call volume: every
/// endpoint reads through a TTL cache, and a rate-limited upstream is answered
/// with the most recent cached value when one exists.
pub struct MarketGateway {
    provider: Arc<dyn MarketDataProvider>,
    markets: TtlCache<(), Vec<AssetSummary>>,
    assets: TtlCache<String, AssetDetail>,
    history: TtlCache<(String, u32), PriceHistory>,
}

impl MarketGateway {
    pub fn new(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            markets: TtlCache::new(ttl),
            assets: TtlCache::new(ttl),
            history: TtlCache::new(ttl),
        }
    }

    pub async fn market_snapshot(&self) -> Result<Vec<AssetSummary>, GatewayError> {
        let provider = self.provider.clone();
        read_through(
            &self.markets,
            (),
            "markets",
            "Failed to fetch cryptocurrency data",
            false,
            move || async move { provider.fetch_markets().await },
        )
        .await
    }

    pub async fn asset_detail(&self, asset_id: &str) -> Result<AssetDetail, GatewayError> {
        let provider = self.provider.clone();
        let id = asset_id.to_string();
        read_through(
            &self.assets,
            asset_id.to_string(),
            "asset_detail",
            "Failed to fetch cryptocurrency data",
            false,
            move || async move { provider.fetch_asset(&id).await },
        )
        .await
    }

    pub async fn price_history(
        &self,
        asset_id: &str,
        days: u32,
    ) -> Result<PriceHistory, GatewayError> {
        let provider = self.provider.clone();
        let id = asset_id.to_string();
        read_through(
            &self.history,
            (asset_id.to_string(), days),
            "price_history",
            "Failed to fetch price history",
            true,
            move || async move { provider.fetch_market_chart(&id, days).await },
        )
        .await
    }
}

/// Shared fresh/stale policy: a fresh hit short-circuits, a miss or stale
/// entry triggers an upstream fetch, and a rate-limited fetch falls back to
/// whatever cached value is still around. Error responses are never cached.
async fn read_through<K, V, F, Fut>(
    cache: &TtlCache<K, V>,
    key: K,
    endpoint: &'static str,
    failure_summary: &'static str,
    failure_details: bool,
    fetch: F,
) -> Result<V, GatewayError>
where
    K: Clone + Eq + Hash,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, UpstreamError>>,
{
    let stale = match cache.lookup(&key).await {
        CacheLookup::Fresh(value) => {
            counter!("gateway_cache_hits_total", "endpoint" => endpoint).increment(1);
            return Ok(value);
        }
        CacheLookup::Stale(value) => Some(value),
        CacheLookup::Miss => None,
    };
    counter!("gateway_cache_misses_total", "endpoint" => endpoint).increment(1);
    counter!("gateway_upstream_fetches_total", "endpoint" => endpoint).increment(1);

    match fetch().await {
        Ok(value) => {
            cache.insert(key, value.clone()).await;
            Ok(value)
        }
        Err(UpstreamError::RateLimited) => match stale {
            Some(value) => {
                warn!(endpoint, "upstream rate limited, serving stale cache entry");
                counter!("gateway_stale_fallbacks_total", "endpoint" => endpoint).increment(1);
                Ok(value)
            }
            None => Err(GatewayError::RateLimited),
        },
        Err(UpstreamError::InvalidData(reason)) => Err(GatewayError::InvalidUpstreamData(reason)),
        Err(UpstreamError::Failed(err)) => {
            warn!(endpoint, error = %err, "upstream fetch failed");
            Err(GatewayError::Upstream {
                summary: failure_summary,
                details: failure_details.then(|| err.to_string()),
            })
        }
    }
}
