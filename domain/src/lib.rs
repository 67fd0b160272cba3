use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Quantity below which a holding is considered closed and dropped from the
/// wallet instead of lingering as a zero entry.
pub const DUST_THRESHOLD: f64 = 1e-6;

/// Cash the simulated wallet starts with, in USD.
pub const STARTING_CASH: f64 = 1000.0;

/// The simulated user account: cash balance plus per-asset holdings.
/// Persisted as a single whole-record JSON document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Wallet {
    pub cash: f64,
    pub holdings: HashMap<String, f64>,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            cash: STARTING_CASH,
            holdings: HashMap::new(),
        }
    }
}

impl Wallet {
    pub fn holding(&self, asset_id: &str) -> f64 {
        self.holdings.get(asset_id).copied().unwrap_or(0.0)
    }
}

/// One row of the normalized market snapshot. Optional upstream numerics
/// (e.g. 24h change on freshly listed assets) default to zero.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssetSummary {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub price_change_percentage_24h: f64,
    #[serde(default)]
    pub image: String,
}

/// Per-asset detail with the upstream's nested market data flattened out.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssetDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub price_change_percentage_24h: f64,
    #[serde(default)]
    pub price_change_24h: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub links: serde_json::Value,
}

/// Historical series for charting, each point a `(timestamp_ms, value)` pair.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PriceHistory {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

/// Success payload of a trade, carrying the post-trade wallet snapshot.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TradeReceipt {
    pub quantity: f64,
    pub message: String,
    pub wallet: Wallet,
}
