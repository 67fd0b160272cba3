use std::sync::Arc;

use anyhow::Result;

use crate::{
    config::AppConfig,
    services::{CoingeckoProvider, MarketGateway},
    state::AppState,
};

pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let provider = Arc::new(CoingeckoProvider::new(
        config.coingecko_api_base.clone(),
        config.markets_per_page,
    ));
    let gateway = Arc::new(MarketGateway::new(provider, config.price_cache_ttl));

    Ok(AppState {
        config: config.clone(),
        gateway,
    })
}
