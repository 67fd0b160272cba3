pub mod coingecko;
pub mod gateway;

pub use coingecko::{CoingeckoProvider, MarketDataProvider, UpstreamError};
pub use gateway::MarketGateway;
