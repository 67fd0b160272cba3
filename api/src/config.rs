use std::{env, time::Duration};

use anyhow::{Context, Result};

#[derive(Clone)]
pub struct AppConfig {
    pub coingecko_api_base: String,
    pub frontend_origins: Vec<String>,
    pub price_cache_ttl: Duration,
    pub markets_per_page: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let price_cache_ttl = parse_duration_seconds("PRICE_CACHE_TTL_SECS", 60);
        let markets_per_page = parse_u32("MARKETS_PER_PAGE", 50);
        let frontend_origins = parse_origins();

        Ok(Self {
            coingecko_api_base: env::var("COINGECKO_API_BASE")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            frontend_origins,
            price_cache_ttl,
            markets_per_page,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("PORT must be a valid u16")?,
        })
    }
}

fn parse_origins() -> Vec<String> {
    if let Ok(list) = env::var("FRONTEND_ORIGINS") {
        split_origins(&list)
    } else if let Ok(origin) = env::var("FRONTEND_ORIGIN") {
        split_origins(&origin)
    } else {
        vec!["http://localhost:3000".to_string()]
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|item| {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_duration_seconds(key: &str, default: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
