use std::sync::Arc;

use crate::{config::AppConfig, services::MarketGateway};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<MarketGateway>,
}

#[allow(dead_code)]
fn _assert_state_bounds() {
    fn assert_bounds<T: Clone + Send + Sync + 'static>() {}
    assert_bounds::<AppState>();
}
