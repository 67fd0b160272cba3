use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Seconds a rate-limited caller is told to wait before retrying.
pub const RETRY_AFTER_SECS: u64 = 60;

/// Failures surfaced by the gateway endpoints. Every variant renders as a
/// JSON body; no upstream failure terminates a request handler abnormally.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,
    #[error("{summary}")]
    Upstream {
        summary: &'static str,
        details: Option<String>,
    },
    #[error("Invalid data from CoinGecko API")]
    InvalidUpstreamData(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "API rate limit exceeded. Please wait a moment and try again.",
                    "retryAfter": RETRY_AFTER_SECS,
                })),
            )
                .into_response(),
            GatewayError::Upstream { summary, details } => {
                let body = match details {
                    Some(details) => json!({ "error": summary, "details": details }),
                    None => json!({ "error": summary }),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            GatewayError::InvalidUpstreamData(reason) => {
                tracing::error!(%reason, "invalid upstream payload");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Invalid data from CoinGecko API" })),
                )
                    .into_response()
            }
        }
    }
}
