//! Rate limiting middleware using tower-governor
//!
//! Limits are tracked per peer IP, so the router must be served with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use axum::Router;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::RateLimitConfig;
use crate::error::AppError;

impl RateLimitConfig {
    /// Time for one request slot to replenish.
    pub fn replenish_interval_ms(&self) -> u64 {
        (60_000 / self.requests_per_minute.max(1)).max(1)
    }

    /// Requests allowed in a burst before limiting starts.
    pub fn burst_size(&self) -> u32 {
        u32::try_from(self.requests_per_minute.max(1)).unwrap_or(u32::MAX)
    }
}

/// Wrap `router` in a per-IP rate limiter. Exceeding the budget yields 429.
pub fn with_rate_limit(router: Router, config: &RateLimitConfig) -> Result<Router, AppError> {
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(config.replenish_interval_ms())
        .burst_size(config.burst_size())
        .finish()
        .ok_or_else(|| AppError::Internal("Invalid rate limit configuration".to_string()))?;

    Ok(router.layer(GovernorLayer {
        config: Arc::new(governor_conf),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
        routing::get,
    };
    use std::net::SocketAddr;
    use tower::ServiceExt;

    #[test]
    fn test_quota_from_requests_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.replenish_interval_ms(), 6_000);
        assert_eq!(config.burst_size(), 10);

        let fast = RateLimitConfig {
            requests_per_minute: 120_000,
        };
        assert_eq!(fast.replenish_interval_ms(), 1);
    }

    fn request_from(addr: SocketAddr) -> Request<Body> {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_burst_exceeded_returns_429() {
        let config = RateLimitConfig {
            requests_per_minute: 2,
        };
        let app = with_rate_limit(Router::new().route("/", get(|| async { "ok" })), &config).unwrap();

        let client: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let other: SocketAddr = "10.0.0.2:4000".parse().unwrap();

        for _ in 0..2 {
            let response = app.clone().oneshot(request_from(client)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request_from(client)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app.oneshot(request_from(other)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
