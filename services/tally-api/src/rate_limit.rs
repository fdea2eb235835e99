//! Request rate limiting middleware

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tally_core::{rate_key, RateLimiter};

use crate::error::{ApiError, RATE_LIMIT_REMAINING_HEADER};
use crate::extractors::ACCOUNT_ID_HEADER;

/// Limiter handle plus the policy applied by the middleware
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub scope: &'static str,
    pub limit: u32,
    pub window: Duration,
}

/// Client address: first `X-Forwarded-For` entry, then the peer address
pub fn client_addr(request: &Request) -> String {
    if let Some(first) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Admit or reject a request against the sliding window for its key
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let account = request
        .headers()
        .get(ACCOUNT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    let key = rate_key(state.scope, account.as_deref(), &client_addr(&request));

    let decision = state.limiter.allow(&key, state.limit, state.window).await;
    if !decision.allowed {
        tracing::warn!(key = %key, "Rate limit exceeded");
        metrics::counter!("tally_rate_limited_total", "scope" => state.scope).increment(1);
        return ApiError::RateLimited.into_response();
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
    response
}

/// Periodically drop keys whose windows have fully expired
pub async fn purge_loop(limiter: RateLimiter, window: Duration) {
    let mut interval = tokio::time::interval(window);
    loop {
        interval.tick().await;
        let removed = limiter.purge_expired(window).await;
        if removed > 0 {
            tracing::debug!(removed, "Purged idle rate-limit keys");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(limit: u32) -> Router {
        let state = RateLimitState {
            limiter: RateLimiter::new(),
            scope: "test",
            limit,
            window: Duration::from_secs(60),
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, rate_limit))
    }

    fn request(account: &str, ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header(ACCOUNT_ID_HEADER, account)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_after_limit() {
        let app = app(2);

        let first = app.clone().oneshot(request("acct_1", "10.0.0.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[RATE_LIMIT_REMAINING_HEADER], "1");

        let second = app.clone().oneshot(request("acct_1", "10.0.0.1")).await.unwrap();
        assert_eq!(second.headers()[RATE_LIMIT_REMAINING_HEADER], "0");

        let third = app.clone().oneshot(request("acct_1", "10.0.0.1")).await.unwrap();
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);

        // Different account from the same address has its own window
        let other = app.oneshot(request("acct_2", "10.0.0.1")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[test]
    fn test_client_addr_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_addr(&req), "203.0.113.7");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_addr(&req), "unknown");
    }
}
