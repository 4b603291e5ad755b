//! Rate limiting middleware using Governor.
//!
//! One keyed token bucket per client. Requests carrying a valid access token
//! are keyed by the token's user; everything else is keyed by the peer IP.

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};
use serde_json::json;

use escrow_types::EscrowRepository;

use super::auth::extract_token;
use super::handlers::AppState;
use crate::tokens::JwtManager;

/// Idle buckets are dropped after this many checks.
const RETAIN_EVERY: u64 = 1024;

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
    clock: DefaultClock,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows a burst of `requests`, refilled evenly over `period`.
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let replenish = period / burst.get();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
            clock: DefaultClock::default(),
        }
    }

    /// Takes one token for `key`. On refusal returns how long until the next one.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            self.evict_idle();
        }

        self.limiter
            .check_key(&key.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops buckets that have refilled completely.
    pub fn evict_idle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of buckets currently held.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

/// Bucket key: `user:<id>` for a verified token, `ip:<addr>` otherwise.
///
/// Unverified tokens never pick the bucket, so rotating junk tokens does
/// not earn fresh quota.
pub(crate) fn client_key(request: &Request<Body>, tokens: &JwtManager) -> String {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(claims) = extract_token(auth_header).and_then(|t| tokens.validate(t).ok()) {
        return format!("user:{}", claims.sub);
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}

/// Rate limiting middleware. `/health` is never limited.
pub async fn rate_limit_middleware<R: EscrowRepository>(
    State((limiter, state)): State<(Arc<RateLimiterState>, Arc<AppState<R>>)>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = client_key(&request, state.service.tokens());
    if let Err(wait) = limiter.check(&key) {
        let retry_after = wait.as_secs().max(1);
        tracing::warn!(key = %key, retry_after, "Rate limit exceeded");

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": 429,
                "retry_after_seconds": retry_after
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}
