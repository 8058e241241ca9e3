//! Rate limiting middleware for the REST API
//!
//! Token bucket per endpoint category:
//! - General API: api_rate_limit (default 100/s)
//! - Proximity search: search_rate_limit (default 20/s)
//! - Writes (bookings, jobs, chats, payments): write_rate_limit (default 10/s)

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit type for different endpoint categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitType {
    /// Reads, health, change feed
    General,
    /// Proximity search (fans out into multiple range scans)
    Search,
    /// Mutating endpoints
    Write,
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            capacity: rate_per_second,
            tokens: rate_per_second as f64,
            refill_rate: rate_per_second as f64,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume a token, returns true if allowed
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let refill_amount = elapsed.as_secs_f64() * self.refill_rate;

        self.tokens = (self.tokens + refill_amount).min(self.capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until a token will be available
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Duration::from_secs_f64(tokens_needed / self.refill_rate)
        }
    }
}

/// Shared rate limiter state
#[derive(Debug)]
pub struct RateLimiterState {
    limiters: Mutex<HashMap<RateLimitType, TokenBucket>>,
}

impl RateLimiterState {
    pub fn new(api_rate: u32, search_rate: u32, write_rate: u32) -> Self {
        let mut limiters = HashMap::new();
        limiters.insert(RateLimitType::General, TokenBucket::new(api_rate));
        limiters.insert(RateLimitType::Search, TokenBucket::new(search_rate));
        limiters.insert(RateLimitType::Write, TokenBucket::new(write_rate));

        Self {
            limiters: Mutex::new(limiters),
        }
    }

    pub fn try_acquire(&self, rate_type: RateLimitType) -> bool {
        let mut limiters = self.limiters.lock();
        match limiters.get_mut(&rate_type) {
            Some(limiter) => limiter.try_acquire(),
            None => true,
        }
    }

    pub fn time_until_available(&self, rate_type: RateLimitType) -> Duration {
        let limiters = self.limiters.lock();
        match limiters.get(&rate_type) {
            Some(limiter) => limiter.time_until_available(),
            None => Duration::ZERO,
        }
    }
}

/// Determine rate limit type based on request method and path
pub fn get_rate_limit_type(method: &str, path: &str) -> RateLimitType {
    if path.ends_with("/search") {
        return RateLimitType::Search;
    }
    if method == "POST" && !path.ends_with("/geocode") && !path.ends_with("/categorize") {
        return RateLimitType::Write;
    }
    RateLimitType::General
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let rate_type = get_rate_limit_type(&method, &path);

    if !state.try_acquire(rate_type) {
        let wait_time = state.time_until_available(rate_type);
        tracing::warn!(
            "Rate limit exceeded for {:?}, path: {}, retry after {:?}ms",
            rate_type,
            path,
            wait_time.as_millis()
        );
        return rate_limit_response(wait_time, &format!("{:?}", rate_type).to_lowercase());
    }

    next.run(request).await
}

/// Create a rate limit exceeded response
fn rate_limit_response(retry_after: Duration, limit_type: &str) -> Response {
    let retry_seconds = retry_after.as_secs_f64().ceil() as u64;

    let body = Json(json!({
        "status": "error",
        "error_type": "rate_limit_exceeded",
        "message": format!("Rate limit exceeded for {}. Please retry after {} seconds.", limit_type, retry_seconds),
        "retry_after_ms": retry_after.as_millis()
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();

    if let Ok(value) = retry_seconds.to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }
    if let Ok(value) = limit_type.parse() {
        response.headers_mut().insert("X-RateLimit-Type", value);
    }

    response
}
