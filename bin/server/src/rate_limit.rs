//! Per-IP rate limiting for the RPC endpoint.
//!
//! Each client IP gets two token buckets: one for read methods and a
//! smaller one for writes. The middleware buffers the request body to read
//! the JSON-RPC method name, charges the matching bucket, and answers
//! `429 Too Many Requests` when it is empty.

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    response::IntoResponse,
};
use loophub::api::methods;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Largest request body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Rate limit configuration.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub requests_per_window: u32,
    /// Time window duration.
    pub window_duration: Duration,
    /// Cleanup interval for stale entries.
    pub cleanup_interval: Duration,
}

/// Which budget a request draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Budget {
    Read,
    Write,
}

/// Token bucket state for a single IP and budget.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_replenish: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_replenish: Instant::now(),
        }
    }

    /// Replenishes for the elapsed time, then takes one token if available.
    fn try_consume(&mut self, config: &RateLimitConfig) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_replenish);

        let replenish_rate =
            config.requests_per_window as f64 / config.window_duration.as_secs_f64();
        self.tokens = (self.tokens + elapsed.as_secs_f64() * replenish_rate)
            .min(config.requests_per_window as f64);
        self.last_replenish = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_stale(&self, cleanup_interval: Duration) -> bool {
        self.last_replenish.elapsed() > cleanup_interval
    }
}

#[derive(Debug)]
struct RateLimitState {
    buckets: HashMap<(IpAddr, Budget), TokenBucket>,
    read: RateLimitConfig,
    write: RateLimitConfig,
    last_cleanup: Instant,
}

impl RateLimitState {
    fn new(read: RateLimitConfig, write: RateLimitConfig) -> Self {
        Self {
            buckets: HashMap::new(),
            read,
            write,
            last_cleanup: Instant::now(),
        }
    }

    fn config(&self, budget: Budget) -> RateLimitConfig {
        match budget {
            Budget::Read => self.read,
            Budget::Write => self.write,
        }
    }

    fn check_rate_limit(&mut self, ip: IpAddr, budget: Budget) -> bool {
        let cleanup_interval = self.read.cleanup_interval.max(self.write.cleanup_interval);
        if self.last_cleanup.elapsed() > cleanup_interval {
            self.cleanup_stale_buckets(cleanup_interval);
        }

        let config = self.config(budget);
        self.buckets
            .entry((ip, budget))
            .or_insert_with(|| TokenBucket::new(config.requests_per_window))
            .try_consume(&config)
    }

    fn cleanup_stale_buckets(&mut self, cleanup_interval: Duration) {
        let before_count = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_stale(cleanup_interval));
        let removed = before_count - self.buckets.len();
        if removed > 0 {
            debug!("Cleaned up {} stale rate limit buckets", removed);
        }
        self.last_cleanup = Instant::now();
    }
}

/// Rate limiting layer that wraps services.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RwLock<RateLimitState>>,
    trust_proxy_headers: bool,
}

impl RateLimitLayer {
    pub fn new(read: RateLimitConfig, write: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(RateLimitState::new(read, write))),
            trust_proxy_headers: false,
        }
    }

    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: self.state.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RwLock<RateLimitState>>,
    trust_proxy_headers: bool,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client_ip = extract_client_ip(&req, self.trust_proxy_headers);
        let state = self.state.clone();
        // The clone that was polled ready is the one that handles the request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    return Ok((StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                        .into_response())
                }
            };
            let budget = classify(&bytes);

            // Deny when the IP cannot be determined so spoofed or missing
            // headers cannot bypass the limit.
            let allowed = match client_ip {
                Some(ip) => {
                    let mut state = state.write().unwrap_or_else(|poisoned| {
                        warn!("Rate limit state was poisoned, recovering");
                        poisoned.into_inner()
                    });
                    state.check_rate_limit(ip, budget)
                }
                None => {
                    warn!("Could not determine client IP for rate limiting, denying request");
                    false
                }
            };

            if !allowed {
                if let Some(ip) = client_ip {
                    warn!(%ip, ?budget, "Rate limit exceeded");
                }
                return Ok((
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", "10")],
                    "Rate limit exceeded. Please slow down.",
                )
                    .into_response());
            }

            inner
                .call(Request::from_parts(parts, Body::from(bytes)))
                .await
        })
    }
}

#[derive(Deserialize)]
struct MethodPeek {
    method: String,
}

/// Write methods draw from the write budget; everything else, including
/// bodies that are not JSON-RPC at all, counts as a read.
fn classify(body: &[u8]) -> Budget {
    match serde_json::from_slice::<MethodPeek>(body) {
        Ok(peek) if methods::is_write(&peek.method) => Budget::Write,
        _ => Budget::Read,
    }
}

/// Extracts the client IP address from the request.
///
/// X-Forwarded-For (first entry) and X-Real-IP are only consulted when
/// `trust_proxy_headers` is set; otherwise the connection address is used.
fn extract_client_ip<B>(req: &Request<B>, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_window: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_window,
            window_duration: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_token_bucket_basic() {
        let config = config(10);
        let mut bucket = TokenBucket::new(10);
        for _ in 0..10 {
            assert!(bucket.try_consume(&config));
        }
        assert!(!bucket.try_consume(&config));
    }

    #[test]
    fn test_separate_budgets() {
        let mut state = RateLimitState::new(config(5), config(2));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        assert!(state.check_rate_limit(ip, Budget::Write));
        assert!(state.check_rate_limit(ip, Budget::Write));
        assert!(!state.check_rate_limit(ip, Budget::Write));

        // Reads are unaffected by the exhausted write budget.
        for _ in 0..5 {
            assert!(state.check_rate_limit(ip, Budget::Read));
        }
        assert!(!state.check_rate_limit(ip, Budget::Read));

        let other: IpAddr = "192.168.1.2".parse().unwrap();
        assert!(state.check_rate_limit(other, Budget::Write));
    }

    #[test]
    fn test_classify() {
        let vote = br#"{"jsonrpc":"2.0","method":"vote.cast","params":{},"id":1}"#;
        let list = br#"{"jsonrpc":"2.0","method":"thread.list","params":{},"id":1}"#;
        assert_eq!(classify(vote), Budget::Write);
        assert_eq!(classify(list), Budget::Read);
        assert_eq!(classify(b"not json"), Budget::Read);
    }

    #[test]
    fn test_proxy_headers_only_when_trusted() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(extract_client_ip(&req, false), None);
        assert_eq!(
            extract_client_ip(&req, true),
            Some("203.0.113.7".parse().unwrap())
        );
    }
}
