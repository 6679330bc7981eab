use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::response::IntoResponse;
use dashmap::DashMap;
use serde_json::json;
use tower::{Layer, Service};
use tracing::{debug, warn};

const LOG_INTERVAL: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Bucket count that forces a sweep before the interval elapses.
const SWEEP_THRESHOLD: usize = 10_000;

/// Per-client token bucket limiter.
///
/// Clients are identified by the last comma-separated value of a configurable
/// request header, i.e. the hop appended by the proxy in front of us, falling
/// back to the peer address when the connection carries `ConnectInfo`.
/// Requests with neither pass through untouched.
#[derive(Clone)]
pub struct RateLimiter<S> {
    inner: S,
    buckets: Arc<Buckets>,
}

struct Buckets {
    map: DashMap<String, Bucket>,
    rate_per_sec: f64,
    burst: f64,
    /// A bucket untouched this long has refilled completely.
    idle_ttl: Duration,
    client_header: HeaderName,
    dropped_since_log: AtomicU64,
    last_log: Mutex<Instant>,
    last_sweep: Mutex<Instant>,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Buckets live in the layer, so every route wrapped by one layer draws
/// from the same budget.
#[derive(Clone)]
pub struct RateLimiterLayer {
    buckets: Arc<Buckets>,
}

impl RateLimiterLayer {
    pub fn new(rate_per_sec: u32, burst: u32, client_header: HeaderName) -> Self {
        let rate_per_sec = f64::from(rate_per_sec.max(1));
        let burst = f64::from(burst.max(1));
        let now = Instant::now();
        Self {
            buckets: Arc::new(Buckets {
                map: DashMap::new(),
                rate_per_sec,
                burst,
                idle_ttl: Duration::from_secs_f64(burst / rate_per_sec),
                client_header,
                dropped_since_log: AtomicU64::new(0),
                last_log: Mutex::new(now),
                last_sweep: Mutex::new(now),
            }),
        }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter {
            inner,
            buckets: Arc::clone(&self.buckets),
        }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for RateLimiter<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if let Some(client_id) = client_id(&req, &self.buckets.client_header) {
            let now = Instant::now();
            let allowed = self.buckets.check_and_consume(&client_id, now);
            self.buckets.sweep_if_needed(now);
            if !allowed {
                self.buckets.dropped_since_log.fetch_add(1, Ordering::Relaxed);
                self.buckets.log_drops_if_needed(now);
                return Box::pin(async move {
                    let body = Json(json!({ "error": "rate limited" }));
                    Ok((StatusCode::TOO_MANY_REQUESTS, body).into_response())
                });
            }
        }

        let fut = self.inner.call(req);
        Box::pin(fut)
    }
}

fn client_id<B>(req: &Request<B>, header: &HeaderName) -> Option<String> {
    // Proxies append to the right; everything left of the last hop is
    // whatever the client chose to send.
    let forwarded = req
        .headers()
        .get(header)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    forwarded.or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

impl Buckets {
    fn check_and_consume(&self, client: &str, now: Instant) -> bool {
        let mut entry = self.map.entry(client.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
        });
        let elapsed = now
            .saturating_duration_since(entry.last_refill)
            .as_secs_f64();
        if elapsed > 0.0 {
            entry.tokens = (entry.tokens + elapsed * self.rate_per_sec).min(self.burst);
            entry.last_refill = now;
        }
        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn sweep_if_needed(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.lock() else {
            return;
        };
        if self.map.len() < SWEEP_THRESHOLD
            && now.saturating_duration_since(*last) < SWEEP_INTERVAL
        {
            return;
        }
        *last = now;
        drop(last);
        self.evict_idle(now);
    }

    /// Drop buckets that have been idle long enough to be full again; a
    /// fresh bucket would behave identically.
    fn evict_idle(&self, now: Instant) {
        let before = self.map.len();
        self.map.retain(|_, bucket| {
            now.saturating_duration_since(bucket.last_refill) < self.idle_ttl
        });
        let evicted = before.saturating_sub(self.map.len());
        if evicted > 0 {
            debug!("rate limiter evicted {evicted} idle buckets");
        }
    }

    fn log_drops_if_needed(&self, now: Instant) {
        let Ok(mut last) = self.last_log.lock() else {
            return;
        };
        if now.saturating_duration_since(*last) >= LOG_INTERVAL {
            let dropped = self.dropped_since_log.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                warn!("rate limiter dropped {dropped} requests in the last minute");
            }
            *last = now;
        }
    }
}
