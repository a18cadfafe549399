use std::{
    net::{IpAddr, Ipv4Addr},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use rocket::{
    Request, State,
    http::Status,
    request::{self, FromRequest},
};
use tracing::{debug, instrument, warn};

use crate::config::StoreConfig;

#[derive(Debug)]
pub struct TokenBucket {
    last_refill: Instant,
    tokens: u32,
    capacity: u32,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(capacity: u32, refill_interval: Duration) -> Self {
        debug!(
            "Creating new token bucket: capacity={}, interval={}s",
            capacity,
            refill_interval.as_secs()
        );
        Self {
            last_refill: Instant::now(),
            tokens: capacity,
            capacity,
            refill_interval,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            debug!("Token consumed, remaining: {}", self.tokens);
            true
        } else {
            debug!("No tokens available for consumption");
            false
        }
    }

    /// Tops the bucket back up to capacity once per elapsed interval.
    fn refill(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_refill) >= self.refill_interval {
            if self.tokens != self.capacity {
                debug!(
                    "Token bucket refilled: {} -> {} tokens",
                    self.tokens, self.capacity
                );
            }
            self.tokens = self.capacity;
            self.last_refill = now;
        }
    }
}

pub type RateLimiter = DashMap<IpAddr, TokenBucket>;

pub fn create_rate_limiter() -> RateLimiter {
    DashMap::new()
}

/// Caller address, preferring proxy headers over the socket peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|header| header.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
            .or_else(|| {
                req.headers()
                    .get_one("X-Real-IP")
                    .and_then(|ip| ip.parse().ok())
            })
            .or_else(|| req.client_ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        request::Outcome::Success(ClientIp(ip))
    }
}

/// Spends one write token for `client_ip`.
#[instrument(level = "trace", skip(rate_limiter, config))]
pub fn check_rate_limit(
    rate_limiter: &State<RateLimiter>,
    config: &State<StoreConfig>,
    client_ip: &ClientIp,
) -> Result<(), Status> {
    let mut entry = rate_limiter.entry(client_ip.0).or_insert_with(|| {
        TokenBucket::new(config.writes_per_minute, Duration::from_secs(60))
    });

    if entry.try_consume() {
        debug!("Rate limit check passed for {}", client_ip.0);
        Ok(())
    } else {
        warn!("Rate limit exceeded for {} - rejecting write", client_ip.0);
        Err(Status::TooManyRequests)
    }
}
