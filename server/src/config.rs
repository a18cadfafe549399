use std::{env, str::FromStr, time::Duration};

use tracing::warn;

/// Settings for the store service, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Writes each client IP may issue per minute.
    pub writes_per_minute: u32,
    pub cleanup_interval: Duration,
    /// Idle time after which an unsubscribed document is evicted.
    pub inactive_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            writes_per_minute: 60,
            cleanup_interval: Duration::from_secs(60),
            inactive_timeout: Duration::from_secs(3600),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cors_allowed_origins = match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(value) => parse_origins(&value),
            Err(_) => defaults.cors_allowed_origins,
        };

        Self {
            writes_per_minute: env_or("RATE_LIMIT_WRITES_PER_MINUTE", defaults.writes_per_minute),
            cleanup_interval: Duration::from_secs(env_or(
                "CLEANUP_INTERVAL_SECONDS",
                defaults.cleanup_interval.as_secs(),
            )),
            inactive_timeout: Duration::from_secs(env_or(
                "INACTIVE_DOCUMENT_TIMEOUT_SECONDS",
                defaults.inactive_timeout.as_secs(),
            )),
            cors_allowed_origins,
        }
    }
}
