//! Sliding-window rate limiter
//!
//! One in-process limiter shared by all handlers, keyed per team slug
//! and per client IP. Buckets hold request timestamps inside the
//! window; an over-limit request learns how long to back off.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 120,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct RateBucket {
    requests: Vec<Instant>,
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<String, RateBucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `Err(retry_after)` when the key is over its window budget.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateBucket {
                requests: Vec::new(),
            });

        bucket
            .requests
            .retain(|&t| now.duration_since(t) < self.config.window);

        if bucket.requests.len() >= self.config.requests_per_window as usize {
            let retry_after = bucket
                .requests
                .first()
                .map(|&oldest| {
                    self.config
                        .window
                        .saturating_sub(now.duration_since(oldest))
                })
                .unwrap_or(self.config.window);
            return Err(retry_after);
        }

        bucket.requests.push(now);
        Ok(())
    }

    /// Drop buckets idle for more than two windows.
    pub async fn cleanup(&self) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let horizon = self.config.window * 2;
        buckets.retain(|_, bucket| {
            bucket
                .requests
                .last()
                .is_some_and(|&t| now.duration_since(t) < horizon)
        });
    }
}

/// Client IP from proxy headers, falling back to "unknown".
pub fn client_ip(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("X-Forwarded-For")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests_per_window: limit,
            window: Duration::from_secs(60),
        })
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(3);
        for _ in 0..3 {
            assert!(limiter.check("team:acme").await.is_ok());
        }
        let retry = limiter.check("team:acme").await.unwrap_err();
        assert!(retry <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("team:acme").await.is_ok());
        assert!(limiter.check("team:acme").await.is_err());
        assert!(limiter.check("team:other").await.is_ok());
    }

    #[tokio::test]
    async fn disabled_limiter_is_transparent() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            requests_per_window: 1,
            window: Duration::from_secs(60),
        });
        for _ in 0..50 {
            assert!(limiter.check("team:acme").await.is_ok());
        }
    }

    #[test]
    fn ip_extraction_prefers_real_ip() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("X-Forwarded-For", "1.2.3.4, 5.6.7.8".parse().unwrap());
        assert_eq!(client_ip(&headers), "1.2.3.4");
        headers.insert("X-Real-IP", "10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.0.0.1");
        assert_eq!(client_ip(&axum::http::HeaderMap::new()), "unknown");
    }
}
