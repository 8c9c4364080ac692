//! Remote JSON Web Key Set lookup used by bearer-token verification.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Minimum age before a cached key set is fetched again.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Forced refreshes (unknown `kid`) for the same URL are limited to one per cooldown.
pub const MISS_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("failed to fetch key set from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("key set endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid key set document from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of verification keys, keyed by JWKS URL.
///
/// Implementations must be shareable across requests.
#[async_trait]
pub trait KeySetProvider: Send + Sync + 'static {
    /// Key set for `url`, served from cache when fresh enough.
    async fn key_set(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError>;

    /// Re-fetch `url` because a key was not found. May be rate limited.
    async fn refresh(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError>;
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// HTTP-backed, process-wide key-set cache.
///
/// Concurrent refreshes of the same URL may race; the last writer wins. A failed
/// refresh never drops keys that are already cached.
#[derive(Debug)]
pub struct JwksCache {
    http: reqwest::Client,
    entries: RwLock<HashMap<String, CachedKeySet>>,
    min_refresh_interval: Duration,
    miss_cooldown: Duration,
}

impl JwksCache {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self::with_client(http, MIN_REFRESH_INTERVAL, MISS_REFRESH_COOLDOWN))
    }

    pub fn with_client(
        http: reqwest::Client,
        min_refresh_interval: Duration,
        miss_cooldown: Duration,
    ) -> Self {
        Self {
            http,
            entries: RwLock::new(HashMap::new()),
            min_refresh_interval,
            miss_cooldown,
        }
    }

    async fn cached(&self, url: &str) -> Option<CachedKeySet> {
        self.entries.read().await.get(url).cloned()
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, KeySetError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| KeySetError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KeySetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<JwkSet>()
            .await
            .map_err(|source| KeySetError::Decode {
                url: url.to_string(),
                source,
            })
    }

    /// Fetch and store; on failure fall back to whatever is cached.
    async fn fetch_and_store(
        &self,
        url: &str,
        stale: Option<CachedKeySet>,
    ) -> Result<Arc<JwkSet>, KeySetError> {
        match self.fetch(url).await {
            Ok(keys) => {
                let keys = Arc::new(keys);
                tracing::debug!(url, keys = keys.keys.len(), "key set fetched");
                self.entries.write().await.insert(
                    url.to_string(),
                    CachedKeySet {
                        keys: keys.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(keys)
            }
            Err(err) => match stale {
                Some(entry) => {
                    tracing::warn!(url, error = %err, "key set refresh failed, serving cached keys");
                    Ok(entry.keys)
                }
                None => Err(err),
            },
        }
    }
}

#[async_trait]
impl KeySetProvider for JwksCache {
    async fn key_set(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        let cached = self.cached(url).await;
        if let Some(entry) = &cached
            && entry.fetched_at.elapsed() < self.min_refresh_interval
        {
            return Ok(entry.keys.clone());
        }
        self.fetch_and_store(url, cached).await
    }

    async fn refresh(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        let cached = self.cached(url).await;
        if let Some(entry) = &cached
            && entry.fetched_at.elapsed() < self.miss_cooldown
        {
            tracing::debug!(url, "key set refresh skipped (cooldown)");
            return Ok(entry.keys.clone());
        }
        self.fetch_and_store(url, cached).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{JWKS_JSON, TEST_KID};

    const PATH: &str = "/.well-known/jwks.json";

    fn cache(min_refresh: Duration, cooldown: Duration) -> JwksCache {
        JwksCache::with_client(reqwest::Client::new(), min_refresh, cooldown)
    }

    #[tokio::test]
    async fn fresh_key_sets_are_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PATH)
            .with_header("content-type", "application/json")
            .with_body(JWKS_JSON)
            .expect(1)
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        let cache = cache(MIN_REFRESH_INTERVAL, MISS_REFRESH_COOLDOWN);
        let first = cache.key_set(&url).await.unwrap();
        let second = cache.key_set(&url).await.unwrap();

        assert!(first.find(TEST_KID).is_some());
        assert!(Arc::ptr_eq(&first, &second));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_is_rate_limited_by_cooldown() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PATH)
            .with_body(JWKS_JSON)
            .expect(1)
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        let cache = cache(MIN_REFRESH_INTERVAL, MISS_REFRESH_COOLDOWN);
        cache.key_set(&url).await.unwrap();
        cache.refresh(&url).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_refetches_after_cooldown() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PATH)
            .with_body(JWKS_JSON)
            .expect(2)
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        let cache = cache(MIN_REFRESH_INTERVAL, Duration::ZERO);
        cache.key_set(&url).await.unwrap();
        cache.refresh(&url).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_keeps_serving_cached_keys() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", PATH)
            .with_body(JWKS_JSON)
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        // every lookup is considered stale
        let cache = cache(Duration::ZERO, Duration::ZERO);
        cache.key_set(&url).await.unwrap();
        ok.remove_async().await;

        let _down = server
            .mock("GET", PATH)
            .with_status(500)
            .create_async()
            .await;

        let keys = cache.key_set(&url).await.unwrap();
        assert!(keys.find(TEST_KID).is_some());
        let keys = cache.refresh(&url).await.unwrap();
        assert!(keys.find(TEST_KID).is_some());
    }

    #[tokio::test]
    async fn first_fetch_failure_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _down = server
            .mock("GET", PATH)
            .with_status(503)
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        let err = cache(MIN_REFRESH_INTERVAL, MISS_REFRESH_COOLDOWN)
            .key_set(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_documents_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _bad = server
            .mock("GET", PATH)
            .with_body("{\"not\": \"a key set\"}")
            .create_async()
            .await;
        let url = format!("{}{}", server.url(), PATH);

        let err = cache(MIN_REFRESH_INTERVAL, MISS_REFRESH_COOLDOWN)
            .key_set(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, KeySetError::Decode { .. }));
    }
}
