//! Session credentials for backend calls.
//!
//! Every API call carries the current session credential. The credential
//! source is injected into the client instead of being read from ambient
//! storage, so the client and the poller can be exercised without one.
//!
//! [`CredentialCache`] wraps a provider with:
//! - Refresh margin to avoid expiry during requests
//! - Single-flight refresh behind a write lock
//! - Fallback to the existing token while it is still usable

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Refresh a credential this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Environment variable read by [`EnvToken`].
pub const API_TOKEN_ENV: &str = "VSCORE_API_TOKEN";

/// A bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    /// `None` means the provider does not know; the token is used until rejected.
    pub expires_at: Option<Instant>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, at: Instant) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Still valid with the refresh margin applied.
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + REFRESH_MARGIN < at,
            None => true,
        }
    }

    /// Technically usable even though a refresh is due.
    fn is_usable(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

/// Source of the current session credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current credential, or `None` for anonymous calls.
    async fn credential(&self) -> ClientResult<Option<Credential>>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn credential(&self) -> ClientResult<Option<Credential>> {
        Ok(Some(Credential::bearer(self.0.clone())))
    }
}

/// Reads `VSCORE_API_TOKEN` on every refresh, so a rotated token is picked up
/// after the cache is invalidated.
#[derive(Debug, Clone, Default)]
pub struct EnvToken;

#[async_trait]
impl CredentialProvider for EnvToken {
    async fn credential(&self) -> ClientResult<Option<Credential>> {
        match std::env::var(API_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(Some(Credential::bearer(token.trim()))),
            _ => Ok(None),
        }
    }
}

/// No credential at all.
#[derive(Debug, Clone, Default)]
pub struct Anonymous;

#[async_trait]
impl CredentialProvider for Anonymous {
    async fn credential(&self) -> ClientResult<Option<Credential>> {
        Ok(None)
    }
}

/// Thread-safe credential cache with single-flight refresh.
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    cache: RwLock<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached credential, e.g. after a 401.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Get the current token, refreshing if necessary.
    pub async fn token(&self) -> ClientResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh() {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(Some(cached.token.clone()));
            }
        }

        match self.provider.credential().await {
            Ok(Some(credential)) => {
                let token = credential.token.clone();
                *cache = Some(credential);
                debug!("Refreshed session credential");
                Ok(Some(token))
            }
            Ok(None) => {
                *cache = None;
                Ok(None)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Credential refresh failed, using existing token: {}", e);
                        return Ok(Some(cached.token.clone()));
                    }
                }
                Err(ClientError::Credential(format!(
                    "Failed to obtain session credential: {}",
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Hands out `token-N`, counting calls; fails when `fail` is set.
    struct Counting {
        calls: AtomicU32,
        ttl: Option<Duration>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl Counting {
        fn new(ttl: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                ttl,
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CredentialProvider for Counting {
        async fn credential(&self) -> ClientResult<Option<Credential>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Credential("provider down".into()));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut credential = Credential::bearer(format!("token-{}", n));
            if let Some(ttl) = self.ttl {
                credential = credential.expiring_at(Instant::now() + ttl);
            }
            Ok(Some(credential))
        }
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let provider = Counting::new(None);
        let cache = CredentialCache::new(provider.clone());

        assert_eq!(cache.token().await.unwrap().as_deref(), Some("token-1"));
        assert_eq!(cache.token().await.unwrap().as_deref(), Some("token-1"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let provider = Counting::new(None);
        let cache = CredentialCache::new(provider.clone());

        cache.token().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.token().await.unwrap().as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_token_inside_refresh_margin_is_refreshed() {
        let provider = Counting::new(Some(Duration::from_secs(30)));
        let cache = CredentialCache::new(provider.clone());

        cache.token().await.unwrap();
        assert_eq!(cache.token().await.unwrap().as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_usable_token() {
        let provider = Counting::new(Some(Duration::from_secs(30)));
        let cache = CredentialCache::new(provider.clone());

        cache.token().await.unwrap();
        provider.fail.store(true, Ordering::SeqCst);
        assert_eq!(cache.token().await.unwrap().as_deref(), Some("token-1"));

        cache.invalidate().await;
        assert!(matches!(cache.token().await, Err(ClientError::Credential(_))));
    }

    #[test]
    fn test_static_and_anonymous_providers() {
        let token = tokio_test::block_on(StaticToken::new("abc").credential()).unwrap();
        assert_eq!(token, Some(Credential::bearer("abc")));

        let none = tokio_test::block_on(Anonymous.credential()).unwrap();
        assert!(none.is_none());
    }
}
