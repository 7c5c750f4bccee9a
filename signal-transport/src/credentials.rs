//! Bearer token cache
//!
//! The SAFE API hands out short-lived access tokens. One cache is shared by
//! every request of a transport; a token is treated as expired slightly
//! before the server says so, so in-flight requests do not race the expiry.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Tokens are considered stale this long before their stated expiry
pub const EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    /// `None` when the server gave no lifetime
    expires_at: Option<Instant>,
}

/// Caller-owned cache of the current access token
#[derive(Debug, Default)]
pub struct CredentialCache {
    token: RwLock<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, if still usable
    pub fn get(&self) -> Option<String> {
        self.get_at(Instant::now())
    }

    fn get_at(&self, now: Instant) -> Option<String> {
        let guard = self.token.read();
        let token = guard.as_ref()?;

        match token.expires_at {
            Some(expires_at) if now + EXPIRY_SKEW >= expires_at => None,
            _ => Some(token.value.clone()),
        }
    }

    /// Remember a freshly issued token
    pub fn store(&self, value: &str, expires_in: Option<Duration>) {
        self.store_at(value, expires_in, Instant::now());
    }

    fn store_at(&self, value: &str, expires_in: Option<Duration>, now: Instant) {
        *self.token.write() = Some(CachedToken {
            value: value.to_string(),
            expires_at: expires_in.map(|lifetime| now + lifetime),
        });
    }

    /// Forget the token, e.g. after the server rejected it
    pub fn clear(&self) {
        if self.token.write().take().is_some() {
            debug!("Cleared cached access token");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        let cache = CredentialCache::new();
        assert!(cache.get().is_none());
        assert!(!cache.is_valid());
    }

    #[test]
    fn test_token_without_lifetime_never_expires() {
        let cache = CredentialCache::new();
        cache.store("abc", None);
        assert_eq!(cache.get().as_deref(), Some("abc"));
    }

    #[test]
    fn test_expiry_honours_skew() {
        let cache = CredentialCache::new();
        let now = Instant::now();
        cache.store_at("abc", Some(Duration::from_secs(300)), now);

        assert_eq!(cache.get_at(now).as_deref(), Some("abc"));
        assert_eq!(
            cache.get_at(now + Duration::from_secs(269)).as_deref(),
            Some("abc")
        );
        assert!(cache.get_at(now + Duration::from_secs(270)).is_none());
    }

    #[test]
    fn test_short_lifetime_is_immediately_stale() {
        let cache = CredentialCache::new();
        cache.store("abc", Some(Duration::from_secs(10)));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_clear() {
        let cache = CredentialCache::new();
        cache.store("abc", None);
        cache.clear();
        assert!(cache.get().is_none());
    }
}
