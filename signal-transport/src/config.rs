//! SAFE API connection settings

use std::fmt;

/// Default authentication endpoint
pub const DEFAULT_AUTH_PATH: &str = "/api/v3/auth";

/// Default endpoint for single JSON signals
pub const DEFAULT_SIGNALS_PATH: &str = "/api/v3/signals";

/// Default endpoint for zipped signal batches
pub const DEFAULT_ARCHIVE_PATH: &str = "/api/v3/signals/zip";

/// Transport configuration
#[derive(Clone)]
pub struct TransportConfig {
    /// Base URL of the SAFE instance, e.g. `https://acme.safescore.io`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub auth_path: String,
    pub signals_path: String,
    pub archive_path: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 60,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            signals_path: DEFAULT_SIGNALS_PATH.to_string(),
            archive_path: DEFAULT_ARCHIVE_PATH.to_string(),
        }
    }
}

impl TransportConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Absolute URL of an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn auth_url(&self) -> String {
        self.endpoint(&self.auth_path)
    }

    pub fn signals_url(&self) -> String {
        self.endpoint(&self.signals_path)
    }

    pub fn archive_url(&self) -> String {
        self.endpoint(&self.archive_path)
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("auth_path", &self.auth_path)
            .field("signals_path", &self.signals_path)
            .field("archive_path", &self.archive_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.auth_path, "/api/v3/auth");
        assert_eq!(config.signals_path, "/api/v3/signals");
        assert_eq!(config.archive_path, "/api/v3/signals/zip");
    }

    #[test]
    fn test_endpoint_joining() {
        let config = TransportConfig::new("https://acme.safescore.io/", "api", "secret");
        assert_eq!(config.auth_url(), "https://acme.safescore.io/api/v3/auth");
        assert_eq!(config.signals_url(), "https://acme.safescore.io/api/v3/signals");
        assert_eq!(config.archive_url(), "https://acme.safescore.io/api/v3/signals/zip");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = TransportConfig::new("https://acme.safescore.io", "api", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("api"));
        assert!(!debug.contains("hunter2"));
    }
}
