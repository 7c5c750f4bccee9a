//! `signals.toml` settings
//!
//! ```toml
//! [server]
//! safe_url = "https://acme.safescore.io"
//! api_username = "api-user"
//! api_password = "..."
//! timeout_secs = 60
//!
//! [samples]
//! dir = "./samples"
//!
//! [resolver]
//! max_chain_length = 32
//! ```
//!
//! Server credentials may also come from the environment; see the CLI flags.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use signal_core::DEFAULT_MAX_CHAIN_LENGTH;
use signal_transport::TransportConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing server setting '{0}' (set it in [server] or the environment)")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub samples: SampleSettings,
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub safe_url: Option<String>,
    pub api_username: Option<String>,
    pub api_password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            safe_url: None,
            api_username: None,
            api_password: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SampleSettings {
    pub dir: PathBuf,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./samples"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub max_chain_length: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply values given on the command line or in the environment
    pub fn with_overrides(
        mut self,
        safe_url: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        if safe_url.is_some() {
            self.server.safe_url = safe_url;
        }
        if username.is_some() {
            self.server.api_username = username;
        }
        if password.is_some() {
            self.server.api_password = password;
        }
        self
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        }

        let server = &self.server;
        let config = TransportConfig::new(
            required(&server.safe_url, "safe_url")?,
            required(&server.api_username, "api_username")?,
            required(&server.api_password, "api_password")?,
        );
        Ok(config.with_timeout(server.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.toml");
        fs::write(
            &path,
            r#"
[server]
safe_url = "https://acme.safescore.io"
api_username = "api-user"
api_password = "secret"
timeout_secs = 15

[samples]
dir = "/data/signals"

[resolver]
max_chain_length = 8
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.samples.dir, PathBuf::from("/data/signals"));
        assert_eq!(settings.resolver.max_chain_length, 8);

        let transport = settings.transport_config().unwrap();
        assert_eq!(transport.base_url, "https://acme.safescore.io");
        assert_eq!(transport.timeout_secs, 15);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.server.timeout_secs, 60);
        assert_eq!(settings.resolver.max_chain_length, DEFAULT_MAX_CHAIN_LENGTH);
        assert_eq!(settings.samples.dir, PathBuf::from("./samples"));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.toml");
        fs::write(&path, "[server\nsafe_url = ").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides_and_missing_server() {
        let settings = Settings::default();
        assert!(matches!(
            settings.transport_config(),
            Err(ConfigError::Missing("safe_url"))
        ));

        let settings = settings.with_overrides(
            Some("https://acme.safescore.io".to_string()),
            Some("api-user".to_string()),
            None,
        );
        assert!(matches!(
            settings.transport_config(),
            Err(ConfigError::Missing("api_password"))
        ));

        let settings = settings.with_overrides(None, None, Some("secret".to_string()));
        assert_eq!(settings.transport_config().unwrap().username, "api-user");
    }
}
