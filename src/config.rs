//! Client configuration, loaded from TOML.
//!
//! Every section and key is optional; an empty file yields
//! [`ClientConfig::default()`].
//!
//! ```toml
//! [server]
//! uri = "http://127.0.0.1:7777"
//! timeout_secs = 30
//!
//! [search]
//! page_size = 20
//!
//! [checkpoint]
//! poll_interval_ms = 100
//! max_interval_ms = 1000
//! backoff_multiplier = 1.0
//! max_wait_secs = 60
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_uri() -> String {
    "http://127.0.0.1:7777".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u64 {
    crate::searchable::DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CheckpointConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_wait_secs: None,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_max_interval_ms() -> u64 {
    1000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}

impl ClientConfig {
    /// Check value ranges. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        if self.server.uri.trim().is_empty() {
            return Err(Error::Config("server.uri must not be empty".to_string()));
        }

        if self.search.page_size < 1 {
            return Err(Error::Config("search.page_size must be >= 1".to_string()));
        }

        let cp = &self.checkpoint;
        if cp.poll_interval_ms < 1 {
            return Err(Error::Config(
                "checkpoint.poll_interval_ms must be >= 1".to_string(),
            ));
        }
        if cp.max_interval_ms < cp.poll_interval_ms {
            return Err(Error::Config(
                "checkpoint.max_interval_ms must be >= checkpoint.poll_interval_ms".to_string(),
            ));
        }
        if !cp.backoff_multiplier.is_finite() || cp.backoff_multiplier < 1.0 {
            return Err(Error::Config(
                "checkpoint.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: ClientConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.server.uri, "http://127.0.0.1:7777");
        assert_eq!(config.server.timeout(), Duration::from_secs(30));
        assert_eq!(config.search.page_size, 20);
        assert_eq!(config.checkpoint.max_wait_secs, None);
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            r#"
[server]
uri = "http://search.internal:8080/"

[checkpoint]
backoff_multiplier = 2.0
max_wait_secs = 60
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.uri, "http://search.internal:8080/");
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.checkpoint.poll_interval_ms, 100);
        assert_eq!(config.checkpoint.backoff_multiplier, 2.0);
        assert_eq!(config.checkpoint.max_wait_secs, Some(60));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let file = write_config("[search]\npage_size = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("search.page_size"));
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let file = write_config("[checkpoint]\nbackoff_multiplier = 0.5\n");
        assert!(matches!(load_config(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_max_interval_below_poll() {
        let file = write_config("[checkpoint]\npoll_interval_ms = 500\nmax_interval_ms = 100\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_interval_ms"));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[server\nuri = ");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/restpose.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
