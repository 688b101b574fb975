use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::validate_and_normalize_url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listening address
    pub server: ServerConfig,

    /// Proxy list source
    pub proxy: ProxyConfig,

    /// Upstream transcript provider settings
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// URL serving `host:port:username:password` lines; direct mode when unset
    pub source_url: Option<String>,

    /// Timeout for downloading the list, in seconds
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the transcript provider
    pub base_url: String,

    /// Timeout for each upstream request, in seconds
    pub timeout_secs: u64,

    /// Preferred transcript languages, most preferred first
    pub languages: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            fetch_timeout_secs: 10,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            timeout_secs: 30,
            languages: vec!["en".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the given file, the default locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = fs_err::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Like [`Config::load`], but a missing explicit file yields the defaults
    ///
    /// Used when initializing a config file that does not exist yet.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => Ok(Self::default()),
            _ => Self::load(explicit),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-relay").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }

        self.listen_address()?;

        if let Some(source_url) = &self.proxy.source_url {
            validate_and_normalize_url(source_url).context("Invalid proxy source URL")?;
        }

        if self.proxy.fetch_timeout_secs == 0 {
            anyhow::bail!("Proxy fetch timeout must be at least one second");
        }

        validate_and_normalize_url(&self.upstream.base_url).context("Invalid upstream base URL")?;

        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("Upstream timeout must be at least one second");
        }

        if self.upstream.languages.is_empty() {
            anyhow::bail!("At least one transcript language must be configured");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen Address: {}:{}", self.server.host, self.server.port);
        match &self.proxy.source_url {
            Some(_) => println!("  Proxy Source: configured (hidden)"),
            None => println!("  Proxy Source: none (direct connection)"),
        }
        println!("  Proxy Fetch Timeout: {}s", self.proxy.fetch_timeout_secs);
        println!("  Upstream: {}", self.upstream.base_url);
        println!("  Upstream Timeout: {}s", self.upstream.timeout_secs);
        println!("  Languages: {}", self.upstream.languages.join(", "));
    }

    /// Socket address the server binds to
    pub fn listen_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.server.host, self.server.port))
    }

    pub fn proxy_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy.fetch_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }
}
