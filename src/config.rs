//! Layered application configuration: defaults, then an optional TOML file, then
//! `STREAMVAULT__SECTION__KEY` environment variables.

use crate::cache::CacheConfig;
use crate::download::DownloadConfig;
use crate::scraper::{MultiServerConfig, VidLinkConfig, VidSrcConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "STREAMVAULT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cache: CacheSection,
    pub downloads: DownloadSection,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration. A missing file is not an error; the defaults and environment still apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("providers.vidsrc_domains")
                    .with_list_parse_key("providers.multiserver_servers")
                    .with_list_parse_key("providers.gated_hosts")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8750,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for cache files, download buckets and settings
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("streamvault"),
        }
    }
}

/// Cache settings as written in configuration; TTLs in seconds, absent meaning no TTL
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub memory_max_bytes: u64,
    pub disk_max_bytes: u64,
    pub home_ttl_secs: Option<u64>,
    pub search_ttl_secs: Option<u64>,
    pub links_ttl_secs: Option<u64>,
    pub details_ttl_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            memory_max_bytes: defaults.memory_max_bytes,
            disk_max_bytes: defaults.disk_max_bytes,
            home_ttl_secs: defaults.home_ttl.map(|d| d.as_secs()),
            search_ttl_secs: defaults.search_ttl.map(|d| d.as_secs()),
            links_ttl_secs: defaults.links_ttl.map(|d| d.as_secs()),
            details_ttl_secs: defaults.details_ttl.map(|d| d.as_secs()),
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        Self {
            memory_max_bytes: section.memory_max_bytes,
            disk_max_bytes: section.disk_max_bytes,
            home_ttl: section.home_ttl_secs.map(Duration::from_secs),
            search_ttl: section.search_ttl_secs.map(Duration::from_secs),
            links_ttl: section.links_ttl_secs.map(Duration::from_secs),
            details_ttl: section.details_ttl_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub max_concurrent: usize,
    pub directory: PathBuf,
    pub allow_cellular: bool,
}

impl Default for DownloadSection {
    fn default() -> Self {
        let defaults = DownloadConfig::default();
        Self {
            max_concurrent: defaults.max_concurrent,
            directory: defaults.directory,
            allow_cellular: defaults.allow_cellular,
        }
    }
}

impl From<&DownloadSection> for DownloadConfig {
    fn from(section: &DownloadSection) -> Self {
        Self {
            max_concurrent: section.max_concurrent.max(1),
            directory: section.directory.clone(),
            allow_cellular: section.allow_cellular,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Selected on first run, before any choice is persisted
    pub default_provider: String,
    pub tmdb_api_key: String,
    pub tmdb_base_url: Option<String>,
    /// Primary embed domain first, fallbacks after
    pub vidsrc_domains: Vec<String>,
    pub vidlink_base_url: String,
    pub vidlink_passphrase: String,
    pub multiserver_base_url: String,
    pub multiserver_servers: Vec<String>,
    pub multiserver_passphrase: String,
    pub oracle_url: String,
    pub oracle_passphrase: String,
    /// Direct-file hosts that need Referer/Origin replayed
    pub gated_hosts: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let vidsrc = VidSrcConfig::default();
        let vidlink = VidLinkConfig::default();
        let multi = MultiServerConfig::default();
        Self {
            default_provider: "VidSrc".to_string(),
            tmdb_api_key: String::new(),
            tmdb_base_url: None,
            vidsrc_domains: vidsrc.domains,
            vidlink_base_url: vidlink.base_url,
            vidlink_passphrase: vidlink.passphrase,
            multiserver_base_url: multi.base_url,
            multiserver_servers: multi.servers,
            multiserver_passphrase: multi.secret_passphrase,
            oracle_url: multi.oracle_url,
            oracle_passphrase: multi.oracle_passphrase,
            gated_hosts: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    pub fn vidsrc(&self) -> VidSrcConfig {
        VidSrcConfig {
            domains: self.vidsrc_domains.clone(),
            gated_hosts: self.gated_hosts.clone(),
        }
    }

    pub fn vidlink(&self) -> VidLinkConfig {
        VidLinkConfig {
            base_url: self.vidlink_base_url.clone(),
            passphrase: self.vidlink_passphrase.clone(),
            gated_hosts: self.gated_hosts.clone(),
        }
    }

    pub fn multiserver(&self) -> MultiServerConfig {
        MultiServerConfig {
            base_url: self.multiserver_base_url.clone(),
            servers: self.multiserver_servers.clone(),
            secret_passphrase: self.multiserver_passphrase.clone(),
            oracle_url: self.oracle_url.clone(),
            oracle_passphrase: self.oracle_passphrase.clone(),
            gated_hosts: self.gated_hosts.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    pub json: bool,
    /// Daily-rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}
