use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

/// Longest retention accepted, about ten years.
const MAX_RETENTION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: Database,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
    #[serde(default)]
    pub kind: CacheKind,
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Redis,
    #[default]
    Memory,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_generate_attempts")]
    pub max_generate_attempts: u32,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    3000
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60
}

fn default_max_upload_size() -> usize {
    10 * 1024 * 1024
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_reap_interval_secs() -> u64 {
    5 * 60
}

fn default_code_length() -> usize {
    8
}

fn default_max_generate_attempts() -> u32 {
    3
}

impl Default for Cache {
    fn default() -> Self {
        Cache {
            kind: CacheKind::default(),
            redis_url: None,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_upload_size: default_max_upload_size(),
            retention_secs: default_retention_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            code_length: default_code_length(),
            max_generate_attempts: default_max_generate_attempts(),
        }
    }
}

impl Config {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(source).context("failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.limits.retention_secs == 0 || self.limits.retention_secs > MAX_RETENTION_SECS {
            bail!(
                "limits.retention_secs must be between 1 and {MAX_RETENTION_SECS} seconds"
            );
        }
        if self.cache.ttl_secs > self.limits.retention_secs {
            bail!(
                "cache.ttl_secs ({}) must not exceed limits.retention_secs ({})",
                self.cache.ttl_secs,
                self.limits.retention_secs
            );
        }
        if self.limits.code_length == 0 {
            bail!("limits.code_length must be at least 1");
        }
        if self.limits.max_generate_attempts == 0 {
            bail!("limits.max_generate_attempts must be at least 1");
        }
        if self.limits.reap_interval_secs == 0 {
            bail!("limits.reap_interval_secs must be at least 1");
        }
        if self.cache.kind == CacheKind::Redis && self.cache.redis_url.is_none() {
            bail!("cache.redis_url is required when cache.kind = \"redis\"");
        }
        Ok(())
    }
}

impl Limits {
    /// How long a paste stays retrievable after creation.
    pub fn retention(&self) -> chrono::Duration {
        // bounded by MAX_RETENTION_SECS
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    pub fn reap_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reap_interval_secs)
    }
}

impl Cache {
    pub fn ttl(&self) -> chrono::Duration {
        // bounded by retention_secs
        chrono::Duration::seconds(self.ttl_secs as i64)
    }
}
