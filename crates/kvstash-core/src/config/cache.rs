//! Cache backend configuration.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Which backend a [`CacheConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// One file per key under `path`.
    File,
    /// A remote Redis server.
    Redis,
    /// An in-process store with Redis semantics.
    Memory,
}

impl DriverKind {
    /// The configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Ok(Self::File),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::configuration(format!(
                "Unknown cache type: '{other}'. Supported: file, redis, memory"
            ))),
        }
    }
}

/// Cache configuration, shared by every backend.
///
/// Options that do not apply to the selected backend are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend selector: `"file"`, `"redis"` or `"memory"`.
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    /// Default TTL in seconds; `0` means entries never expire.
    #[serde(default)]
    pub expire: u64,
    /// Namespace for keys (remote) or a sub-directory (file).
    #[serde(default)]
    pub prefix: String,
    /// Root directory of the file backend.
    #[serde(default)]
    pub path: String,
    /// Shard files into two-character hash sub-directories.
    #[serde(default = "default_true")]
    pub cache_subdir: bool,
    /// Compress file payloads.
    #[serde(default)]
    pub data_compress: bool,
    /// Remote store host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Remote store port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Remote store password (empty for none).
    #[serde(default)]
    pub password: String,
    /// Remote read timeout in seconds; `0` disables it.
    #[serde(default)]
    pub timeout: u64,
    /// Logical database index on the remote store.
    #[serde(default)]
    pub select: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: default_type(),
            expire: 0,
            prefix: String::new(),
            path: String::new(),
            cache_subdir: true,
            data_compress: false,
            host: default_host(),
            port: default_port(),
            password: String::new(),
            timeout: 0,
            select: 0,
        }
    }
}

impl CacheConfig {
    /// A file-backend configuration rooted at `path`.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: DriverKind::File.to_string(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// A redis-backend configuration for `host:port`.
    pub fn redis(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: DriverKind::Redis.to_string(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// An in-process store configuration.
    pub fn memory() -> Self {
        Self {
            kind: DriverKind::Memory.to_string(),
            ..Self::default()
        }
    }

    /// Check the configuration and resolve the backend kind.
    pub fn validate(&self) -> AppResult<DriverKind> {
        let kind: DriverKind = self.kind.parse()?;
        if kind == DriverKind::File && self.path.trim().is_empty() {
            return Err(AppError::configuration("config required path"));
        }
        if kind == DriverKind::Redis && self.host.trim().is_empty() {
            return Err(AppError::configuration("config required host"));
        }
        Ok(kind)
    }

    /// Connection URL for the remote store. The password is percent-encoded.
    pub fn redis_url(&self) -> String {
        let password = utf8_percent_encode(&self.password, NON_ALPHANUMERIC).to_string();
        self.format_redis_url(&password)
    }

    /// [`redis_url`](Self::redis_url) with the password replaced by `****`,
    /// for logs.
    pub fn redis_display_url(&self) -> String {
        self.format_redis_url("****")
    }

    fn format_redis_url(&self, password: &str) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.select)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.select
            )
        }
    }
}

fn default_type() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}
