use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProxyError, Result};

pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";
pub const UPSTREAM_KEY_ENV: &str = "UPSTREAM_KEY";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
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
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: Url,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &mask_key(&self.api_key))
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn new(raw_url: &str, api_key: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ProxyError::Config(format!("{} must not be empty", UPSTREAM_KEY_ENV)));
        }
        Ok(Self {
            base_url: validate_base_url(raw_url)?,
            api_key: api_key.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        })
    }
}

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
// Idle time allowed between reads, including the wait for response headers.
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

// On-disk shape; credentials never come from the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server: ServerConfig,
    upstream: FileUpstream,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileUpstream {
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
}

impl Settings {
    /// Reads the optional config file and the required upstream environment
    /// variables. Fails if either variable is absent so the process never
    /// starts serving without an upstream.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(Path::new("."), |name| std::env::var(name).ok())
    }

    pub fn load_from_dir<F>(dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_content = match Self::find_config_file(dir) {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Some(std::fs::read_to_string(path)?)
            }
            None => None,
        };
        Self::from_sources(file_content.as_deref(), env)
    }

    pub fn from_sources<F>(file_content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileSettings = match file_content {
            Some(content) => toml::from_str(content)
                .map_err(|e| ProxyError::Config(format!("invalid config file: {}", e)))?,
            None => FileSettings::default(),
        };

        let base_url = required_env(&env, UPSTREAM_URL_ENV)?;
        let api_key = required_env(&env, UPSTREAM_KEY_ENV)?;

        let mut upstream = UpstreamConfig::new(&base_url, &api_key)?;
        if let Some(secs) = file.upstream.connect_timeout_secs {
            upstream.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.upstream.read_timeout_secs {
            upstream.read_timeout = Duration::from_secs(secs);
        }

        Ok(Settings {
            server: file.server,
            upstream,
        })
    }

    fn find_config_file(dir: &Path) -> Option<PathBuf> {
        ["custom-config.toml", "config.toml"]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }
}

fn required_env<F>(env: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProxyError::Config(format!("environment variable {} is required", name)))
}

// Only http/https bases that can take extra path segments are usable.
fn validate_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ProxyError::Config(format!("{} is not a valid URL: {}", UPSTREAM_URL_ENV, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProxyError::Config(format!(
                "{} must use http or https, got {}",
                UPSTREAM_URL_ENV, other
            )));
        }
    }

    if url.host_str().is_none() || url.cannot_be_a_base() {
        return Err(ProxyError::Config(format!("{} is missing a host", UPSTREAM_URL_ENV)));
    }

    Ok(url)
}

pub fn mask_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    match (key.get(..4), key.get(key.len() - 4..)) {
        (Some(start), Some(end)) => format!("{}****{}", start, end),
        _ => "****".to_string(),
    }
}
