use dotenvy::dotenv;
use std::{env, net::SocketAddr, time::Duration};
use thiserror::Error;

const DEFAULT_BUCKET: &str = "auten";
const DEFAULT_CACHE_MAX_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },
    #[error("invalid bind address {0}")]
    BindAddress(String),
}

/// Connection settings for the remote object store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` when either the store URL or the credential is missing.
    pub remote: Option<RemoteConfig>,
    pub base_url: Option<String>,
    pub deployment_url: Option<String>,
    pub push_timeout: Duration,
    pub fetch_timeout: Duration,
    pub cache_max_bytes: u64,
    pub cache_ttl: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values are treated the same as unset ones.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let remote = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(key)) => Some(RemoteConfig {
                url: url.trim_end_matches('/').to_string(),
                key,
                bucket: var("SUPABASE_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 5000)?,
            remote,
            base_url: var("BASE_URL"),
            deployment_url: var("VERCEL_URL"),
            push_timeout: Duration::from_secs(parse_or(
                "REMOTE_PUSH_TIMEOUT_SECS",
                var("REMOTE_PUSH_TIMEOUT_SECS"),
                30,
            )?),
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECS",
                var("FETCH_TIMEOUT_SECS"),
                30,
            )?),
            cache_max_bytes: parse_or(
                "CACHE_MAX_BYTES",
                var("CACHE_MAX_BYTES"),
                DEFAULT_CACHE_MAX_BYTES,
            )?,
            cache_ttl: var("CACHE_TTL_SECS")
                .map(|v| parse_or("CACHE_TTL_SECS", Some(v), 0))
                .transpose()?
                .map(Duration::from_secs),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::BindAddress(addr))
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber { name, value }),
    }
}
