use std::time::Duration;

use crate::error::ShimmerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Hard ceiling on pages fetched for one request.
    pub max_pages: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            max_pages: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ShimmerError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. Unset variables keep their defaults.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ShimmerError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let http_timeout = parse_or(
            &mut get,
            "SHIMMER_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        )?;
        let connect_timeout = parse_or(
            &mut get,
            "SHIMMER_HTTP_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        )?;
        let retry_base_delay = parse_or(
            &mut get,
            "SHIMMER_RETRY_BASE_DELAY_MS",
            u64::try_from(defaults.retry_base_delay.as_millis()).unwrap_or(u64::MAX),
        )?;
        Ok(Self {
            http_timeout: Duration::from_secs(http_timeout),
            connect_timeout: Duration::from_secs(connect_timeout),
            max_retries: parse_or(&mut get, "SHIMMER_MAX_RETRIES", defaults.max_retries)?,
            retry_base_delay: Duration::from_millis(retry_base_delay),
            max_pages: parse_or(&mut get, "SHIMMER_MAX_PAGES", defaults.max_pages)?,
        })
    }
}

fn parse_or<F, T>(get: &mut F, key: &str, default: T) -> Result<T, ShimmerError>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ShimmerError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))),
    }
}
