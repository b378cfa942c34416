use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "software@example.com";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://filings.db";
pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

#[derive(Clone, Debug)]
pub struct HarvestConfig {
    pub user_agent: String,
    pub filings_dir: PathBuf,
    pub database_url: String,
    pub max_calls: usize,
    pub period: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub data_url: String,
    pub archives_url: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            filings_dir: PathBuf::from(crate::utils::dirs::FILINGS_DIR),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_calls: 10,
            period: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
            request_timeout: Duration::from_secs(30),
            data_url: EDGAR_DATA_URL.to_string(),
            archives_url: EDGAR_ARCHIVES_URL.to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_calls: usize =
            parse_var(&lookup, "HARVEST_MAX_CALLS")?.unwrap_or(defaults.max_calls);
        if max_calls == 0 {
            return Err(anyhow!("HARVEST_MAX_CALLS must be at least 1"));
        }

        let period = parse_var::<u64, _>(&lookup, "HARVEST_PERIOD_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.period);
        let retry_delay = parse_var::<u64, _>(&lookup, "HARVEST_RETRY_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        let request_timeout = parse_var::<u64, _>(&lookup, "HARVEST_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(anyhow!("HARVEST_REQUEST_TIMEOUT_SECS must be at least 1"));
        }

        Ok(Self {
            user_agent: lookup("USER_AGENT").unwrap_or(defaults.user_agent),
            filings_dir: lookup("HARVEST_FILINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.filings_dir),
            database_url: lookup("HARVEST_DATABASE_URL").unwrap_or(defaults.database_url),
            max_calls,
            period,
            max_retries: parse_var(&lookup, "HARVEST_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_delay,
            request_timeout,
            data_url: lookup("EDGAR_DATA_URL").unwrap_or(defaults.data_url),
            archives_url: lookup("EDGAR_ARCHIVES_URL").unwrap_or(defaults.archives_url),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(None),
    }
}
