use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::services::excel::SheetLayout;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Base URL of the records backend, without a trailing slash.
    pub backend_url: String,
    pub backend_timeout: Option<Duration>,
    pub max_file_size: usize,
    pub import_session_ttl: Duration,
    pub sheet_layout: SheetLayout,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|e| anyhow::anyhow!("Failed to load BACKEND_URL: {}", e))?
            .trim_end_matches('/')
            .to_string();

        let bind_addr = env_or("BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?;
        let max_file_size = env_or("MAX_FILE_SIZE", default_max_file_size())?;
        let ttl_secs = env_or("IMPORT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let backend_timeout = match std::env::var("BACKEND_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(
                raw.parse().with_context(|| format!("Invalid BACKEND_TIMEOUT_SECS: {}", raw))?,
            )),
            Err(_) => None,
        };

        let defaults = SheetLayout::default();
        let sheet_layout = SheetLayout {
            header_rows: env_or("SHEET_HEADER_ROWS", defaults.header_rows)?,
            leading_columns: env_or("SHEET_LEADING_COLUMNS", defaults.leading_columns)?,
        };

        Ok(Config {
            bind_addr,
            backend_url,
            backend_timeout,
            max_file_size,
            import_session_ttl: Duration::from_secs(ttl_secs),
            sheet_layout,
        })
    }
}

pub fn load_config() -> Result<Config> {
    // Load .env file first
    dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!(
        "Loaded configuration: backend={}, bind={}, max_file_size={}",
        config.backend_url,
        config.bind_addr,
        config.max_file_size
    );
    Ok(config)
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        let value: usize = env_or("SHEET_EXCHANGE_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        std::env::set_var("SHEET_EXCHANGE_TEST_BAD_NUMBER", "ten");
        let value: Result<usize> = env_or("SHEET_EXCHANGE_TEST_BAD_NUMBER", 1);
        assert!(value.is_err());
    }
}
