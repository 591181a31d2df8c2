use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Result, anyhow};
use tracing::{info, warn};

pub const DEFAULT_SEARCH_ROOT: &str = "https://api.datamarket.azure.com/bing/Search/";

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub search_root_url: String,
    pub search_timeout: Duration,
    pub media_root: PathBuf,
    /// Search is disabled when no key is provisioned.
    pub bing_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", "8000")?,
            database_url: try_load("DATABASE_URL", "sqlite://rango.db")?,
            search_root_url: try_load("SEARCH_ROOT_URL", DEFAULT_SEARCH_ROOT)?,
            search_timeout: Duration::from_millis(try_load("SEARCH_TIMEOUT_MS", "5000")?),
            media_root: try_load("MEDIA_ROOT", "media")?,
            bing_api_key: read_secret("BING_API_KEY"),
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}

/// Docker secret first, then the environment.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    let secret = read_to_string(&path)
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}, trying environment");
        })
        .or_else(|_| env::var(secret_name))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty());

    if secret.is_none() {
        warn!("{secret_name} not provisioned, search is disabled");
    }

    secret
}

#[cfg(test)]
mod tests {
    use super::try_load;

    #[test]
    fn test_default_used_when_unset() {
        let port: u16 = try_load("RANGO_TEST_UNSET_PORT", "8123").unwrap();
        assert_eq!(port, 8123);
    }

    #[test]
    fn test_invalid_value_names_key() {
        let err = try_load::<u16>("RANGO_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("RANGO_TEST_UNSET_PORT"));
    }
}
