use ethers::types::Address;
use rust_decimal::Decimal;
use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_RPC_URL: &str = "https://rpc.ankr.com/bsc";
/// WIN token on BNB Smart Chain.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0x163f182C32d24A09d91EB75820cDe9FD5832b329";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rpc_url: String,
    pub token_address: Address,
    pub token_decimals: u32,
    pub block_window: u64,
    pub chunk_size: u64,
    pub chunk_delay: Duration,
    pub cache_ttl: Duration,
    pub reward_rate: Decimal,
    pub snapshot_path: PathBuf,
    pub redis_url: Option<String>,
    pub snapshot_key: String,
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(key, &raw, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source, applying defaults
    /// for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_raw = lookup("TOKEN_ADDRESS").unwrap_or_else(|| DEFAULT_TOKEN_ADDRESS.to_string());
        let token_address = Address::from_str(token_raw.trim())
            .map_err(|e| ConfigError::invalid("TOKEN_ADDRESS", &token_raw, e))?;

        let config = Config {
            port: parse_or(&lookup, "PORT", 3000)?,
            rpc_url: lookup("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            token_address,
            token_decimals: parse_or(&lookup, "TOKEN_DECIMALS", 18)?,
            block_window: parse_or(&lookup, "BLOCK_WINDOW", 50_000)?,
            chunk_size: parse_or(&lookup, "CHUNK_SIZE", 5_000)?,
            chunk_delay: Duration::from_millis(parse_or(&lookup, "CHUNK_DELAY_MS", 2_000)?),
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 60)?),
            reward_rate: parse_or(&lookup, "REWARD_RATE", Decimal::new(5, 2))?,
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("leaderboard_cache.json")),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            snapshot_key: lookup("SNAPSHOT_KEY")
                .unwrap_or_else(|| "leaderboard:snapshot".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("CHUNK_SIZE", "0", "must be at least 1"));
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::invalid("CACHE_TTL_SECS", "0", "must be at least 1"));
        }
        if self.reward_rate.is_sign_negative() {
            return Err(ConfigError::invalid(
                "REWARD_RATE",
                &self.reward_rate.to_string(),
                "must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_original_deployment() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.block_window, 50_000);
        assert_eq!(config.chunk_size, 5_000);
        assert_eq!(config.chunk_delay, Duration::from_secs(2));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.reward_rate, Decimal::from_str("0.05").unwrap());
        assert_eq!(config.token_decimals, 18);
        assert_eq!(
            config.token_address,
            Address::from_str(DEFAULT_TOKEN_ADDRESS).unwrap()
        );
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("BLOCK_WINDOW", "1000"),
            ("CHUNK_SIZE", " 250 "),
            ("CHUNK_DELAY_MS", "0"),
            ("REWARD_RATE", "0.1"),
            ("REDIS_URL", "redis://localhost:6379"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.block_window, 1000);
        assert_eq!(config.chunk_size, 250);
        assert!(config.chunk_delay.is_zero());
        assert_eq!(config.reward_rate, Decimal::from_str("0.1").unwrap());
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from(&[("BLOCK_WINDOW", "fifty thousand")]).unwrap_err();
        assert!(err.to_string().contains("BLOCK_WINDOW"));
    }

    #[test]
    fn rejects_bad_token_address() {
        assert!(config_from(&[("TOKEN_ADDRESS", "0x1234")]).is_err());
    }

    #[test]
    fn rejects_zero_chunk_size_and_ttl() {
        assert!(config_from(&[("CHUNK_SIZE", "0")]).is_err());
        assert!(config_from(&[("CACHE_TTL_SECS", "0")]).is_err());
    }

    #[test]
    fn rejects_negative_reward_rate() {
        assert!(config_from(&[("REWARD_RATE", "-0.05")]).is_err());
    }
}
