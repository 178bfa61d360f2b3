// Runtime configuration, read from the environment (and `.env` via dotenv).

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "data/patrol.db";
pub const DEFAULT_ROBLOX_API_BASE: &str = "https://users.roblox.com";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub database_url: String,
    pub dev_guild_id: Option<u64>,
    pub roblox_api_base: String,
    pub loa_sweep_interval: Duration,
    pub nickname_batch_size: usize,
    pub nickname_batch_delay: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        Ok(Self {
            discord_token,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            dev_guild_id: parse_opt(get("DEV_GUILD_ID"), "DEV_GUILD_ID")?,
            roblox_api_base: get("ROBLOX_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ROBLOX_API_BASE.to_string()),
            loa_sweep_interval: Duration::from_secs(
                parse_opt(get("LOA_SWEEP_INTERVAL_SECS"), "LOA_SWEEP_INTERVAL_SECS")?
                    .unwrap_or(300)
                    .max(10),
            ),
            nickname_batch_size: parse_opt(get("NICKNAME_BATCH_SIZE"), "NICKNAME_BATCH_SIZE")?
                .unwrap_or(5)
                .clamp(1, 50),
            nickname_batch_delay: Duration::from_millis(
                parse_opt(get("NICKNAME_BATCH_DELAY_MS"), "NICKNAME_BATCH_DELAY_MS")?
                    .unwrap_or(1_500),
            ),
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    value: Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { var, value: raw })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.roblox_api_base, DEFAULT_ROBLOX_API_BASE);
        assert_eq!(config.dev_guild_id, None);
        assert_eq!(config.loa_sweep_interval, Duration::from_secs(300));
        assert_eq!(config.nickname_batch_size, 5);
        assert_eq!(config.nickname_batch_delay, Duration::from_millis(1_500));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::Missing("DISCORD_TOKEN")
        );
        assert_eq!(
            config_from(&[("DISCORD_TOKEN", "  ")]).unwrap_err(),
            ConfigError::Missing("DISCORD_TOKEN")
        );
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = config_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEV_GUILD_ID", "123456789012345678"),
            ("ROBLOX_API_BASE", "http://localhost:9000/"),
            ("NICKNAME_BATCH_SIZE", "500"),
        ])
        .unwrap();
        assert_eq!(config.dev_guild_id, Some(123456789012345678));
        assert_eq!(config.roblox_api_base, "http://localhost:9000");
        assert_eq!(config.nickname_batch_size, 50);

        let err = config_from(&[("DISCORD_TOKEN", "abc"), ("DEV_GUILD_ID", "nope")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEV_GUILD_ID", .. }));
    }
}
