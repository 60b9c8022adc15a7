use crate::error::Error;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub connection: ConnectionSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionSettings {
    /// Hand out the synthetic key when the host has no usable channel
    pub debug_injection: bool,
    pub disable_wired: bool,
    pub disable_proximity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(Error::InvalidConfig {
                key: "KEYLINK_LOG_FORMAT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_injection = if cfg!(debug_assertions) { "true" } else { "false" };

        Ok(Config {
            connection: ConnectionSettings {
                debug_injection: parse_flag(
                    "KEYLINK_DEBUG_INJECTION",
                    &lookup("KEYLINK_DEBUG_INJECTION")
                        .unwrap_or_else(|| default_injection.to_string()),
                )?,
                disable_wired: parse_flag(
                    "KEYLINK_DISABLE_WIRED",
                    &lookup("KEYLINK_DISABLE_WIRED").unwrap_or_else(|| "false".to_string()),
                )?,
                disable_proximity: parse_flag(
                    "KEYLINK_DISABLE_PROXIMITY",
                    &lookup("KEYLINK_DISABLE_PROXIMITY").unwrap_or_else(|| "false".to_string()),
                )?,
            },
            logging: LoggingConfig {
                format: lookup("KEYLINK_LOG_FORMAT")
                    .unwrap_or_else(|| "pretty".to_string())
                    .parse()?,
            },
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.connection.debug_injection, cfg!(debug_assertions));
        assert!(!config.connection.disable_wired);
        assert!(!config.connection.disable_proximity);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("KEYLINK_DEBUG_INJECTION", "off"),
            ("KEYLINK_DISABLE_PROXIMITY", "1"),
            ("KEYLINK_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert!(!config.connection.debug_injection);
        assert!(config.connection.disable_proximity);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("KEYLINK_DISABLE_WIRED", "maybe")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("KEYLINK_LOG_FORMAT", "xml")])).is_err());
    }
}
