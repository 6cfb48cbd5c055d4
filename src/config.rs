//! Bot configuration from the environment

use crate::provider::RapidApiConfig;
use crate::runtime::RuntimeSettings;
use crate::state_machine::{DEFAULT_PHOTO_COUNTS, DEFAULT_RESULT_COUNTS};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_RAPIDAPI_HOST: &str = "hotels4.p.rapidapi.com";
const DEFAULT_PLACEHOLDER_PHOTO: &str =
    "https://upload.wikimedia.org/wikipedia/commons/a/ac/No_image_available.svg";
/// Telegram rejects albums larger than this
const MAX_PHOTO_COUNT: u8 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub rapidapi_key: String,
    pub rapidapi_host: String,
    pub db_path: PathBuf,
    pub provider_timeout: Duration,
    pub poll_timeout: Duration,
    pub session_idle: Duration,
    pub result_counts: Vec<u8>,
    pub photo_counts: Vec<u8>,
    pub placeholder_photo: String,
    pub locale: String,
    pub history_limit: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));
        let secs = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match var(name) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(ConfigError::Invalid {
                        name,
                        reason: format!("expected a positive number of seconds, got {raw:?}"),
                    }),
                    Ok(n) => Ok(Duration::from_secs(n)),
                },
            }
        };

        let db_path = var("HOTEL_WIZARD_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.hotel-wizard/history.db"))
            },
            PathBuf::from,
        );

        let result_counts = match var("HOTEL_WIZARD_RESULT_COUNTS") {
            None => DEFAULT_RESULT_COUNTS.to_vec(),
            Some(raw) => parse_counts("HOTEL_WIZARD_RESULT_COUNTS", &raw, u8::MAX)?,
        };
        let photo_counts = match var("HOTEL_WIZARD_PHOTO_COUNTS") {
            None => DEFAULT_PHOTO_COUNTS.to_vec(),
            Some(raw) => parse_counts("HOTEL_WIZARD_PHOTO_COUNTS", &raw, MAX_PHOTO_COUNT)?,
        };

        let history_limit = match var("HOTEL_WIZARD_HISTORY_LIMIT") {
            None => 5,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "HOTEL_WIZARD_HISTORY_LIMIT",
                    reason: format!("expected a positive integer, got {raw:?}"),
                })?,
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            rapidapi_key: required("RAPIDAPI_KEY")?,
            rapidapi_host: var("RAPIDAPI_HOST").unwrap_or_else(|| DEFAULT_RAPIDAPI_HOST.to_string()),
            db_path,
            provider_timeout: secs("HOTEL_WIZARD_PROVIDER_TIMEOUT_SECS", 20)?,
            poll_timeout: secs("HOTEL_WIZARD_POLL_TIMEOUT_SECS", 30)?,
            session_idle: secs("HOTEL_WIZARD_SESSION_IDLE_SECS", 900)?,
            result_counts,
            photo_counts,
            placeholder_photo: var("HOTEL_WIZARD_PLACEHOLDER_PHOTO")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_PHOTO.to_string()),
            locale: var("HOTEL_WIZARD_LOCALE").unwrap_or_else(|| "en_US".to_string()),
            history_limit,
        })
    }

    pub fn rapid_api(&self) -> RapidApiConfig {
        RapidApiConfig {
            api_key: self.rapidapi_key.clone(),
            host: self.rapidapi_host.clone(),
            locale: self.locale.clone(),
            timeout: self.provider_timeout,
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            provider_timeout: self.provider_timeout,
            idle_timeout: self.session_idle,
            result_counts: self.result_counts.clone(),
            photo_counts: self.photo_counts.clone(),
            history_limit: self.history_limit,
            ..RuntimeSettings::default()
        }
    }
}

/// Comma-separated button choices, deduplicated and sorted
fn parse_counts(name: &'static str, raw: &str, max: u8) -> Result<Vec<u8>, ConfigError> {
    let mut counts = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let count = part
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or_else(|| ConfigError::Invalid {
                name,
                reason: format!("{part:?} is not a count between 1 and {max}"),
            })?;
        counts.push(count);
    }
    counts.sort_unstable();
    counts.dedup();
    if counts.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            reason: "no counts given".to_string(),
        });
    }
    Ok(counts)
}
