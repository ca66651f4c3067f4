use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use teloxide::types::{ChatId, UserId};

use crate::error::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite://video_archive.db";
const DEFAULT_PORT: u16 = 10000;
const DEFAULT_SESSION_TTL_SECS: u64 = 900;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Channel whose video posts are archived.
    pub channel_id: ChatId,
    pub admin_ids: Vec<UserId>,
    /// Public URL for webhook mode; long polling is used when unset.
    pub webhook_url: Option<Url>,
    pub port: u16,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bot_token = non_empty("BOT_TOKEN")
            .or_else(|| non_empty("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let database_url =
            non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let channel_raw = non_empty("CHANNEL_ID").ok_or(ConfigError::Missing("CHANNEL_ID"))?;
        let channel_id = channel_raw
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| ConfigError::Invalid {
                name: "CHANNEL_ID",
                value: channel_raw.clone(),
            })?;

        let admin_raw = non_empty("ADMIN_IDS").ok_or(ConfigError::Missing("ADMIN_IDS"))?;
        let admin_ids = parse_admin_ids(&admin_raw)?;

        let webhook_url = match non_empty("WEBHOOK_URL") {
            Some(raw) => Some(Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
                name: "WEBHOOK_URL",
                value: raw.clone(),
            })?),
            None => None,
        };

        let port = parse_or("PORT", non_empty("PORT"), DEFAULT_PORT)?;
        let ttl_secs = parse_or(
            "SESSION_TTL_SECS",
            non_empty("SESSION_TTL_SECS"),
            DEFAULT_SESSION_TTL_SECS,
        )?;
        let db_max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            non_empty("DB_MAX_CONNECTIONS"),
            DEFAULT_DB_MAX_CONNECTIONS,
        )?;

        Ok(Self {
            bot_token,
            database_url,
            db_max_connections,
            channel_id,
            admin_ids,
            webhook_url,
            port,
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map(UserId).map_err(|_| ConfigError::Invalid {
                name: "ADMIN_IDS",
                value: raw.to_string(),
            })
        })
        .collect()
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
