use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{FixedOffset, Offset, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub query_timeout: Duration,
    pub day_offset: FixedOffset,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = match lookup("SIGNIN_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("SIGNIN_MAX_CONNECTIONS is not a number: {value}"))?,
            None => 5,
        };

        let timeout_secs: u64 = match lookup("SIGNIN_QUERY_TIMEOUT_SECS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("SIGNIN_QUERY_TIMEOUT_SECS is not a number: {value}"))?,
            None => 10,
        };

        let day_offset = match lookup("SIGNIN_UTC_OFFSET") {
            Some(value) => value
                .parse::<FixedOffset>()
                .map_err(|err| anyhow!("SIGNIN_UTC_OFFSET {value:?} is not an offset: {err}"))?,
            None => Utc.fix(),
        };

        let log_format = match lookup("SIGNIN_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(anyhow!("SIGNIN_LOG_FORMAT must be text or json, got {other}")),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            max_connections,
            query_timeout: Duration::from_secs(timeout_secs),
            day_offset,
            log_level: lookup("SIGNIN_LOG").unwrap_or_else(|| "info".to_string()),
            log_format,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}
