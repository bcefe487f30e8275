use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}, expected compact or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub tick_interval: Duration,
    pub event_buffer_size: usize,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let tick_interval_ms: u64 = parse_or_default("TICK_INTERVAL_MS", 1000)?;
        if tick_interval_ms == 0 {
            return Err(AppError::Internal("invalid TICK_INTERVAL_MS: must be > 0".to_string()));
        }

        let event_buffer_size: usize = parse_or_default("EVENT_BUFFER_SIZE", 64)?;
        if event_buffer_size == 0 {
            return Err(AppError::Internal("invalid EVENT_BUFFER_SIZE: must be > 0".to_string()));
        }

        let sweep_interval_secs: u64 = parse_or_default("SESSION_SWEEP_INTERVAL_SECS", 60)?;
        if sweep_interval_secs == 0 {
            return Err(AppError::Internal(
                "invalid SESSION_SWEEP_INTERVAL_SECS: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            upstream_url: env::var("UPSTREAM_API_URL")
                .unwrap_or_else(|_| "http://localhost:7071/api".to_string()),
            upstream_timeout: Duration::from_secs(parse_or_default("UPSTREAM_TIMEOUT_SECS", 15)?),
            tick_interval: Duration::from_millis(tick_interval_ms),
            event_buffer_size,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
