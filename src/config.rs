use std::env;

use crate::error::AppError;
use crate::zones::Gazetteer;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub notification_queue_size: usize,
    pub backend_url: Option<String>,
    pub backend_timeout_ms: u64,
    pub simulated_latency_ms: u64,
    pub storage_dir: String,
    pub station_id: String,
    pub station_name: String,
    pub zones: Option<Gazetteer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            notification_queue_size: 256,
            backend_url: None,
            backend_timeout_ms: 10_000,
            simulated_latency_ms: 300,
            storage_dir: "data".to_string(),
            station_id: "station-1".to_string(),
            station_name: "Main Station".to_string(),
            zones: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            notification_queue_size: parse_or_default(
                "NOTIFICATION_QUEUE_SIZE",
                defaults.notification_queue_size,
            )?,
            backend_url: env::var("BACKEND_URL").ok().filter(|url| !url.trim().is_empty()),
            backend_timeout_ms: parse_or_default("BACKEND_TIMEOUT_MS", defaults.backend_timeout_ms)?,
            simulated_latency_ms: parse_or_default(
                "SIMULATED_LATENCY_MS",
                defaults.simulated_latency_ms,
            )?,
            storage_dir: env::var("STORAGE_DIR").unwrap_or(defaults.storage_dir),
            station_id: env::var("STATION_ID").unwrap_or(defaults.station_id),
            station_name: env::var("STATION_NAME").unwrap_or(defaults.station_name),
            zones: match env::var("ZONES_FILE") {
                Ok(path) => Some(load_zones(&path)?),
                Err(_) => None,
            },
        })
    }

    /// Storage key of this station's parcel snapshot.
    pub fn storage_key(&self) -> String {
        format!("parcels:{}", self.station_id)
    }
}

fn load_zones(path: &str) -> Result<Gazetteer, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| AppError::Internal(format!("failed to read ZONES_FILE {path}: {err}")))?;
    Gazetteer::from_json(&raw)
        .map_err(|err| AppError::Internal(format!("invalid ZONES_FILE {path}: {err}")))
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
