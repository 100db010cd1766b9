use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use platform_db::StoreSettings;

const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_file: PathBuf,
    /// Zero disables the periodic flusher.
    pub flush_interval: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let data_file = StoreSettings::from_env().data_file;

        let flush_interval = match std::env::var("FLUSH_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid FLUSH_INTERVAL_SECS {raw:?}"))?,
            Err(_) => DEFAULT_FLUSH_INTERVAL_SECS,
        };

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        Ok(Self {
            data_file,
            flush_interval: Duration::from_secs(flush_interval),
            cors_allowed_origins,
        })
    }

    pub fn with_data_file(mut self, data_file: Option<PathBuf>) -> Self {
        if let Some(path) = data_file {
            self.data_file = path;
        }
        self
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings::new(&self.data_file)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
