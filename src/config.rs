//! Configuration and paths

use std::path::{Path, PathBuf};

/// All configurable paths and constants
#[derive(Debug, Clone)]
pub struct Config {
    pub providers_file: PathBuf,
    pub bind_address: String,
    pub smtp_timeout_secs: u64,
    pub sms_char_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smtp-messenger");

        Self {
            providers_file: config_dir.join(PROVIDERS_FILE_NAME),
            bind_address: "127.0.0.1:8501".to_string(),
            smtp_timeout_secs: 60,
            sms_char_limit: SMS_CHAR_LIMIT,
        }
    }
}

impl Config {
    /// Create config for testing with custom paths
    pub fn for_test(temp_dir: &Path) -> Self {
        Self {
            providers_file: temp_dir.join(PROVIDERS_FILE_NAME),
            bind_address: "127.0.0.1:0".to_string(),
            smtp_timeout_secs: 5,
            sms_char_limit: SMS_CHAR_LIMIT,
        }
    }

    /// Point the custom providers file somewhere else
    pub fn with_providers_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.providers_file = path.into();
        self
    }
}

/// File name of the user's custom SMTP providers
pub const PROVIDERS_FILE_NAME: &str = "smtp_configs.json";

/// Single-segment SMS length most carriers deliver intact
pub const SMS_CHAR_LIMIT: usize = 160;
