//! Configuration module for the Gradian backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Where entity collections are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// One `all-<collection>.json` file per collection
    File,
    /// SQLite database file
    Database,
}

impl FromStr for StorageMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "mock" | "json" => Ok(StorageMode::File),
            "database" | "db" | "sqlite" => Ok(StorageMode::Database),
            other => Err(AppError::Internal(format!(
                "Invalid GRADIAN_STORAGE_MODE '{}': expected 'file' or 'database'",
                other
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication
    pub api_psk: Option<String>,
    /// Directory holding the JSON collection files
    pub data_dir: PathBuf,
    /// Storage backend selection
    pub storage_mode: StorageMode,
    /// Path to SQLite database file (database mode only)
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lifetime of cached companies and relation types
    pub cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("GRADIAN_API_PSK").ok().filter(|k| !k.is_empty());

        let data_dir: PathBuf = env::var("GRADIAN_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let storage_mode = match env::var("GRADIAN_STORAGE_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => StorageMode::File,
        };

        let db_path = env::var("GRADIAN_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gradian.sqlite"));

        let bind_addr = env::var("GRADIAN_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid GRADIAN_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("GRADIAN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let cache_ttl_secs = match env::var("GRADIAN_CACHE_TTL_SECS") {
            Ok(value) => value.parse::<u64>().map_err(|e| {
                AppError::Internal(format!("Invalid GRADIAN_CACHE_TTL_SECS: {}", e))
            })?,
            Err(_) => 60,
        };

        Ok(Self {
            api_psk,
            data_dir,
            storage_mode,
            db_path,
            bind_addr,
            log_level,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("GRADIAN_API_PSK");
        env::remove_var("GRADIAN_DATA_DIR");
        env::remove_var("GRADIAN_STORAGE_MODE");
        env::remove_var("GRADIAN_DB_PATH");
        env::remove_var("GRADIAN_BIND_ADDR");
        env::remove_var("GRADIAN_LOG_LEVEL");
        env::remove_var("GRADIAN_CACHE_TTL_SECS");

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.storage_mode, StorageMode::File);
        assert_eq!(config.db_path, PathBuf::from("./data/gradian.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_storage_mode_parsing() {
        assert_eq!("file".parse::<StorageMode>().unwrap(), StorageMode::File);
        assert_eq!("mock".parse::<StorageMode>().unwrap(), StorageMode::File);
        assert_eq!(
            "Database".parse::<StorageMode>().unwrap(),
            StorageMode::Database
        );
        assert!("redis".parse::<StorageMode>().is_err());
    }
}
