// ABOUTME: Configuration loading for the wikisync server.
// ABOUTME: Reads the database path and bind address from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WIKISYNC_BIND is not a valid socket address: {0}")]
    InvalidBind(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WikisyncConfig {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
}

impl WikisyncConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - WIKISYNC_DB: SQLite database file (default: ~/.wikisync/wiki.db)
    /// - WIKISYNC_BIND: socket address to bind (default: 127.0.0.1:8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("WIKISYNC_DB")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".wikisync")
                    .join("wiki.db")
            });

        let bind_str =
            std::env::var("WIKISYNC_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        Ok(Self { db_path, bind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize tests that read/write env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn config_loads_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-only code, env access serialized by ENV_MUTEX
        unsafe {
            std::env::remove_var("WIKISYNC_DB");
            std::env::remove_var("WIKISYNC_BIND");
        }

        let config = WikisyncConfig::from_env().unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(config.db_path.ends_with(".wikisync/wiki.db"));
    }

    #[test]
    fn config_reads_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-only code, env access serialized by ENV_MUTEX
        unsafe {
            std::env::set_var("WIKISYNC_DB", "/var/lib/wikisync/pages.db");
            std::env::set_var("WIKISYNC_BIND", "0.0.0.0:9000");
        }

        let result = WikisyncConfig::from_env();

        // SAFETY: test-only code, env access serialized by ENV_MUTEX
        unsafe {
            std::env::remove_var("WIKISYNC_DB");
            std::env::remove_var("WIKISYNC_BIND");
        }

        let config = result.unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/wikisync/pages.db"));
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn config_rejects_bad_bind() {
        let _guard = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-only code, env access serialized by ENV_MUTEX
        unsafe {
            std::env::set_var("WIKISYNC_BIND", "not-an-address");
        }

        let result = WikisyncConfig::from_env();

        // SAFETY: test-only code, env access serialized by ENV_MUTEX
        unsafe {
            std::env::remove_var("WIKISYNC_BIND");
        }

        let err = result.unwrap_err();
        assert!(err.to_string().contains("WIKISYNC_BIND"), "{}", err);
    }
}
