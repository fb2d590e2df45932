// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Lingora server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Root directory for the filesystem artifact store
    pub artifact_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `LINGORA_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `LINGORA_HTTP_PORT`: HTTP server port (default: 8080)
    /// - `LINGORA_ARTIFACT_DIR`: artifact store root (default: .data/artifacts)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("LINGORA_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("LINGORA_DATABASE_URL"))?;

        let http_port: u16 = std::env::var("LINGORA_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("LINGORA_HTTP_PORT", "must be a valid port number")
            })?;

        let artifact_dir = std::env::var("LINGORA_ARTIFACT_DIR")
            .unwrap_or_else(|_| ".data/artifacts".to_string());

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            artifact_dir: PathBuf::from(artifact_dir),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("LINGORA_DATABASE_URL", "sqlite:.data/test.db");
        guard.remove("LINGORA_HTTP_PORT");
        guard.remove("LINGORA_ARTIFACT_DIR");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.database_url, "sqlite:.data/test.db");
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.artifact_dir, PathBuf::from(".data/artifacts"));
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.remove("LINGORA_DATABASE_URL");

        let err = Config::from_env().expect_err("Config should fail");
        assert!(matches!(err, ConfigError::Missing("LINGORA_DATABASE_URL")));
    }

    #[test]
    fn test_config_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("LINGORA_DATABASE_URL", "sqlite::memory:");
        guard.set("LINGORA_HTTP_PORT", "not-a-port");

        let err = Config::from_env().expect_err("Config should fail");
        assert!(matches!(err, ConfigError::Invalid("LINGORA_HTTP_PORT", _)));
    }
}
