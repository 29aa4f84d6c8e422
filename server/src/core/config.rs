use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_HOST, DEFAULT_PORT, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS, POSTGRES_DEFAULT_MAX_CONNECTIONS,
    POSTGRES_DEFAULT_MAX_LIFETIME_SECS, POSTGRES_DEFAULT_MIN_CONNECTIONS,
    POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// PostgreSQL pool configuration
///
/// Zero values fall back to the defaults in `core::constants` at pool
/// creation time, so a partial config file stays valid.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostgresConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default)]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub max_lifetime_secs: u64,
    #[serde(default)]
    pub statement_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn max_connections(&self) -> u32 {
        or_default(self.max_connections, POSTGRES_DEFAULT_MAX_CONNECTIONS)
    }

    pub fn min_connections(&self) -> u32 {
        or_default(self.min_connections, POSTGRES_DEFAULT_MIN_CONNECTIONS)
    }

    pub fn acquire_timeout_secs(&self) -> u64 {
        or_default(
            self.acquire_timeout_secs,
            POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        or_default(self.idle_timeout_secs, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn max_lifetime_secs(&self) -> u64 {
        or_default(self.max_lifetime_secs, POSTGRES_DEFAULT_MAX_LIFETIME_SECS)
    }

    pub fn statement_timeout_secs(&self) -> u64 {
        if self.statement_timeout_secs > 0 {
            self.statement_timeout_secs
        } else {
            POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS
        }
    }
}

fn or_default<T: PartialEq + Default + Copy>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

/// Application configuration
///
/// Loaded from an optional JSON config file, then overridden by CLI
/// arguments (which themselves pick up environment variables via clap).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration, applying CLI overrides on top of the file values
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(url) = &cli.postgres_url {
            config.postgres.url = url.clone();
        }
        if cli.debug {
            config.debug = true;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_server_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(!config.debug);
    }

    #[test]
    fn postgres_config_zero_values_fall_back() {
        let pg = PostgresConfig::default();
        assert_eq!(pg.max_connections(), POSTGRES_DEFAULT_MAX_CONNECTIONS);
        assert_eq!(pg.min_connections(), POSTGRES_DEFAULT_MIN_CONNECTIONS);
        assert_eq!(
            pg.acquire_timeout_secs(),
            POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS
        );
    }

    #[test]
    fn postgres_config_explicit_values_win() {
        let pg = PostgresConfig {
            max_connections: 50,
            ..Default::default()
        };
        assert_eq!(pg.max_connections(), 50);
    }

    #[test]
    fn cli_overrides_apply() {
        let cli = CliConfig {
            host: Some("0.0.0.0".into()),
            port: Some(9000),
            postgres_url: Some("postgres://localhost/comanda".into()),
            debug: true,
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.postgres.url, "postgres://localhost/comanda");
        assert!(config.debug);
    }
}
