// crates/server/src/config.rs
//! Server configuration with environment fallbacks.

use std::time::Duration;

/// Development-only signing secret. Must be overridden in any real
/// deployment; `main` warns loudly when it is still in use.
pub const DEV_SECRET: &str = "dev-only-change-me";

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47310;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Process-wide token signing secret, read-only after startup.
    pub secret: String,
    pub token_ttl: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_age: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secret: DEV_SECRET.to_string(),
            token_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            sweep_max_age: Duration::from_secs(3600),
        }
    }
}

impl ServerConfig {
    /// Build from the environment: `TASKGATE_PORT` (or `PORT`),
    /// `TASKGATE_SECRET`, `TASKGATE_TOKEN_TTL_S`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("TASKGATE_PORT")
                .ok()
                .or_else(|| std::env::var("PORT").ok())
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            secret: std::env::var("TASKGATE_SECRET").unwrap_or(defaults.secret),
            token_ttl: std::env::var("TASKGATE_TOKEN_TTL_S")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.token_ttl),
            sweep_interval: defaults.sweep_interval,
            sweep_max_age: defaults.sweep_max_age,
        }
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.uses_dev_secret());
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_custom_secret_is_not_dev() {
        let config = ServerConfig {
            secret: "something-else".into(),
            ..ServerConfig::default()
        };
        assert!(!config.uses_dev_secret());
    }
}
