//! API Configuration Module
//!
//! Server cache tuning and HTTP surface settings. Configuration is loaded
//! from environment variables with sensible defaults for development;
//! values that fail to parse fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CACHE_REVALIDATE_SECS, DEFAULT_CACHE_TIMEOUT_MS,
    DEFAULT_CIRCUIT_COOLDOWN_MS, DEFAULT_CIRCUIT_FAILURE_THRESHOLD, DEFAULT_PORT,
};
use crate::server_cache::CircuitBreakerConfig;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

// ============================================================================
// SERVER CACHE CONFIGURATION
// ============================================================================

/// Defaults applied to every cached fetcher unless overridden per fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCacheConfig {
    /// How long a fetch may run before the fallback is served.
    pub timeout: Duration,
    /// How long a cached value is served before a background refresh.
    pub revalidate: Duration,
    /// Consecutive failures before a fetcher's circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit skips the fetcher.
    pub cooldown: Duration,
}

impl Default for ServerCacheConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_CACHE_TIMEOUT_MS),
            revalidate: Duration::from_secs(DEFAULT_CACHE_REVALIDATE_SECS),
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            cooldown: Duration::from_millis(DEFAULT_CIRCUIT_COOLDOWN_MS),
        }
    }
}

impl ServerCacheConfig {
    /// Create ServerCacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `STRIDE_CACHE_TIMEOUT_MS`: Fetch timeout (default: 3000)
    /// - `STRIDE_CACHE_REVALIDATE_SECS`: Revalidation window (default: 3600)
    /// - `STRIDE_CIRCUIT_FAILURE_THRESHOLD`: Failures before opening (default: 5)
    /// - `STRIDE_CIRCUIT_COOLDOWN_MS`: How long the circuit stays open (default: 30000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = env_parse::<u64>("STRIDE_CACHE_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);

        let revalidate = env_parse::<u64>("STRIDE_CACHE_REVALIDATE_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.revalidate);

        let failure_threshold = env_parse::<u32>("STRIDE_CIRCUIT_FAILURE_THRESHOLD")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.failure_threshold);

        let cooldown = env_parse::<u64>("STRIDE_CIRCUIT_COOLDOWN_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.cooldown);

        Self {
            timeout,
            revalidate,
            failure_threshold,
            cooldown,
        }
    }

    pub fn circuit_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse an environment name; unknown names are treated as development.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" => Self::Staging,
            _ => Self::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,
    pub environment: Environment,
    /// JSON file holding the menu payload. `None` serves the built-in fallback only.
    pub menu_source: Option<PathBuf>,
    pub cache: ServerCacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: Environment::Development,
            menu_source: None,
            cache: ServerCacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STRIDE_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `STRIDE_API_PORT`: Listen port (default: 3000)
    /// - `STRIDE_ENVIRONMENT`: development, staging or production (default: development)
    /// - `STRIDE_MENU_SOURCE`: Path to the menu JSON document
    /// - plus everything read by [`ServerCacheConfig::from_env`]
    pub fn from_env() -> Self {
        let bind_host =
            std::env::var("STRIDE_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());

        let port = env_parse::<u16>("PORT")
            .or_else(|| env_parse::<u16>("STRIDE_API_PORT"))
            .unwrap_or(DEFAULT_PORT);

        let environment = std::env::var("STRIDE_ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Environment::Development);

        let menu_source = std::env::var("STRIDE_MENU_SOURCE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            bind_host,
            port,
            environment,
            menu_source,
            cache: ServerCacheConfig::from_env(),
        }
    }

    /// Check if running in production mode (debug endpoints disabled).
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_config() {
        let config = ServerCacheConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(3000));
        assert_eq!(config.revalidate, Duration::from_secs(3600));
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_millis(30_000));
        assert_eq!(config.circuit_config(), CircuitBreakerConfig::default());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Staging);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.environment = Environment::Production;
        assert!(config.is_production());
    }
}
