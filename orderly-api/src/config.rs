//! Service Configuration Module
//!
//! Configuration is loaded from environment variables with defaults that
//! suit local development. Each section reads through a lookup function so
//! tests can supply values without touching the process environment.

use std::net::{IpAddr, SocketAddr};

use crate::db::DbConfig;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// HTTP CONFIGURATION
// ============================================================================

/// HTTP listener and CORS configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to bind, as given. Parsed by [`ApiConfig::bind_addr`].
    pub port: String,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: "8080".to_string(),
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `ORDERLY_API_BIND`: interface (default: 0.0.0.0)
    /// - `PORT`, then `ORDERLY_API_PORT`: port (default: 8080)
    /// - `ORDERLY_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `ORDERLY_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cors_origins = lookup("ORDERLY_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind_host: lookup("ORDERLY_API_BIND").unwrap_or(defaults.bind_host),
            port: lookup("PORT")
                .or_else(|| lookup("ORDERLY_API_PORT"))
                .unwrap_or(defaults.port),
            cors_origins,
            cors_max_age_secs: lookup("ORDERLY_CORS_MAX_AGE_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let port = self
            .port
            .parse::<u16>()
            .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", self.port)))?;

        let host = self
            .bind_host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|e| {
                ApiError::invalid_input(format!("Invalid bind host {}: {}", self.bind_host, e))
            })?;
        Ok(SocketAddr::new(host, port))
    }

    /// Whether CORS is restricted to an allow-list.
    pub fn is_cors_restricted(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

// ============================================================================
// MESSAGE BUS CONFIGURATION
// ============================================================================

/// NATS subscription configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Server URL.
    pub url: String,
    /// Subject carrying order messages.
    pub subject: String,
    /// Optional queue group so several replicas share one stream.
    pub queue_group: Option<String>,
    /// Connection name reported to the server.
    pub client_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            subject: "orders".to_string(),
            queue_group: None,
            client_name: "orderly".to_string(),
        }
    }
}

impl BusConfig {
    /// - `ORDERLY_NATS_URL` (default: nats://localhost:4222)
    /// - `ORDERLY_NATS_SUBJECT` (default: orders)
    /// - `ORDERLY_NATS_QUEUE_GROUP` (default: unset)
    /// - `ORDERLY_NATS_CLIENT_NAME` (default: orderly)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("ORDERLY_NATS_URL").unwrap_or(defaults.url),
            subject: lookup("ORDERLY_NATS_SUBJECT").unwrap_or(defaults.subject),
            queue_group: lookup("ORDERLY_NATS_QUEUE_GROUP").filter(|g| !g.is_empty()),
            client_name: lookup("ORDERLY_NATS_CLIENT_NAME").unwrap_or(defaults.client_name),
        }
    }
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Everything the service binary needs at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub bus: BusConfig,
    pub api: ApiConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db: DbConfig::from_lookup(&lookup),
            bus: BusConfig::from_lookup(&lookup),
            api: ApiConfig::from_lookup(&lookup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.bind_addr().expect("default addr").port(), 8080);
        assert!(!config.is_cors_restricted());
        assert_eq!(config.cors_max_age_secs, 86400);
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("ORDERLY_API_PORT", "9100"),
        ]));
        assert_eq!(config.bind_addr().expect("addr").port(), 9000);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let config = ApiConfig::from_lookup(lookup_from(&[("ORDERLY_API_PORT", "http")]));
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_ipv6_bind_hosts() {
        for host in ["::", "[::1]", "::1"] {
            let config = ApiConfig::from_lookup(lookup_from(&[
                ("ORDERLY_API_BIND", host),
                ("ORDERLY_API_PORT", "8081"),
            ]));
            let addr = config.bind_addr().expect("ipv6 bind host");
            assert!(addr.is_ipv6(), "{} gave {}", host, addr);
            assert_eq!(addr.port(), 8081);
        }

        let config = ApiConfig::from_lookup(lookup_from(&[("ORDERLY_API_BIND", "127.0.0.1")]));
        assert_eq!(
            config.bind_addr().expect("ipv4 bind host"),
            "127.0.0.1:8080".parse::<SocketAddr>().expect("literal")
        );
    }

    #[test]
    fn test_hostname_bind_is_rejected() {
        let config = ApiConfig::from_lookup(lookup_from(&[("ORDERLY_API_BIND", "not a host")]));
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_app_config_reads_every_section() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ORDERLY_DB_HOST", "db.internal"),
            ("ORDERLY_DB_PORT", "6543"),
            ("ORDERLY_DB_INIT_SCHEMA", "1"),
            ("ORDERLY_NATS_URL", "nats://bus:4222"),
            ("PORT", "9000"),
        ]));
        assert_eq!(config.db.host, "db.internal");
        assert_eq!(config.db.port, 6543);
        assert!(config.db.init_schema);
        assert_eq!(config.bus.url, "nats://bus:4222");
        assert_eq!(config.api.port, "9000");
    }

    #[test]
    fn test_cors_origins_are_trimmed() {
        let config = ApiConfig::from_lookup(lookup_from(&[(
            "ORDERLY_CORS_ORIGINS",
            "https://a.example, ,https://b.example ",
        )]));
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.is_cors_restricted());
    }

    #[test]
    fn test_bus_config() {
        let config = BusConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, BusConfig::default());

        let config = BusConfig::from_lookup(lookup_from(&[
            ("ORDERLY_NATS_SUBJECT", "orders.v2"),
            ("ORDERLY_NATS_QUEUE_GROUP", "orderly-workers"),
        ]));
        assert_eq!(config.subject, "orders.v2");
        assert_eq!(config.queue_group.as_deref(), Some("orderly-workers"));
    }
}
