//! Authentication configuration

use std::time::Duration;

use skillspring_common::Config;

/// Token-validation configuration for the HTTP edge
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            issuer: None,
            audience: Some("authenticated".to_string()),
        }
    }
}

/// Protocol timing knobs.
///
/// The two timeouts are deliberately independent: the ceiling bounds how
/// long the loading state may last, the resolve timeout bounds a single
/// authoritative query. Neither is required to be shorter than the other;
/// a query that outlives the ceiling may still land later.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolConfig {
    /// Bound on one authoritative role query
    pub resolve_timeout: Duration,
    /// Hard ceiling on the overall loading state
    pub bootstrap_ceiling: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(15),
            bootstrap_ceiling: Duration::from_secs(8),
        }
    }
}

impl ProtocolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resolve_timeout: Duration::from_secs(config.resolve_timeout_secs),
            bootstrap_ceiling: Duration::from_secs(config.bootstrap_ceiling_secs),
        }
    }
}
