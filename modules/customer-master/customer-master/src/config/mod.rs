//! Adapter configuration: the subsystem tree plus adapter-wide settings.

mod loader;
mod store;

use serde::{Deserialize, Serialize};

pub use loader::{ConfigError, ENV_PREFIX, load, load_from_figment};
pub use store::{
    ConfigStore, ConnectionSettings, CountryConfig, EnvironmentConfig, OAuthSettings,
    SubsystemConfig,
};

/// Subsystems probed by the health check when none are configured.
pub const DEFAULT_HEALTH_SUBSYSTEMS: [&str; 4] = ["product", "profile", "preferences", "eservices"];

/// Top-level adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerMasterConfig {
    /// Country used when a caller does not pass one.
    pub default_country: String,
    /// Environment tier merged into every resolution.
    pub environment: String,
    /// Permit plain `http://` base URLs and token endpoints.
    pub allow_insecure_http: bool,
    pub health: HealthConfig,
    pub webclients: ConfigStore,
}

impl Default for CustomerMasterConfig {
    fn default() -> Self {
        Self {
            default_country: "US".to_owned(),
            environment: "dev".to_owned(),
            allow_insecure_http: false,
            health: HealthConfig::default(),
            webclients: ConfigStore::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Path probed on every subsystem, after alias path mapping.
    pub path: String,
    pub subsystems: Vec<String>,
    /// Body a healthy subsystem must answer with, compared after trimming.
    /// Unset accepts any 2xx.
    pub expected_body: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_owned(),
            subsystems: DEFAULT_HEALTH_SUBSYSTEMS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            expected_body: None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CustomerMasterConfig::default();
        assert_eq!(cfg.default_country, "US");
        assert_eq!(cfg.environment, "dev");
        assert!(!cfg.allow_insecure_http);
        assert_eq!(cfg.health.path, "/health");
        assert!(cfg.health.expected_body.is_none());
        assert_eq!(
            cfg.health.subsystems,
            vec!["product", "profile", "preferences", "eservices"]
        );
        assert!(cfg.webclients.countries.is_empty());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg: CustomerMasterConfig =
            serde_json::from_value(serde_json::json!({"environment": "prod"})).unwrap();
        assert_eq!(cfg.environment, "prod");
        assert_eq!(cfg.default_country, "US");
        assert_eq!(cfg.health.path, "/health");
        assert!(cfg.health.expected_body.is_none());
    }
}
