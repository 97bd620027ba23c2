//! Raw configuration tree for the customer master subsystems.
//!
//! Every tier is partial: a field left out (or set to an empty string)
//! leaves the value of the lower tier in place. Merging happens in
//! [`ConfigResolver`](crate::ConfigResolver); this module is lookup only.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Partial OAuth2 client-credentials settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "redact_secret"
    )]
    pub client_secret: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token lifetime when the endpoint omits `expires_in`.
    ///
    /// Accepts a humantime string (`"55m"`) or integer milliseconds.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "duration_opt"
    )]
    pub token_cache_duration: Option<Duration>,
}

/// Partial connection pool and timeout settings, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSettings {
    #[serde(alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections_per_route: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_acquire_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
}

/// One downstream subsystem within a country.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubsystemConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionSettings>,
    /// Alias name to path suffix inserted between base URL and request path.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subsystem_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountryConfig {
    pub subsystems: BTreeMap<String, SubsystemConfig>,
}

impl CountryConfig {
    /// Find the subsystem serving `name`, returning its canonical name.
    ///
    /// A direct key wins. Otherwise subsystems are scanned in name order and
    /// the first one declaring `name` as an alias is returned.
    #[must_use]
    pub fn find_subsystem(&self, name: &str) -> Option<(&str, &SubsystemConfig)> {
        if let Some((canonical, config)) = self.subsystems.get_key_value(name) {
            return Some((canonical.as_str(), config));
        }
        self.subsystems
            .iter()
            .find(|(_, config)| config.subsystem_mappings.contains_key(name))
            .map(|(canonical, config)| (canonical.as_str(), config))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionSettings>,
}

/// Root of the subsystem configuration tree.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigStore {
    pub default_oauth: OAuthSettings,
    pub default_connection: ConnectionSettings,
    pub environments: BTreeMap<String, EnvironmentConfig>,
    pub countries: BTreeMap<String, CountryConfig>,
}

impl ConfigStore {
    #[must_use]
    pub fn country(&self, country: &str) -> Option<&CountryConfig> {
        self.countries.get(country)
    }

    #[must_use]
    pub fn environment(&self, environment: &str) -> Option<&EnvironmentConfig> {
        self.environments.get(environment)
    }
}

#[allow(clippy::ref_option)]
fn redact_secret<S: Serializer>(secret: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
    match secret {
        Some(value) if !value.expose_secret().is_empty() => s.serialize_str("***"),
        Some(_) => s.serialize_str(""),
        None => s.serialize_none(),
    }
}

/// Optional `Duration` as humantime text, or integer milliseconds on input.
mod duration_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
            Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Raw::Text(text)) => humantime::parse_duration(text.trim())
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid duration '{text}': {e}"))),
        }
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }
}
