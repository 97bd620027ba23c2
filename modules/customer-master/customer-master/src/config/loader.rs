use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use thiserror::Error;

use super::{ConnectionSettings, CustomerMasterConfig};

/// Prefix of environment variable overrides, e.g.
/// `CMA__WEBCLIENTS__DEFAULT_CONNECTION__READ_TIMEOUT_MS=5000`.
pub const ENV_PREFIX: &str = "CMA__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load the adapter configuration.
///
/// Layers, lowest to highest: built-in defaults, the optional YAML file,
/// then `CMA__*` environment variables (`__` separates nesting levels).
/// The result is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError` if the file is missing, a layer fails to parse,
/// or validation fails.
pub fn load(path: Option<&Path>) -> Result<CustomerMasterConfig, ConfigError> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        figment = figment.merge(Yaml::file(path));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
    load_from_figment(&figment)
}

/// Extract and validate the configuration from an assembled figment.
///
/// # Errors
///
/// Returns `ConfigError` if extraction or validation fails.
pub fn load_from_figment(figment: &Figment) -> Result<CustomerMasterConfig, ConfigError> {
    let config: CustomerMasterConfig = figment.extract().map_err(Box::new)?;
    validate(&config)?;
    tracing::debug!(
        countries = config.webclients.countries.len(),
        environment = %config.environment,
        "Configuration loaded"
    );
    Ok(config)
}

fn validate(config: &CustomerMasterConfig) -> Result<(), ConfigError> {
    if config.default_country.trim().is_empty() {
        return Err(ConfigError::Invalid("default_country must not be empty".to_owned()));
    }

    let store = &config.webclients;
    for (country, country_config) in &store.countries {
        for (name, subsystem) in &country_config.subsystems {
            check_url(&format!("countries.{country}.subsystems.{name}.base_url"), &subsystem.base_url)?;
            if let Some(uri) = subsystem.oauth.as_ref().and_then(|o| o.token_uri.as_deref()) {
                check_optional_url(&format!("countries.{country}.subsystems.{name}.oauth.token_uri"), uri)?;
            }
            if let Some(connection) = &subsystem.connection {
                check_connection(&format!("countries.{country}.subsystems.{name}.connection"), connection)?;
            }
            for alias in subsystem.subsystem_mappings.keys() {
                if alias != name && country_config.subsystems.contains_key(alias) {
                    tracing::warn!(
                        country = %country,
                        subsystem = %name,
                        alias = %alias,
                        "Alias shadowed by a subsystem of the same name"
                    );
                }
            }
        }
    }

    if let Some(uri) = store.default_oauth.token_uri.as_deref() {
        check_optional_url("default_oauth.token_uri", uri)?;
    }
    for (env, env_config) in &store.environments {
        if let Some(uri) = env_config.oauth.as_ref().and_then(|o| o.token_uri.as_deref()) {
            check_optional_url(&format!("environments.{env}.oauth.token_uri"), uri)?;
        }
        if let Some(connection) = &env_config.connection {
            check_connection(&format!("environments.{env}.connection"), connection)?;
        }
    }
    check_connection("default_connection", &store.default_connection)?;
    Ok(())
}

fn check_connection(field: &str, connection: &ConnectionSettings) -> Result<(), ConfigError> {
    if connection.max_connections == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "{field}.max_connections must be at least 1"
        )));
    }
    Ok(())
}

fn check_optional_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    check_url(field, value)
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{field}: '{value}' is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{field}: unsupported scheme '{other}'"
        ))),
    }
}
