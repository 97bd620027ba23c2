//! Request and report models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-subsystem health, keyed by subsystem name.
pub type HealthReport = BTreeMap<String, bool>;

/// HTTP verbs supported against customer master subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call against a subsystem.
///
/// `country` and `environment` fall back to the adapter defaults when unset.
/// `path` is appended to the subsystem base URL after any alias path mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMasterRequest {
    pub method: HttpMethod,
    pub subsystem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl CustomerMasterRequest {
    #[must_use]
    pub fn new(method: HttpMethod, subsystem: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            subsystem: subsystem.into(),
            country: None,
            environment: None,
            path: path.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(subsystem: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, subsystem, path)
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}
