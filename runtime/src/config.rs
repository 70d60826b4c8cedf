//! Runtime configuration.
//!
//! Configuration starts from a JSON document of defaults and is overlaid
//! with environment variables named `EXPLORER_<FIELD>` (for example
//! `EXPLORER_PAGE_SIZE=25`). Each variable value is parsed as JSON first and
//! used as a plain string if that fails, so `EXPLORER_NODE_URL=http://...`
//! and `EXPLORER_CACHE_COMPLETED_DATASETS=true` both work.
//!
//! # Example
//!
//! ```
//! use explorer_state_runtime::StateConfig;
//!
//! let config = StateConfig::from_json(r#"{ "node_url": "http://localhost:3000" }"#)
//!     .unwrap()
//!     .with_env_overrides([("EXPLORER_PAGE_SIZE".to_string(), "25".to_string())])
//!     .unwrap();
//!
//! assert_eq!(config.page_size, 25);
//! assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost:3000/ws");
//! ```

use crate::dataset::DataSetConfig;
use explorer_state_core::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Prefix of the environment variables overriding configuration fields.
pub const ENV_PREFIX: &str = "EXPLORER_";

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A URL field does not hold a usable URL
    #[error("Invalid URL in '{field}': {reason}")]
    InvalidUrl {
        /// Field name
        field: &'static str,
        /// Why the URL was rejected
        reason: String,
    },

    /// The document (after overrides) does not match the configuration shape
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::StateError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

/// Configuration shared by the store modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// REST URL of the node
    pub node_url: Url,

    /// Streaming endpoint; derived from `node_url` when absent
    #[serde(default)]
    pub ws_endpoint: Option<Url>,

    /// Page size of top-level lists (block timeline, namespace list)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Page size of lists inside a detail view (block transactions, receipts)
    #[serde(default = "default_page_size")]
    pub detail_page_size: u32,

    /// Skip refetching a DataSet key that is already loaded
    #[serde(default)]
    pub cache_completed_datasets: bool,
}

const fn default_page_size() -> u32 {
    10
}

impl StateConfig {
    /// Configuration for `node_url` with every other field at its default.
    #[must_use]
    pub const fn new(node_url: Url) -> Self {
        Self {
            node_url,
            ws_endpoint: None,
            page_size: default_page_size(),
            detail_page_size: default_page_size(),
            cache_completed_datasets: false,
        }
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or a wrong shape,
    /// and the validation errors of [`StateConfig::validate`].
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `EXPLORER_<FIELD>` variables from `vars`. Other variables are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if an override has the wrong type, and
    /// the validation errors of [`StateConfig::validate`].
    pub fn with_env_overrides<I>(self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut document = match serde_json::to_value(&self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(ConfigError::Parse(e.to_string())),
        };

        for (name, raw) in vars {
            let Some(field) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw));
            tracing::debug!(%field, "Configuration override from environment");
            document.insert(field, value);
        }

        let config: Self = serde_json::from_value(Value::Object(document))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `defaults` and overlay the process environment.
    ///
    /// # Errors
    ///
    /// See [`StateConfig::from_json`] and [`StateConfig::with_env_overrides`].
    pub fn from_env(defaults: &str) -> Result<Self, ConfigError> {
        Self::from_json(defaults)?.with_env_overrides(std::env::vars())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero page size and
    /// [`ConfigError::InvalidUrl`] for a non-http(s) node URL or a
    /// non-ws(s) streaming endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be at least 1".to_string()));
        }
        if self.detail_page_size == 0 {
            return Err(ConfigError::Validation(
                "detail_page_size must be at least 1".to_string(),
            ));
        }
        if !matches!(self.node_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                field: "node_url",
                reason: format!("expected http or https, got '{}'", self.node_url.scheme()),
            });
        }
        if let Some(ws) = &self.ws_endpoint {
            Endpoint::new(ws.clone()).map_err(|e| ConfigError::InvalidUrl {
                field: "ws_endpoint",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// The streaming endpoint: `ws_endpoint` if set, else derived from `node_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if no usable endpoint results.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let endpoint = match &self.ws_endpoint {
            Some(ws) => Endpoint::new(ws.clone()),
            None => Endpoint::from_node_url(&self.node_url),
        };
        endpoint.map_err(|e| ConfigError::InvalidUrl {
            field: "ws_endpoint",
            reason: e.to_string(),
        })
    }

    /// DataSet settings implied by this configuration.
    #[must_use]
    pub const fn dataset(&self) -> DataSetConfig {
        DataSetConfig {
            cache_completed: self.cache_completed_datasets,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEFAULTS: &str = r#"{ "node_url": "https://node.example.org:3001" }"#;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = StateConfig::from_json(DEFAULTS).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.detail_page_size, 10);
        assert!(!config.cache_completed_datasets);
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://node.example.org:3001/ws"
        );
    }

    #[test]
    fn env_overrides_parse_json_then_fall_back_to_strings() {
        let config = StateConfig::from_json(DEFAULTS)
            .unwrap()
            .with_env_overrides(vars(&[
                ("EXPLORER_PAGE_SIZE", "25"),
                ("EXPLORER_CACHE_COMPLETED_DATASETS", "true"),
                ("EXPLORER_NODE_URL", "http://localhost:3000"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(config.page_size, 25);
        assert!(config.cache_completed_datasets);
        assert!(config.dataset().cache_completed);
        assert_eq!(config.node_url.as_str(), "http://localhost:3000/");
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost:3000/ws");
    }

    #[test]
    fn explicit_ws_endpoint_wins() {
        let config = StateConfig::from_json(DEFAULTS)
            .unwrap()
            .with_env_overrides(vars(&[("EXPLORER_WS_ENDPOINT", "wss://push.example.org/ws")]))
            .unwrap();
        assert_eq!(config.endpoint().unwrap().as_str(), "wss://push.example.org/ws");
    }

    #[test]
    fn rejects_zero_page_size() {
        let result = StateConfig::from_json(DEFAULTS)
            .unwrap()
            .with_env_overrides(vars(&[("EXPLORER_DETAIL_PAGE_SIZE", "0")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_non_http_node_url() {
        let result = StateConfig::from_json(r#"{ "node_url": "ftp://node.example.org" }"#);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidUrl { field: "node_url", .. })
        ));
    }

    #[test]
    fn rejects_wrongly_typed_override() {
        let result = StateConfig::from_json(DEFAULTS)
            .unwrap()
            .with_env_overrides(vars(&[("EXPLORER_PAGE_SIZE", "many")]));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        assert!(matches!(
            StateConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
