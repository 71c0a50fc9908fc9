//! Environment descriptor.
//!
//! # Design
//! An application usually talks to several deployments of the same API
//! (staging, production). Endpoints take their base URL from a
//! `NetworkEnvironment` instead of hard-coding it. `EnvironmentConfig` is the
//! plain-data implementation, loadable from JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::endpoint::with_scheme;
use crate::error::{Error, Result};

pub trait NetworkEnvironment {
    /// API host, with or without a scheme.
    fn api_base_url(&self) -> &str;

    fn api_client_token(&self) -> Option<&str>;

    fn api_client_secret(&self) -> Option<&str>;

    fn name(&self) -> &str;

    fn debug(&self) -> bool;

    /// Website host, with or without a scheme.
    fn base_url(&self) -> &str;

    fn is_https(&self) -> bool {
        true
    }

    fn api_absolute_url(&self) -> String {
        with_scheme(self.api_base_url(), self.is_https())
    }

    fn absolute_url(&self) -> String {
        with_scheme(self.base_url(), self.is_https())
    }

    fn description(&self) -> String {
        format!("Environment: {}", self.name())
    }
}

fn default_https() -> bool {
    true
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub api_base_url: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_https")]
    pub is_https: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub api_client_token: Option<String>,
    #[serde(default)]
    pub api_client_secret: Option<String>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_base_url: api_base_url.into(),
            base_url: String::new(),
            is_https: true,
            debug: false,
            api_client_token: None,
            api_client_secret: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}

impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("EnvironmentConfig")
            .field("name", &self.name)
            .field("api_base_url", &self.api_base_url)
            .field("base_url", &self.base_url)
            .field("is_https", &self.is_https)
            .field("debug", &self.debug)
            .field("api_client_token", &redact(&self.api_client_token))
            .field("api_client_secret", &redact(&self.api_client_secret))
            .finish()
    }
}

impl NetworkEnvironment for EnvironmentConfig {
    fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn api_client_token(&self) -> Option<&str> {
        self.api_client_token.as_deref()
    }

    fn api_client_secret(&self) -> Option<&str> {
        self.api_client_secret.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn debug(&self) -> bool {
        self.debug
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_https(&self) -> bool {
        self.is_https
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_added_when_missing() {
        let mut env = EnvironmentConfig::new("staging", "api.staging.test");
        env.base_url = "staging.test".to_string();
        assert_eq!(env.api_absolute_url(), "https://api.staging.test");
        assert_eq!(env.absolute_url(), "https://staging.test");

        env.is_https = false;
        assert_eq!(env.api_absolute_url(), "http://api.staging.test");
    }

    #[test]
    fn existing_scheme_is_kept() {
        let env = EnvironmentConfig::new("local", "http://127.0.0.1:3000");
        assert_eq!(env.api_absolute_url(), "http://127.0.0.1:3000");
    }

    #[test]
    fn description_names_environment() {
        assert_eq!(
            EnvironmentConfig::new("production", "api.test").description(),
            "Environment: production"
        );
    }

    #[test]
    fn from_json_applies_defaults() {
        let raw = r#"{"name":"dev","api_base_url":"api.dev.test"}"#;
        let env = EnvironmentConfig::from_json(raw).unwrap();
        assert!(env.is_https);
        assert!(!env.debug);
        assert!(env.api_client_token().is_none());
        assert_eq!(env.base_url(), "");
    }

    #[test]
    fn from_json_rejects_invalid_input() {
        let err = EnvironmentConfig::from_json(r#"{"name":"dev"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(matches!(EnvironmentConfig::from_json("not json"), Err(Error::Config(_))));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut env = EnvironmentConfig::new("prod", "api.test");
        env.api_client_token = Some("tok-123".to_string());
        env.api_client_secret = Some("s3cret".to_string());
        let rendered = format!("{env:?}");
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
