//! Vendor account configuration.
//!
//! Credentials and the sandbox/production switch are resolved once at startup
//! from an optional JSON file and the environment, then handed to the SOAP
//! client and the plugin. Nothing here is global.

use std::{env, fmt, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

pub const ENV_USERNAME: &str = "SYMANTEC_USERNAME";
pub const ENV_PASSWORD: &str = "SYMANTEC_PASSWORD";
pub const ENV_PARTNER_CODE: &str = "SYMANTEC_PARTNER_CODE";
pub const ENV_TEST_MODE: &str = "SYMANTEC_TEST_MODE";
pub const ENV_API_VERSION: &str = "SYMANTEC_API_VERSION";
pub const ENV_ORDER_URL: &str = "SYMANTEC_ORDER_URL";
pub const ENV_QUERY_URL: &str = "SYMANTEC_QUERY_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Validated vendor account settings.
#[derive(Clone)]
pub struct PluginConfig {
    pub username: String,
    pub password: Zeroizing<String>,
    pub partner_code: String,
    /// Use the vendor sandbox instead of production. Requires a sandbox account.
    pub test_mode: bool,
    pub api_version: Option<String>,
    pub order_endpoint: Option<String>,
    pub query_endpoint: Option<String>,
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("partner_code", &self.partner_code)
            .field("test_mode", &self.test_mode)
            .field("api_version", &self.api_version)
            .field("order_endpoint", &self.order_endpoint)
            .field("query_endpoint", &self.query_endpoint)
            .finish()
    }
}

/// The test mode flag shows up as a string in most deployments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TestModeValue {
    Flag(bool),
    Text(String),
}

impl TestModeValue {
    fn enabled(&self) -> bool {
        match self {
            TestModeValue::Flag(flag) => *flag,
            TestModeValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Unvalidated settings as they appear in a config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPluginConfig {
    username: Option<String>,
    password: Option<String>,
    partnercode: Option<String>,
    testmode: Option<TestModeValue>,
    api_version: Option<String>,
    order_url: Option<String>,
    query_url: Option<String>,
}

impl RawPluginConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Overlays values from `lookup`, which maps an environment variable name
    /// to its value.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = non_empty(ENV_USERNAME) {
            self.username = Some(value);
        }
        if let Some(value) = non_empty(ENV_PASSWORD) {
            self.password = Some(value);
        }
        if let Some(value) = non_empty(ENV_PARTNER_CODE) {
            self.partnercode = Some(value);
        }
        if let Some(value) = non_empty(ENV_TEST_MODE) {
            self.testmode = Some(TestModeValue::Text(value));
        }
        if let Some(value) = non_empty(ENV_API_VERSION) {
            self.api_version = Some(value);
        }
        if let Some(value) = non_empty(ENV_ORDER_URL) {
            self.order_url = Some(value);
        }
        if let Some(value) = non_empty(ENV_QUERY_URL) {
            self.query_url = Some(value);
        }
        self
    }

    pub fn validate(self) -> Result<PluginConfig, ConfigError> {
        let username = self.username.ok_or(ConfigError::Missing("username"))?;
        let password = self.password.ok_or(ConfigError::Missing("password"))?;
        let partner_code = self.partnercode.ok_or(ConfigError::Missing("partnercode"))?;
        let test_mode = self.testmode.ok_or(ConfigError::Missing("testmode"))?;

        Ok(PluginConfig {
            username,
            password: Zeroizing::new(password),
            partner_code,
            test_mode: test_mode.enabled(),
            api_version: self.api_version,
            order_endpoint: self.order_url,
            query_endpoint: self.query_url,
        })
    }
}

impl PluginConfig {
    /// Loads the optional JSON file, applies environment overrides and
    /// validates that every required value is present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => RawPluginConfig::from_json_file(path)?,
            None => RawPluginConfig::default(),
        };
        raw.overlay(|key| env::var(key).ok()).validate()
    }
}
