//! Harness settings via `seedbed.toml`.
//!
//! Tests that want to point at an existing store, or change the
//! consistency defaults, can drop a `seedbed.toml` next to them instead of
//! calling setters. Connection values may also come from the
//! `SEEDBED_URL` / `SEEDBED_TENANT` environment variables.

use std::path::Path;
use std::time::Duration;

use seedbed_core::ConnectionSettings;
use serde::{Deserialize, Serialize};

use crate::config::{ConsistencyPolicy, HarnessConfig, DEFAULT_STALE_INDEX_TIMEOUT};
use crate::error::{HarnessError, HarnessResult};

/// Settings file name.
pub const SETTINGS_FILE_NAME: &str = "seedbed.toml";

/// Settings loaded from `seedbed.toml`.
///
/// # Example
///
/// ```toml
/// # Consistency: "wait" (default) or "allow"
/// consistency = "wait"
/// server_errors_as_warnings = false
/// stale_index_timeout_ms = 30000
///
/// # url = "mem://debug"
/// # tenant = "UnitTests"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessSettings {
    /// Existing store URL; absent means a private in-memory store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Tenant name; defaults to `UnitTests`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Consistency policy: `"wait"` or `"allow"`.
    #[serde(default = "default_consistency_str")]
    pub consistency: String,
    /// Report server errors as warnings instead of failing.
    #[serde(default)]
    pub server_errors_as_warnings: bool,
    /// Bound on the post-seed stale-index wait.
    #[serde(default = "default_stale_index_timeout_ms")]
    pub stale_index_timeout_ms: u64,
}

fn default_consistency_str() -> String {
    "wait".to_string()
}

fn default_stale_index_timeout_ms() -> u64 {
    DEFAULT_STALE_INDEX_TIMEOUT.as_millis() as u64
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            url: None,
            tenant: None,
            consistency: default_consistency_str(),
            server_errors_as_warnings: false,
            stale_index_timeout_ms: default_stale_index_timeout_ms(),
        }
    }
}

impl HarnessSettings {
    /// Parse the consistency string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"wait"` or `"allow"`.
    pub fn consistency_policy(&self) -> HarnessResult<ConsistencyPolicy> {
        match self.consistency.as_str() {
            "wait" => Ok(ConsistencyPolicy::WaitForNonStaleResults),
            "allow" => Ok(ConsistencyPolicy::AllowStaleResults),
            other => Err(HarnessError::invalid_settings(format!(
                "Invalid consistency '{}' in {}. Expected \"wait\" or \"allow\".",
                other, SETTINGS_FILE_NAME
            ))),
        }
    }

    /// Connection settings, if a URL is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is blank, or if `tenant` is set without a
    /// `url`.
    pub fn connection_settings(&self) -> HarnessResult<Option<ConnectionSettings>> {
        ConnectionSettings::from_vars(self.url.clone(), self.tenant.clone())
            .map_err(|e| HarnessError::invalid_settings(e.to_string()))
    }

    /// Fill `url`/`tenant` from the environment when the file left them unset.
    pub fn with_env_overrides(mut self) -> Self {
        if self.url.is_none() {
            self.url = std::env::var(seedbed_core::URL_ENV_VAR).ok();
        }
        if self.tenant.is_none() {
            self.tenant = std::env::var(seedbed_core::TENANT_ENV_VAR).ok();
        }
        self
    }

    /// Copy these settings into a harness configuration.
    pub fn apply_to(&self, config: &mut HarnessConfig) -> HarnessResult<()> {
        config.connection = self.connection_settings()?;
        config.consistency = self.consistency_policy()?;
        config.server_errors_as_warnings = self.server_errors_as_warnings;
        config.stale_index_timeout = Duration::from_millis(self.stale_index_timeout_ms);
        Ok(())
    }

    /// Returns the default settings file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# seedbed harness settings
#
# Consistency: "wait" (default) or "allow"
#   "wait"  = every query blocks until indexes have caught up
#   "allow" = queries may return stale index results
consistency = "wait"

# Report server-side indexing errors as warnings instead of failing (default: false)
server_errors_as_warnings = false

# How long to wait for indexes after seeding, in milliseconds
stale_index_timeout_ms = 30000

# Point the harness at a named store instead of a private in-memory one.
# url = "mem://debug"
# tenant = "UnitTests"
"#
    }

    /// Read and parse settings from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::invalid_settings(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let settings: HarnessSettings = toml::from_str(&content).map_err(|e| {
            HarnessError::invalid_settings(format!(
                "Failed to parse settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate eagerly
        settings.consistency_policy()?;
        settings.connection_settings()?;
        Ok(settings)
    }

    /// Write the default settings file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> HarnessResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                HarnessError::invalid_settings(format!(
                    "Failed to write default settings file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
