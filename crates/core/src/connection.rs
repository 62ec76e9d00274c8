//! External connection settings.
//!
//! Tests normally run against a private in-memory store. Setting a URL
//! points the harness at a named store instead, which is useful when you
//! want to look at the data a test actually wrote.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Tenant used when none is given.
pub const DEFAULT_TENANT: &str = "UnitTests";

/// Environment variable holding the store URL.
pub const URL_ENV_VAR: &str = "SEEDBED_URL";

/// Environment variable holding the tenant name.
pub const TENANT_ENV_VAR: &str = "SEEDBED_TENANT";

/// Endpoint and tenant of an existing document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionSettings {
    url: String,
    tenant: String,
}

impl ConnectionSettings {
    /// Create settings; a blank tenant falls back to [`DEFAULT_TENANT`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if `url` is blank.
    pub fn new(url: impl Into<String>, tenant: Option<&str>) -> StoreResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(StoreError::invalid_settings("document store url must not be blank"));
        }
        let tenant = match tenant {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => DEFAULT_TENANT.to_string(),
        };
        Ok(Self {
            url: url.trim().to_string(),
            tenant,
        })
    }

    /// Build settings from optional raw values.
    ///
    /// Returns `Ok(None)` when neither value is given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if `url` is blank, or if a tenant is given
    /// without a url.
    pub fn from_vars(url: Option<String>, tenant: Option<String>) -> StoreResult<Option<Self>> {
        match (url, tenant) {
            (Some(url), tenant) => Self::new(url, tenant.as_deref()).map(Some),
            (None, Some(tenant)) => Err(StoreError::invalid_settings(format!(
                "tenant '{}' given without a document store url",
                tenant
            ))),
            (None, None) => Ok(None),
        }
    }

    /// Store URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Tenant name.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}
