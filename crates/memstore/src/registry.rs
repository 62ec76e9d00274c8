//! Process-wide registry of named in-memory servers.
//!
//! Connecting twice to the same URL yields the same server, so a test that
//! connects with [`ConnectionSettings`](seedbed_core::ConnectionSettings)
//! sees whatever an earlier connection in the same process left behind.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use seedbed_core::StoreResult;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::Database;

// =============================================================================
// Global Server Registry
// =============================================================================
//
// Servers are held strongly: a named server outlives the connections that
// use it, the way a real server outlives its clients. `forget_server`
// removes one; its tenant databases shut down once the last connection
// drops.

static SERVERS: Lazy<Mutex<HashMap<String, Arc<MemoryServer>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// A set of tenant databases sharing one address.
pub(crate) struct MemoryServer {
    url: Option<String>,
    databases: Mutex<HashMap<String, Arc<Database>>>,
}

impl MemoryServer {
    /// Server owned by a single store.
    pub(crate) fn private() -> Arc<Self> {
        Arc::new(Self {
            url: None,
            databases: Mutex::new(HashMap::new()),
        })
    }

    /// Shared server for `url`, created on first use.
    pub(crate) fn shared(url: &str) -> Arc<Self> {
        let mut servers = SERVERS.lock();
        Arc::clone(servers.entry(url.to_string()).or_insert_with(|| {
            Arc::new(Self {
                url: Some(url.to_string()),
                databases: Mutex::new(HashMap::new()),
            })
        }))
    }

    pub(crate) fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Database for `tenant`, created (and its indexer started) on first use.
    pub(crate) fn database(&self, tenant: &str) -> StoreResult<Arc<Database>> {
        let mut databases = self.databases.lock();
        if let Some(db) = databases.get(tenant) {
            return Ok(Arc::clone(db));
        }
        let db = Database::open(tenant)?;
        databases.insert(tenant.to_string(), Arc::clone(&db));
        Ok(db)
    }
}

/// Drop the shared server registered for `url`.
///
/// Returns whether a server was registered. Existing connections keep
/// working; the next connection to `url` starts from an empty server.
pub fn forget_server(url: &str) -> bool {
    SERVERS.lock().remove(url).is_some()
}
