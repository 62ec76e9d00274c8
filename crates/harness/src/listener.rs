//! Query listener forcing non-stale results.
//!
//! Registered on the store when the harness runs with
//! [`ConsistencyPolicy::WaitForNonStaleResults`](crate::ConsistencyPolicy).
//! Not meant for production stores: every query blocks on indexing.

use std::time::Duration;

use seedbed_core::{QueryCustomization, QueryListener};

/// Makes every query wait for non-stale results.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStaleQueriesListener {
    timeout: Option<Duration>,
}

impl NoStaleQueriesListener {
    /// Listener with an explicit bound on the wait.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl QueryListener for NoStaleQueriesListener {
    fn before_query(&self, customization: &mut QueryCustomization) {
        customization.wait_for_non_stale_results();
        if let Some(timeout) = self.timeout {
            customization.with_timeout(timeout);
        }
    }
}
