//! Embedded in-memory document store for seedbed.
//!
//! This crate provides the in-process backend the harness uses when no
//! connection settings are given:
//! - MemoryStore: a connection implementing `DocumentStore`
//! - MemorySession: buffered unit-of-work sessions
//! - MemoryConnector: the default `StoreConnector`
//! - Background indexing: map and map/reduce indexes rebuilt after each commit
//!
//! Connections made with connection settings attach to a process-wide
//! server keyed by URL, so data survives across connections within a process.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod database;
mod registry;
mod session;
mod store;

pub use database::{IDENTITY_COLLECTION, IDENTITY_PREFIX};
pub use registry::forget_server;
pub use session::MemorySession;
pub use store::{MemoryConnector, MemoryStore};
