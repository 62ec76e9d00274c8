//! Core types and traits for seedbed.
//!
//! This crate defines the document store interface the harness is written
//! against:
//! - DocumentStore / DocumentSession / StoreConnector: the store capability
//! - Document / Entity: untyped and typed documents
//! - IndexDefinition / TransformerDefinition / DefinitionCatalog: buildable definitions
//! - Query / QueryListener: queries and global query hooks
//! - DatabaseStatistics / ServerError: what the store reports back
//! - ConnectionSettings: optional endpoint + tenant of an existing store
//! - StoreError: error type for all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod definition;
pub mod document;
pub mod error;
pub mod query;
pub mod stats;
pub mod traits;

pub use connection::{ConnectionSettings, DEFAULT_TENANT, TENANT_ENV_VAR, URL_ENV_VAR};
pub use definition::{
    Definition, DefinitionCatalog, FnIndex, FnTransformer, IndexDefinition, TransformerDefinition,
};
pub use document::{Document, Entity, SessionExt};
pub use error::{StoreError, StoreResult};
pub use query::{
    Query, QueryCustomization, QueryHit, QueryListener, QueryResult, QueryTarget,
    DEFAULT_NON_STALE_TIMEOUT,
};
pub use stats::{DatabaseStatistics, ServerError};
pub use traits::{DocumentSession, DocumentStore, StoreConnector};
