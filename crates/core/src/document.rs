//! Documents and entities.
//!
//! A [`Document`] is the untyped unit the store keeps: an identifier, the
//! collection it belongs to, and a JSON body. [`Entity`] lets typed Rust
//! structs name their collection so sessions can store and load them
//! without the caller spelling out collection names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::traits::DocumentSession;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, `"{collection}/{n}"` for store-assigned identities.
    pub id: String,
    /// Collection name.
    pub collection: String,
    /// JSON body.
    pub body: Value,
}

impl Document {
    /// Create a document.
    pub fn new(id: impl Into<String>, collection: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            body,
        }
    }

    /// Deserialize the body into a typed entity.
    pub fn to_entity<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// A typed document that knows which collection it lives in.
///
/// # Example
///
/// ```
/// use seedbed_core::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// impl Entity for User {
///     const COLLECTION: &'static str = "Users";
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned {
    /// Collection name, also the prefix of store-assigned identifiers.
    const COLLECTION: &'static str;
}

/// Typed convenience methods over any [`DocumentSession`].
pub trait SessionExt: DocumentSession {
    /// Serialize and store an entity, returning its assigned identifier.
    fn store_entity<T: Entity>(&self, entity: &T) -> StoreResult<String> {
        let body = serde_json::to_value(entity)?;
        self.store(T::COLLECTION, body)
    }

    /// Load an entity by identifier.
    fn load_entity<T: Entity>(&self, id: &str) -> StoreResult<Option<T>> {
        match self.load(id)? {
            Some(document) => document.to_entity().map(Some),
            None => Ok(None),
        }
    }

    /// All committed entities of a collection, in commit order, paired with their identifiers.
    fn query_entities<T: Entity>(&self) -> StoreResult<Vec<(String, T)>> {
        let result = self.query(&crate::query::Query::collection(T::COLLECTION))?;
        result
            .hits
            .into_iter()
            .map(|hit| {
                let entity = serde_json::from_value(hit.body)?;
                Ok((hit.id.unwrap_or_default(), entity))
            })
            .collect()
    }
}

impl<S: DocumentSession + ?Sized> SessionExt for S {}
