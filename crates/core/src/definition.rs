//! Index and transformer definitions.
//!
//! Definitions are plain trait objects supplied by the caller. Instead of
//! discovering them reflectively, callers register them in a
//! [`DefinitionCatalog`] under a module name; the harness then resolves
//! descriptors (definition names) or whole modules against the catalog.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::Document;

/// A map (optionally map/reduce) index over one collection.
///
/// `map` and `reduce` return `Err(message)` for per-document failures; the
/// store records these as server errors rather than failing the caller.
pub trait IndexDefinition: Send + Sync {
    /// Unique index name.
    fn name(&self) -> &str;

    /// Collection the index maps over.
    fn collection(&self) -> &str;

    /// Project one document into zero or more index entries.
    fn map(&self, document: &Document) -> Result<Vec<Value>, String>;

    /// Whether `reduce` should run over the mapped entries.
    fn is_map_reduce(&self) -> bool {
        false
    }

    /// Fold all mapped entries into the final result set.
    fn reduce(&self, mapped: Vec<Value>) -> Result<Vec<Value>, String> {
        Ok(mapped)
    }
}

/// A result transformer applied to query hits.
pub trait TransformerDefinition: Send + Sync {
    /// Unique transformer name.
    fn name(&self) -> &str;

    /// Reshape one query hit.
    fn transform(&self, body: &Value) -> Result<Value, String>;
}

/// Either kind of buildable definition.
#[derive(Clone)]
pub enum Definition {
    /// Index definition.
    Index(Arc<dyn IndexDefinition>),
    /// Transformer definition.
    Transformer(Arc<dyn TransformerDefinition>),
}

impl Definition {
    /// Definition name.
    pub fn name(&self) -> &str {
        match self {
            Definition::Index(index) => index.name(),
            Definition::Transformer(transformer) => transformer.name(),
        }
    }

    /// Human-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Definition::Index(_) => "index",
            Definition::Transformer(_) => "transformer",
        }
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}

#[derive(Clone, Debug)]
struct CatalogEntry {
    module: String,
    definition: Definition,
}

/// Registry of definitions, grouped by module.
///
/// Registration order is preserved; registering a name twice replaces the
/// earlier definition in place.
#[derive(Clone, Debug, Default)]
pub struct DefinitionCatalog {
    entries: Vec<CatalogEntry>,
}

impl DefinitionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index definition under `module`.
    pub fn register_index(&mut self, module: impl Into<String>, index: Arc<dyn IndexDefinition>) {
        self.register(module.into(), Definition::Index(index));
    }

    /// Register a transformer definition under `module`.
    pub fn register_transformer(
        &mut self,
        module: impl Into<String>,
        transformer: Arc<dyn TransformerDefinition>,
    ) {
        self.register(module.into(), Definition::Transformer(transformer));
    }

    /// Builder form of [`register_index`](Self::register_index).
    pub fn with_index(mut self, module: impl Into<String>, index: Arc<dyn IndexDefinition>) -> Self {
        self.register_index(module, index);
        self
    }

    /// Builder form of [`register_transformer`](Self::register_transformer).
    pub fn with_transformer(
        mut self,
        module: impl Into<String>,
        transformer: Arc<dyn TransformerDefinition>,
    ) -> Self {
        self.register_transformer(module, transformer);
        self
    }

    fn register(&mut self, module: String, definition: Definition) {
        let entry = CatalogEntry { module, definition };
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.definition.name() == entry.definition.name())
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Look up a definition by name.
    pub fn resolve(&self, name: &str) -> Option<&Definition> {
        self.entries
            .iter()
            .find(|entry| entry.definition.name() == name)
            .map(|entry| &entry.definition)
    }

    /// Every definition registered under one of `modules`, in registration order.
    pub fn definitions_in<S: AsRef<str>>(&self, modules: &[S]) -> Vec<Definition> {
        self.entries
            .iter()
            .filter(|entry| modules.iter().any(|m| m.as_ref() == entry.module))
            .map(|entry| entry.definition.clone())
            .collect()
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Closure-backed definitions
// =============================================================================

type MapFn = dyn Fn(&Document) -> Result<Vec<Value>, String> + Send + Sync;
type ReduceFn = dyn Fn(Vec<Value>) -> Result<Vec<Value>, String> + Send + Sync;
type TransformFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// Index built from closures.
///
/// ```
/// use seedbed_core::FnIndex;
/// use serde_json::json;
///
/// let by_name = FnIndex::map("Users/Search", "Users", |doc| {
///     Ok(vec![json!({ "Name": doc.body["Name"] })])
/// });
/// ```
pub struct FnIndex {
    name: String,
    collection: String,
    map: Box<MapFn>,
    reduce: Option<Box<ReduceFn>>,
}

impl FnIndex {
    /// Map-only index.
    pub fn map<F>(name: impl Into<String>, collection: impl Into<String>, map: F) -> Self
    where
        F: Fn(&Document) -> Result<Vec<Value>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            collection: collection.into(),
            map: Box::new(map),
            reduce: None,
        }
    }

    /// Map/reduce index.
    pub fn map_reduce<F, R>(
        name: impl Into<String>,
        collection: impl Into<String>,
        map: F,
        reduce: R,
    ) -> Self
    where
        F: Fn(&Document) -> Result<Vec<Value>, String> + Send + Sync + 'static,
        R: Fn(Vec<Value>) -> Result<Vec<Value>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            collection: collection.into(),
            map: Box::new(map),
            reduce: Some(Box::new(reduce)),
        }
    }
}

impl IndexDefinition for FnIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn map(&self, document: &Document) -> Result<Vec<Value>, String> {
        (self.map)(document)
    }

    fn is_map_reduce(&self) -> bool {
        self.reduce.is_some()
    }

    fn reduce(&self, mapped: Vec<Value>) -> Result<Vec<Value>, String> {
        match &self.reduce {
            Some(reduce) => reduce(mapped),
            None => Ok(mapped),
        }
    }
}

/// Transformer built from a closure.
pub struct FnTransformer {
    name: String,
    transform: Box<TransformFn>,
}

impl FnTransformer {
    /// Create a transformer.
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(transform),
        }
    }
}

impl TransformerDefinition for FnTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, body: &Value) -> Result<Value, String> {
        (self.transform)(body)
    }
}
