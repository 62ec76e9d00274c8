//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from any suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

pub use seedbed::{
    ConnectionSettings, DefinitionCatalog, Document, DocumentSession, DocumentStore, Entity,
    FnIndex, FnTransformer, HarnessError, Query, RecordingSink, SeedCollection, SessionExt,
    StoreConnector, StoreError, TestStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test writer; honours `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A server URL no other test uses.
pub fn unique_url(prefix: &str) -> String {
    format!(
        "mem://{}-{}-{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub name: String,
    pub tags: Vec<String>,
}

impl User {
    pub fn new(name: &str, tags: &[&str]) -> Self {
        User {
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "Users";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FakeModel {
    pub name: String,
    pub age: u32,
}

impl FakeModel {
    pub fn new(name: &str, age: u32) -> Self {
        FakeModel {
            name: name.to_string(),
            age,
        }
    }
}

impl Entity for FakeModel {
    const COLLECTION: &'static str = "FakeModels";
}

/// Four users across one collection.
pub fn fake_users() -> Vec<User> {
    vec![
        User::new("Leah Culver", &["pounce", "grove.io"]),
        User::new(
            "Kristen Bell",
            &["veronica mars", "slave leia", "star wars", "babe"],
        ),
        User::new("Ada Lovelace", &["first computer programmer EVA", "countess"]),
        User::new("Han Solo", &["star wars", "scoundrel", "stud"]),
    ]
}

/// Seed data holding [`fake_users`].
pub fn fake_user_seed() -> Vec<SeedCollection> {
    vec![SeedCollection::from_entities(&fake_users()).expect("users serialize")]
}

// ============================================================================
// Definitions
// ============================================================================

pub const USERS_SEARCH: &str = "Users/Search";
pub const USERS_TAGS_SUMMARY: &str = "Users/TagsSummary";
pub const USER_SEARCH_TRANSFORMER: &str = "User/SearchTransformer";

/// Users projected to their name.
pub fn users_search() -> FnIndex {
    FnIndex::map(USERS_SEARCH, User::COLLECTION, |doc| {
        Ok(vec![json!({ "Name": doc.body["Name"] })])
    })
}

/// Tag counts across all users.
pub fn users_tags_summary() -> FnIndex {
    FnIndex::map_reduce(
        USERS_TAGS_SUMMARY,
        User::COLLECTION,
        |doc| {
            let tags = doc.body["Tags"]
                .as_array()
                .ok_or_else(|| format!("{} has no tags", doc.id))?;
            Ok(tags
                .iter()
                .map(|tag| json!({ "TagName": tag, "Count": 1 }))
                .collect())
        },
        |mapped| {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for entry in mapped {
                let tag = entry["TagName"]
                    .as_str()
                    .ok_or("tag name is not a string")?
                    .to_string();
                *counts.entry(tag).or_default() += entry["Count"].as_u64().unwrap_or(0);
            }
            Ok(counts
                .into_iter()
                .map(|(tag, count)| json!({ "TagName": tag, "Count": count }))
                .collect())
        },
    )
}

/// Name plus tag count.
pub fn user_search_transformer() -> FnTransformer {
    FnTransformer::new(USER_SEARCH_TRANSFORMER, |body| {
        let count = body["Tags"].as_array().map(Vec::len).unwrap_or(0);
        Ok(json!({ "Name": body["Name"], "Count": count }))
    })
}

/// Index whose map fails on every document.
pub fn broken_index() -> FnIndex {
    FnIndex::map("Users/Broken", User::COLLECTION, |doc| {
        Err(format!("cannot index {}", doc.id))
    })
}

/// Catalog with every user definition under module `users` and the broken
/// index under `broken`.
pub fn user_catalog() -> DefinitionCatalog {
    DefinitionCatalog::new()
        .with_index("users", Arc::new(users_search()))
        .with_index("users", Arc::new(users_tags_summary()))
        .with_transformer("users", Arc::new(user_search_transformer()))
        .with_index("broken", Arc::new(broken_index()))
}

// ============================================================================
// Harness helpers
// ============================================================================

/// Harness over a private in-memory store with the user catalog.
pub fn user_harness() -> TestStore {
    init_tracing();
    TestStore::builder()
        .catalog(user_catalog())
        .poll_interval(Duration::from_millis(5))
        .build()
}

/// Names from a list of query hit bodies.
pub fn names(bodies: &[Value]) -> Vec<String> {
    bodies
        .iter()
        .filter_map(|b| b["Name"].as_str().map(str::to_string))
        .collect()
}
