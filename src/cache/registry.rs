//! Version registry.
//!
//! An immutable table mapping each cache namespace to its current schema
//! version. Built once at startup from configuration and passed by `Arc`
//! into every cache instance and the invalidation consumer; a version bump
//! ships with a deployment, never as a runtime mutation.

use std::collections::BTreeMap;

use thiserror::Error;

/// Returned when a cache is constructed over a namespace the registry does
/// not know. Surfaced at construction time so that read paths stay
/// infallible.
#[derive(Debug, Error)]
#[error("namespace `{0}` is not registered")]
pub struct UnknownNamespace(pub String);

/// Immutable `namespace → schema version` table.
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    versions: BTreeMap<String, u32>,
}

impl VersionRegistry {
    pub fn new(versions: BTreeMap<String, u32>) -> Self {
        Self { versions }
    }

    /// Current schema version for `namespace`, if registered.
    pub fn version_of(&self, namespace: &str) -> Option<u32> {
        self.versions.get(namespace).copied()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.versions.contains_key(namespace)
    }

    /// All registered namespaces, in stable order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
