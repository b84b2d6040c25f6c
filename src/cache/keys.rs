//! Cache key construction.
//!
//! The persisted key format is `{namespace}:v{version}:{userKey}` and must be
//! preserved bit-exactly: any stored data written by other processes is only
//! reachable through this exact shape. The schema version lives in the key
//! and nowhere else, so bumping a namespace's version strands old entries
//! behind an unreachable prefix instead of requiring a data migration.

/// Fully-namespaced storage key for one entry.
pub fn entry_key(namespace: &str, version: u32, user_key: &str) -> String {
    format!("{namespace}:v{version}:{user_key}")
}

/// Prefix shared by every entry of one namespace version.
pub fn version_prefix(namespace: &str, version: u32) -> String {
    format!("{namespace}:v{version}:")
}

/// Glob matching every entry of a namespace, across all versions.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{namespace}:v*:*")
}

/// Glob matching one user key across all versions of a namespace.
pub fn all_versions_pattern(namespace: &str, user_key: &str) -> String {
    format!("{namespace}:v*:{user_key}")
}
