//! Content-addressed cache of per-document resolution state.
//!
//! One entry per unique (dialect, document content) pair. Resolution is
//! performed at most once per entry: concurrent callers for the same hash
//! wait on a shared `OnceCell` instead of resolving again.

use super::definitions::DefinitionRegistry;
use super::dialect::{Dialect, Version};
use super::resolver::{Resolution, Resolver};
use crate::error::Result;
use crate::loader::Fetch;
use crate::validation::Findings;
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// Hex sha256 of a document's canonical serialization
pub fn content_hash(version: Version, document: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_str().as_bytes());
    hasher.update([0u8]);
    // serde_json maps are ordered, so equal content serializes identically
    hasher.update(serde_json::to_vec(document).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

/// Resolved state of one document
#[derive(Debug)]
pub struct ResolvedDocument {
    pub resolution: Resolution,
    pub resolved_hash: String,
}

#[derive(Debug)]
pub struct RegistryEntry {
    pub version: Version,
    pub hash: String,
    pub original: Arc<Value>,
    resolved: OnceCell<Arc<ResolvedDocument>>,
    structure: DashMap<&'static str, Findings>,
    definitions: OnceLock<Arc<DefinitionRegistry>>,
}

impl RegistryEntry {
    fn new(version: Version, hash: String, original: Value) -> Self {
        Self {
            version,
            hash,
            original: Arc::new(original),
            resolved: OnceCell::new(),
            structure: DashMap::new(),
            definitions: OnceLock::new(),
        }
    }

    /// The resolved document, if resolution has already completed
    pub fn resolved(&self) -> Option<Arc<ResolvedDocument>> {
        self.resolved.get().cloned()
    }

    /// Resolve the document, or wait for the resolution already in flight
    pub async fn resolve(
        &self,
        dialect: &dyn Dialect,
        fetcher: Option<&dyn Fetch>,
        base: Option<&str>,
    ) -> Result<Arc<ResolvedDocument>> {
        if let Some(done) = self.resolved.get() {
            tracing::debug!(hash = %self.hash, "Resolution cache hit");
            return Ok(done.clone());
        }

        let resolved = self
            .resolved
            .get_or_try_init(|| async {
                let mut resolver = Resolver::new(dialect);
                if let Some(fetcher) = fetcher {
                    resolver = resolver.with_fetcher(fetcher);
                }
                if let Some(base) = base {
                    resolver = resolver.with_base(base);
                }
                let resolution = resolver.resolve(&self.original).await?;
                let resolved_hash = content_hash(self.version, &resolution.resolved);
                Ok::<_, crate::error::WardenError>(Arc::new(ResolvedDocument {
                    resolution,
                    resolved_hash,
                }))
            })
            .await?;
        Ok(resolved.clone())
    }

    /// Structural findings against `schema`, computed once per meta-schema
    pub fn structure(
        &self,
        schema: &'static str,
        check: impl FnOnce(&Value) -> Result<Findings>,
    ) -> Result<Findings> {
        if let Some(findings) = self.structure.get(schema) {
            return Ok(findings.clone());
        }
        let findings = check(&self.original)?;
        Ok(self.structure.entry(schema).or_insert(findings).clone())
    }

    /// Definition registry of the normalized document, built once
    pub fn definitions(&self, dialect: &dyn Dialect, normalized: &Value) -> Arc<DefinitionRegistry> {
        self.definitions
            .get_or_init(|| Arc::new(dialect.index(normalized)))
            .clone()
    }
}

/// Shared, process-lifetime cache of registry entries
#[derive(Debug, Default)]
pub struct SpecRegistry {
    entries: DashMap<String, Arc<RegistryEntry>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `document`, created on first sight
    pub fn entry(&self, version: Version, document: &Value) -> Arc<RegistryEntry> {
        let hash = content_hash(version, document);
        self.entries
            .entry(hash.clone())
            .or_insert_with(|| {
                tracing::debug!(%hash, version = %version, "New registry entry");
                Arc::new(RegistryEntry::new(version, hash.clone(), document.clone()))
            })
            .clone()
    }

    pub fn get(&self, hash: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.get(hash).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_depends_on_content_and_dialect() {
        let a = json!({"swagger": "2.0", "paths": {}});
        let b = json!({"paths": {}, "swagger": "2.0"});
        assert_eq!(content_hash(Version::V2_0, &a), content_hash(Version::V2_0, &b));
        assert_ne!(content_hash(Version::V2_0, &a), content_hash(Version::V1_2, &a));
        assert_ne!(
            content_hash(Version::V2_0, &a),
            content_hash(Version::V2_0, &json!({"swagger": "2.0"}))
        );
    }

    #[test]
    fn test_entry_is_shared_per_content() {
        let registry = SpecRegistry::new();
        let document = json!({"swagger": "2.0", "paths": {}});
        let first = registry.entry(Version::V2_0, &document);
        let second = registry.entry(Version::V2_0, &document.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(first.resolved().is_none());
    }

    #[test]
    fn test_structure_is_checked_once_per_schema() {
        let registry = SpecRegistry::new();
        let entry = registry.entry(Version::V2_0, &json!({"swagger": "2.0"}));
        let mut calls = 0;
        for _ in 0..3 {
            entry
                .structure("schema.json", |_| {
                    calls += 1;
                    Ok(Findings::new())
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_runs_once() {
        let registry = SpecRegistry::new();
        let document = json!({"definitions": {"A": {"type": "string"}}, "x": {"$ref": "#/definitions/A"}});
        let entry = registry.entry(Version::V2_0, &document);
        let dialect = Version::V2_0.dialect();

        let (a, b) = tokio::join!(
            entry.resolve(dialect, None, None),
            entry.resolve(dialect, None, None)
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert!(entry.resolved().is_some());
    }
}
