//! The manifest & version registry (component C10): content-hashed
//! versioning with parent-hash chaining, bounded history, diffing, and a
//! JSON export/import envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleetwright_types::{ManifestHistory, ManifestRecord, ManifestStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::diff::{ManifestDiff, ModifiedEntry};
use crate::error::RegistryError;
use crate::hash::{aggregate_hash, content_hash, next_version};

pub const DEFAULT_MAX_HISTORY: usize = 50;

pub struct ManifestRegistry {
    max_history: usize,
    histories: RwLock<HashMap<String, ManifestHistory>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryExport {
    pub histories: HashMap<String, ManifestHistory>,
    pub aggregate_hash: String,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `content` under `name`. Re-registering byte-identical
    /// content is a no-op that returns the existing head unchanged (§4.10
    /// idempotence, verified by §8's `Register(Register(M)) == Register(M)`
    /// property).
    pub async fn register(
        &self,
        name: &str,
        kind: &str,
        content: serde_json::Value,
        metadata: HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> ManifestRecord {
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        let hash = content_hash(&bytes);

        let mut histories = self.histories.write().await;
        let history = histories
            .entry(name.to_string())
            .or_insert_with(|| ManifestHistory { name: name.to_string(), entries: Vec::new() });

        if let Some(current) = history.entries.first() {
            if current.hash == hash {
                return current.clone();
            }
        }

        let parent_hash = history.entries.first().map(|r| r.hash.clone());
        let version = next_version(history.entries.first().map(|r| r.version.as_str()));
        let record = ManifestRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            version,
            hash,
            parent_hash,
            content,
            status: ManifestStatus::Pending,
            metadata,
            created_at: now,
            updated_at: now,
            applied_at: None,
        };

        history.entries.insert(0, record.clone());
        history.entries.truncate(self.max_history);
        record
    }

    pub async fn get(&self, name: &str) -> Option<ManifestRecord> {
        self.histories.read().await.get(name).and_then(|h| h.entries.first().cloned())
    }

    pub async fn history(&self, name: &str) -> Option<ManifestHistory> {
        self.histories.read().await.get(name).cloned()
    }

    pub async fn by_hash(&self, hash: &str) -> Vec<ManifestRecord> {
        self.histories
            .read()
            .await
            .values()
            .flat_map(|h| h.entries.iter())
            .filter(|r| r.hash == hash)
            .cloned()
            .collect()
    }

    pub async fn by_kind(&self, kind: &str) -> Vec<ManifestRecord> {
        self.heads().await.into_iter().filter(|r| r.kind == kind).collect()
    }

    pub async fn by_status(&self, status: ManifestStatus) -> Vec<ManifestRecord> {
        self.heads().await.into_iter().filter(|r| r.status == status).collect()
    }

    async fn heads(&self) -> Vec<ManifestRecord> {
        self.histories.read().await.values().filter_map(|h| h.entries.first().cloned()).collect()
    }

    /// Diffs this registry's current heads against `other`'s. `self` is
    /// treated as the newer side: entries only in `self` are `added`,
    /// entries only in `other` are `removed`, and entries present in both
    /// with a differing hash are `modified`.
    pub async fn diff(&self, other: &ManifestRegistry) -> ManifestDiff {
        let mine: HashMap<String, ManifestRecord> = self.heads().await.into_iter().map(|r| (r.name.clone(), r)).collect();
        let theirs: HashMap<String, ManifestRecord> = other.heads().await.into_iter().map(|r| (r.name.clone(), r)).collect();

        let mut added: Vec<String> = mine.keys().filter(|n| !theirs.contains_key(*n)).cloned().collect();
        let mut removed: Vec<String> = theirs.keys().filter(|n| !mine.contains_key(*n)).cloned().collect();
        added.sort();
        removed.sort();

        let mut modified: Vec<ModifiedEntry> = mine
            .iter()
            .filter_map(|(name, mine_record)| {
                theirs.get(name).filter(|their_record| their_record.hash != mine_record.hash).map(|their_record| {
                    ModifiedEntry {
                        name: name.clone(),
                        old_hash: their_record.hash.clone(),
                        new_hash: mine_record.hash.clone(),
                        old_version: their_record.version.clone(),
                        new_version: mine_record.version.clone(),
                    }
                })
            })
            .collect();
        modified.sort_by(|a, b| a.name.cmp(&b.name));

        ManifestDiff { added, removed, modified }
    }

    pub async fn export(&self) -> RegistryExport {
        let histories = self.histories.read().await.clone();
        let hash = aggregate_hash(histories.values().flat_map(|h| h.entries.iter()).map(|r| r.hash.as_str()));
        RegistryExport { histories, aggregate_hash: hash }
    }

    /// Replaces this registry's contents with `export`'s, after verifying
    /// its aggregate hash still matches its entries.
    pub async fn import(&self, export: RegistryExport) -> Result<(), RegistryError> {
        let recomputed = aggregate_hash(export.histories.values().flat_map(|h| h.entries.iter()).map(|r| r.hash.as_str()));
        if recomputed != export.aggregate_hash {
            return Err(RegistryError::CorruptExport);
        }
        *self.histories.write().await = export.histories;
        Ok(())
    }
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-07-26T12:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn scenario_four_mutating_content_bumps_version_and_chains_parent_hash() {
        let registry = ManifestRegistry::new();
        let first = registry.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        let second = registry
            .register("cluster-a", "cluster", json!({"nodes": 5}), HashMap::new(), now())
            .await;

        let history = registry.history("cluster-a").await.unwrap();
        assert_eq!(history.entries.len(), 2);
        assert_eq!(second.parent_hash, Some(first.hash));
        assert_eq!(second.version, "v2");
        assert_eq!(second.status, ManifestStatus::Pending);
    }

    #[tokio::test]
    async fn registering_identical_content_is_a_no_op() {
        let registry = ManifestRegistry::new();
        let first = registry.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        let second = registry.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        assert_eq!(first.hash, second.hash);
        assert_eq!(registry.history("cluster-a").await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn diff_of_a_registry_against_itself_has_no_changes() {
        let registry = ManifestRegistry::new();
        registry.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        let diff = registry.diff(&registry).await;
        assert!(!diff.has_changes());
    }

    #[tokio::test]
    async fn diff_reports_added_removed_and_modified() {
        let base = ManifestRegistry::new();
        base.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        base.register("cluster-b", "cluster", json!({"nodes": 1}), HashMap::new(), now()).await;

        let next = ManifestRegistry::new();
        next.register("cluster-a", "cluster", json!({"nodes": 5}), HashMap::new(), now()).await;
        next.register("cluster-c", "cluster", json!({"nodes": 2}), HashMap::new(), now()).await;

        let diff = next.diff(&base).await;
        assert_eq!(diff.added, vec!["cluster-c".to_string()]);
        assert_eq!(diff.removed, vec!["cluster-b".to_string()]);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].name, "cluster-a");
    }

    #[tokio::test]
    async fn history_is_trimmed_to_the_configured_max() {
        let registry = ManifestRegistry::with_max_history(2);
        for nodes in 0..5 {
            registry
                .register("cluster-a", "cluster", json!({"nodes": nodes}), HashMap::new(), now())
                .await;
        }
        assert_eq!(registry.history("cluster-a").await.unwrap().entries.len(), 2);
    }

    #[tokio::test]
    async fn export_then_import_round_trips_and_rejects_tampering() {
        let registry = ManifestRegistry::new();
        registry.register("cluster-a", "cluster", json!({"nodes": 3}), HashMap::new(), now()).await;
        let mut export = registry.export().await;

        let restored = ManifestRegistry::new();
        restored.import(export.clone()).await.unwrap();
        assert_eq!(restored.get("cluster-a").await.unwrap().hash, registry.get("cluster-a").await.unwrap().hash);

        export.aggregate_hash = "tampered".to_string();
        let tampered_target = ManifestRegistry::new();
        assert!(matches!(tampered_target.import(export).await, Err(RegistryError::CorruptExport)));
    }
}
