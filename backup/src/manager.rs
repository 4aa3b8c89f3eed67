//! The backup/restore manager (§4.9): component fan-out, retention
//! stamping, and a best-effort expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fleetwright_common::EventEmitter;
use fleetwright_types::{Backup, BackupStatus, Event};
use tokio::sync::RwLock;

use crate::component::{BackupComponent, BackupStorage};
use crate::error::BackupError;

fn generate_id(now: DateTime<Utc>) -> String {
    let suffix: [u8; 4] = rand::random();
    format!("{}-{}", now.format("%Y%m%d%H%M%S"), hex::encode(suffix))
}

fn storage_key(id: &str, component: &str) -> String {
    format!("{id}/{component}")
}

pub struct BackupManager {
    components: Vec<Arc<dyn BackupComponent>>,
    storage: Arc<dyn BackupStorage>,
    retention_days: Option<u32>,
    backups: RwLock<Vec<Backup>>,
    events: Option<EventEmitter>,
}

impl BackupManager {
    pub fn new(
        components: Vec<Arc<dyn BackupComponent>>,
        storage: Arc<dyn BackupStorage>,
        retention_days: Option<u32>,
        events: Option<EventEmitter>,
    ) -> Self {
        Self {
            components,
            storage,
            retention_days,
            backups: RwLock::new(Vec::new()),
            events,
        }
    }

    pub async fn backups(&self) -> Vec<Backup> {
        self.backups.read().await.clone()
    }

    /// Test-only seam for exercising the expiry sweep against a
    /// already-past-dated envelope without resorting to the degenerate
    /// `expires_at == created_at` case §3 excludes.
    #[cfg(test)]
    async fn insert_backup_for_test(&self, backup: Backup) {
        self.backups.write().await.push(backup);
    }

    pub fn events(&self) -> Option<&EventEmitter> {
        self.events.as_ref()
    }

    fn emit(&self, kind: &str, id: &str) {
        if let Some(events) = &self.events {
            events.emit(Event::new(kind, "backup").with("backup_id", id.to_string()));
        }
    }

    fn resolve_components(&self, names: Option<&[String]>) -> Result<Vec<Arc<dyn BackupComponent>>, BackupError> {
        match names {
            None => Ok(self.components.clone()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.components
                        .iter()
                        .find(|c| c.name() == name)
                        .cloned()
                        .ok_or_else(|| BackupError::UnknownComponent(name.clone()))
                })
                .collect(),
        }
    }

    /// Backs up every named component (or all of them, if `names` is
    /// `None`), uploading each component's bytes as it completes. A failing
    /// component stops the fan-out; everything already uploaded is still
    /// recorded under a `Failed` envelope rather than discarded.
    pub async fn create_backup(&self, names: Option<&[String]>) -> Result<Backup, BackupError> {
        let selected = self.resolve_components(names)?;
        let now = Utc::now();
        let id = generate_id(now);
        self.emit("backup_started", &id);

        let mut completed = Vec::new();
        let mut total_size = 0u64;
        let mut failed = false;

        for component in &selected {
            let bytes = match component.backup().await {
                Ok(bytes) => bytes,
                Err(_) => {
                    failed = true;
                    break;
                }
            };
            let key = storage_key(&id, component.name());
            if self.storage.upload(&key, &bytes).await.is_err() {
                failed = true;
                break;
            }
            total_size += bytes.len() as u64;
            completed.push(component.name().to_string());
        }

        let status = if failed { BackupStatus::Failed } else { BackupStatus::Completed };
        // §3: expires-at is either 0 (never) or > created-at; a zero or
        // unset retention means the envelope never expires.
        let expires_at = self
            .retention_days
            .filter(|&days| days > 0)
            .map(|days| now + ChronoDuration::days(days as i64));
        let backup = Backup {
            id: id.clone(),
            components: completed,
            size_bytes: total_size,
            created_at: now,
            expires_at,
            status,
            location: self.storage.location_tag().to_string(),
        };

        self.backups.write().await.push(backup.clone());
        self.emit(if failed { "backup_failed" } else { "backup_completed" }, &id);
        Ok(backup)
    }

    /// Restores every component an envelope recorded, in the order it
    /// recorded them.
    pub async fn restore_backup(&self, id: &str) -> Result<(), BackupError> {
        let backup = {
            let backups = self.backups.read().await;
            backups
                .iter()
                .find(|b| b.id == id)
                .cloned()
                .ok_or_else(|| BackupError::NotFound(id.to_string()))?
        };

        self.emit("restore_started", id);
        for name in &backup.components {
            let component = self
                .components
                .iter()
                .find(|c| c.name() == name)
                .ok_or_else(|| BackupError::ComponentNotRegistered(name.clone()))?;
            let key = storage_key(id, name);
            let bytes = self.storage.download(&key).await?;
            component.restore(&bytes).await?;
        }
        self.emit("restore_completed", id);
        Ok(())
    }

    /// Sweeps every expired envelope, best-effort deleting its storage
    /// objects, and returns how many were removed.
    pub async fn cleanup_expired_backups(&self) -> usize {
        let now = Utc::now();
        let mut backups = self.backups.write().await;
        let (expired, remaining): (Vec<Backup>, Vec<Backup>) =
            backups.drain(..).partition(|b| b.expires_at.map(|exp| exp <= now).unwrap_or(false));
        *backups = remaining;
        drop(backups);

        for backup in &expired {
            for component in &backup.components {
                let key = storage_key(&backup.id, component);
                let _ = self.storage.delete(&key).await;
            }
            self.emit("expired_deleted", &backup.id);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeComponent, FakeStorage};

    fn manager(retention_days: Option<u32>) -> (BackupManager, Arc<FakeStorage>) {
        let storage = Arc::new(FakeStorage::new());
        let components: Vec<Arc<dyn BackupComponent>> = vec![
            Arc::new(FakeComponent::new("etcd", b"etcd-snapshot".to_vec())),
            Arc::new(FakeComponent::new("manifests", b"manifests-blob".to_vec())),
        ];
        (BackupManager::new(components, storage.clone(), retention_days, None), storage)
    }

    #[tokio::test]
    async fn create_backup_uploads_every_component_and_records_total_size() {
        let (mgr, storage) = manager(None);
        let backup = mgr.create_backup(None).await.unwrap();
        assert_eq!(backup.status, BackupStatus::Completed);
        assert_eq!(backup.components, vec!["etcd".to_string(), "manifests".to_string()]);
        assert_eq!(backup.size_bytes, "etcd-snapshot".len() as u64 + "manifests-blob".len() as u64);
        assert!(storage.contains(&format!("{}/etcd", backup.id)));
    }

    #[tokio::test]
    async fn retention_days_sets_an_expiry_in_the_future() {
        let (mgr, _storage) = manager(Some(7));
        let backup = mgr.create_backup(None).await.unwrap();
        assert!(backup.expires_at.unwrap() > backup.created_at);
    }

    #[tokio::test]
    async fn no_retention_leaves_expiry_unset() {
        let (mgr, _storage) = manager(None);
        let backup = mgr.create_backup(None).await.unwrap();
        assert!(backup.expires_at.is_none());
    }

    #[tokio::test]
    async fn a_failing_component_marks_the_envelope_failed_but_keeps_prior_uploads() {
        let storage = Arc::new(FakeStorage::new());
        let components: Vec<Arc<dyn BackupComponent>> = vec![
            Arc::new(FakeComponent::new("etcd", b"ok".to_vec())),
            Arc::new(FakeComponent::failing("broken")),
        ];
        let mgr = BackupManager::new(components, storage.clone(), None, None);
        let backup = mgr.create_backup(None).await.unwrap();
        assert_eq!(backup.status, BackupStatus::Failed);
        assert_eq!(backup.components, vec!["etcd".to_string()]);
        assert!(storage.contains(&format!("{}/etcd", backup.id)));
    }

    #[tokio::test]
    async fn restore_replays_bytes_in_recorded_order() {
        let (mgr, _storage) = manager(None);
        let backup = mgr.create_backup(None).await.unwrap();
        mgr.restore_backup(&backup.id).await.unwrap();
    }

    #[tokio::test]
    async fn restoring_an_unknown_id_is_an_error() {
        let (mgr, _storage) = manager(None);
        let err = mgr.restore_backup("missing").await.unwrap_err();
        assert!(matches!(err, BackupError::NotFound(_)));
    }

    #[tokio::test]
    async fn zero_retention_days_leaves_expiry_unset() {
        let (mgr, _storage) = manager(Some(0));
        let backup = mgr.create_backup(None).await.unwrap();
        assert!(backup.expires_at.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_envelopes() {
        let storage = Arc::new(FakeStorage::new());
        let components: Vec<Arc<dyn BackupComponent>> = vec![Arc::new(FakeComponent::new("etcd", b"x".to_vec()))];
        let mgr = BackupManager::new(components, storage.clone(), None, None);
        let live = mgr.create_backup(None).await.unwrap();

        let mut expired = live.clone();
        expired.id = format!("{}-expired", live.id);
        expired.created_at = Utc::now() - ChronoDuration::days(2);
        expired.expires_at = Some(Utc::now() - ChronoDuration::days(1));
        storage.upload(&format!("{}/etcd", expired.id), b"x").await.unwrap();
        mgr.insert_backup_for_test(expired.clone()).await;

        let removed = mgr.cleanup_expired_backups().await;
        assert_eq!(removed, 1);
        assert!(!storage.contains(&format!("{}/etcd", expired.id)));
        assert!(storage.contains(&format!("{}/etcd", live.id)));
        let remaining = mgr.backups().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live.id);
    }
}
