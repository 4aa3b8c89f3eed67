//! Registered backup components (§4.9): each owns one slice of cluster
//! state and knows how to serialize and restore it, independent of where
//! the bytes end up.

use async_trait::async_trait;

use crate::error::BackupError;

#[async_trait]
pub trait BackupComponent: Send + Sync {
    fn name(&self) -> &str;
    async fn backup(&self) -> Result<Vec<u8>, BackupError>;
    async fn restore(&self, bytes: &[u8]) -> Result<(), BackupError>;
}

#[async_trait]
pub trait BackupStorage: Send + Sync {
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), BackupError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, BackupError>;
    async fn delete(&self, key: &str) -> Result<(), BackupError>;

    /// The `location` tag stamped onto every `Backup` envelope this storage
    /// produces (e.g. a bucket name or "memory" for the in-process fake).
    fn location_tag(&self) -> &str;
}
