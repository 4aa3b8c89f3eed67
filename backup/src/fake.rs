//! In-process test doubles for `BackupComponent`/`BackupStorage`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::component::{BackupComponent, BackupStorage};
use crate::error::BackupError;

pub struct FakeComponent {
    pub component_name: String,
    pub payload: Vec<u8>,
    pub fail_backup: bool,
    pub restored: Mutex<Vec<Vec<u8>>>,
}

impl FakeComponent {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            component_name: name.into(),
            payload: payload.into(),
            fail_backup: false,
            restored: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            component_name: name.into(),
            payload: Vec::new(),
            fail_backup: true,
            restored: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BackupComponent for FakeComponent {
    fn name(&self) -> &str {
        &self.component_name
    }

    async fn backup(&self) -> Result<Vec<u8>, BackupError> {
        if self.fail_backup {
            Err(BackupError::Storage(format!("{} refused to serialize", self.component_name)))
        } else {
            Ok(self.payload.clone())
        }
    }

    async fn restore(&self, bytes: &[u8]) -> Result<(), BackupError> {
        self.restored.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl BackupStorage for FakeStorage {
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), BackupError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, BackupError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| BackupError::Storage(format!("no object at {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), BackupError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn location_tag(&self) -> &str {
        "memory"
    }
}
