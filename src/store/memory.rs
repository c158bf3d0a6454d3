use std::sync::{Mutex, MutexGuard};

use crate::store::tree::Tree;
use crate::store::{Store, StoreError, Value};

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: Mutex<Tree>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.tree().get(path))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.tree().set(path, value);
        Ok(())
    }

    fn keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.tree().keys(path))
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.tree().delete(path))
    }

    fn contains(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.tree().contains(path))
    }
}
