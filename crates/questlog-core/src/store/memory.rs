//! In-memory local store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::store::LocalStore;

/// Keeps everything in a process-local map. Used by tests and by hosts that
/// manage persistence themselves.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, to exercise the fatal local-store path.
    pub fn set_fail_writes(&self, fail: bool) {
        *self
            .fail_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = fail;
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        if *self
            .fail_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(Error::LocalStore("write failure injected".to_string()));
        }
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.read("habits").unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryStore::new();
        store.write("xp", b"42").unwrap();
        assert_eq!(store.read("xp").unwrap().unwrap(), b"42");
    }

    #[test]
    fn test_clones_share_contents() {
        let store = MemoryStore::new();
        let view = store.clone();
        store.write("level", b"3").unwrap();
        assert_eq!(view.read("level").unwrap().unwrap(), b"3");
    }

    #[test]
    fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.write("xp", b"1").is_err());
        store.set_fail_writes(false);
        assert!(store.write("xp", b"1").is_ok());
    }
}
