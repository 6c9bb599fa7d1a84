//! Key/value scratch storage attached to a transaction

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{GafferError, Result};

pub type ResourceValue = Arc<dyn Any + Send + Sync>;

/// Concurrent map from caller-chosen keys to arbitrary values
#[derive(Default)]
pub(crate) struct ResourceMap {
    entries: RwLock<HashMap<String, ResourceValue>>,
}

impl ResourceMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put(&self, key: &str, value: ResourceValue) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GafferError::runtime("resource map lock poisoned"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<ResourceValue>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GafferError::runtime("resource map lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    pub(crate) fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GafferError::runtime("resource map lock poisoned"))?;
        entries.clear();
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_clear() {
        let map = ResourceMap::new();
        map.put("conn", Arc::new(42u32)).unwrap();

        let value = map.get("conn").unwrap().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert!(map.get("missing").unwrap().is_none());

        map.clear().unwrap();
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_put_replaces() {
        let map = ResourceMap::new();
        map.put("k", Arc::new("first")).unwrap();
        map.put("k", Arc::new("second")).unwrap();
        let value = map.get("k").unwrap().unwrap();
        assert_eq!(value.downcast_ref::<&str>(), Some(&"second"));
        assert_eq!(map.len(), 1);
    }
}
