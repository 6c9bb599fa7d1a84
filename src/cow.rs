//! Copy-on-write list
//!
//! Mutators clone the backing vector and swap it in under a write lock.
//! Readers take an `Arc` snapshot and iterate it without holding the lock, so
//! an iteration never sees elements added or removed after it started.

use std::sync::{Arc, RwLock};

use crate::error::{GafferError, Result};

#[derive(Debug)]
pub(crate) struct CowList<T> {
    inner: RwLock<Arc<Vec<T>>>,
}

impl<T: Clone> CowList<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub(crate) fn snapshot(&self) -> Result<Arc<Vec<T>>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| GafferError::runtime("copy-on-write list lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }

    pub(crate) fn push(&self, item: T) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| GafferError::runtime("copy-on-write list lock poisoned"))?;
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(item);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove the first element matching `pred`. Returns whether one was removed.
    pub(crate) fn remove_first(&self, pred: impl Fn(&T) -> bool) -> Result<bool> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| GafferError::runtime("copy-on-write list lock poisoned"))?;
        match guard.iter().position(|item| pred(item)) {
            Some(idx) => {
                let mut next: Vec<T> = (**guard).clone();
                next.remove(idx);
                *guard = Arc::new(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| GafferError::runtime("copy-on-write list lock poisoned"))?;
        *guard = Arc::new(Vec::new());
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_isolated_from_later_mutation() {
        let list = CowList::new();
        list.push(1).unwrap();
        list.push(2).unwrap();

        let snapshot = list.snapshot().unwrap();
        list.push(3).unwrap();
        assert!(list.remove_first(|v| *v == 1).unwrap());

        assert_eq!(snapshot.as_slice(), &[1, 2]);
        assert_eq!(list.snapshot().unwrap().as_slice(), &[2, 3]);
    }

    #[test]
    fn test_remove_first_only_removes_one() {
        let list = CowList::new();
        list.push("a").unwrap();
        list.push("a").unwrap();
        assert!(list.remove_first(|v| *v == "a").unwrap());
        assert_eq!(list.len(), 1);
        assert!(!list.remove_first(|v| *v == "b").unwrap());
    }

    #[test]
    fn test_clear() {
        let list = CowList::new();
        list.push(7).unwrap();
        list.clear().unwrap();
        assert_eq!(list.len(), 0);
        assert!(list.snapshot().unwrap().is_empty());
    }
}
