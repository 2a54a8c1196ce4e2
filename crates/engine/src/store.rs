//! Keyed per-project state with get-or-create semantics.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use studio_core::types::DbId;

/// Map from project id to shared per-project state.
///
/// Values are created on first access and handed out as `Arc`s, so every
/// component working on a project sees the same instance.
pub struct ProjectStore<V> {
    entries: RwLock<HashMap<DbId, Arc<V>>>,
}

impl<V> ProjectStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, project_id: DbId) -> Option<Arc<V>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .cloned()
    }

    /// Return the entry for `project_id`, creating it with `create` if absent.
    pub fn get_or_insert_with(&self, project_id: DbId, create: impl FnOnce() -> V) -> Arc<V> {
        if let Some(existing) = self.get(project_id) {
            return existing;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry(project_id)
                .or_insert_with(|| Arc::new(create())),
        )
    }

    /// Drop the entry for a project (e.g. its view was closed).
    pub fn remove(&self, project_id: DbId) -> Option<Arc<V>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&project_id)
    }

    pub fn project_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn values(&self) -> Vec<Arc<V>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl<V: Default> ProjectStore<V> {
    pub fn get_or_default(&self, project_id: DbId) -> Arc<V> {
        self.get_or_insert_with(project_id, V::default)
    }
}

impl<V> Default for ProjectStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn same_project_returns_same_instance() {
        let store: ProjectStore<Mutex<Vec<i32>>> = ProjectStore::new();
        store.get_or_default(1).lock().unwrap().push(7);
        assert_eq!(*store.get_or_default(1).lock().unwrap(), vec![7]);
        assert!(store.get_or_default(2).lock().unwrap().is_empty());
    }

    #[test]
    fn factory_runs_only_once() {
        let store: ProjectStore<String> = ProjectStore::new();
        let mut calls = 0;
        store.get_or_insert_with(1, || {
            calls += 1;
            "a".into()
        });
        store.get_or_insert_with(1, || {
            calls += 1;
            "b".into()
        });
        assert_eq!(calls, 1);
        assert_eq!(*store.get(1).unwrap(), "a");
    }

    #[test]
    fn remove_and_list() {
        let store: ProjectStore<u8> = ProjectStore::new();
        store.get_or_default(3);
        store.get_or_default(1);
        assert_eq!(store.project_ids(), vec![1, 3]);
        assert!(store.remove(3).is_some());
        assert_eq!(store.project_ids(), vec![1]);
        assert!(store.get(3).is_none());
    }
}
