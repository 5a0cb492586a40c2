use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::SchemaModel;

static GLOBAL_SCHEMA_CACHE: LazyLock<SchemaCache> = LazyLock::new(SchemaCache::new);

/// Database name to introspected schema.
///
/// Cloning is cheap and clones share entries. There is no expiry: an entry
/// lives until [`clear`](SchemaCache::clear) is called, typically after DDL.
/// Concurrent loads of the same database may both populate the entry; the last
/// writer wins and both models are equivalent.
#[derive(Clone, Default)]
pub struct SchemaCache {
    entries: Arc<RwLock<HashMap<String, Arc<SchemaModel>>>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let databases: Vec<String> = self.read().keys().cloned().collect();
        f.debug_struct("SchemaCache")
            .field("databases", &databases)
            .finish()
    }
}

impl SchemaCache {
    /// A fresh, isolated cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every handle built with
    /// [`Db::with_global_cache`](crate::db::Db::with_global_cache).
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_SCHEMA_CACHE.clone()
    }

    #[must_use]
    pub fn get(&self, database: &str) -> Option<Arc<SchemaModel>> {
        self.read().get(database).cloned()
    }

    /// Store (or replace) the schema for `database`.
    pub fn set(&self, database: &str, model: SchemaModel) -> Arc<SchemaModel> {
        let model = Arc::new(model);
        self.write().insert(database.to_string(), model.clone());
        model
    }

    /// Forget the schema for `database`; the next lookup reloads it.
    pub fn clear(&self, database: &str) {
        self.write().remove(database);
    }

    pub fn clear_all(&self) {
        self.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written entry, so
    // recover from poisoning instead of propagating it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SchemaModel>>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SchemaModel>>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{Column, Table};

    fn model() -> SchemaModel {
        SchemaModel {
            tables: vec![Table::new("t", vec![Column::new("id", true, false)])],
            procedures: vec![],
        }
    }

    #[test]
    fn get_set_clear() {
        let cache = SchemaCache::new();
        assert!(cache.get("db1").is_none());

        cache.set("db1", model());
        assert_eq!(cache.get("db1").unwrap().tables.len(), 1);
        assert!(cache.get("db2").is_none());

        cache.clear("db1");
        assert!(cache.get("db1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let cache = SchemaCache::new();
        let other = cache.clone();
        cache.set("db", model());
        assert!(other.get("db").is_some());
    }

    #[test]
    fn separate_caches_are_isolated() {
        let a = SchemaCache::new();
        let b = SchemaCache::new();
        a.set("db", model());
        assert!(b.get("db").is_none());
    }

    #[test]
    fn set_replaces_entry() {
        let cache = SchemaCache::new();
        cache.set("db", model());
        cache.set("db", SchemaModel::default());
        assert!(cache.get("db").unwrap().tables.is_empty());
        assert_eq!(cache.len(), 1);
    }
}
