use std::sync::Arc;

use crate::client::{ClientSource, SqlClient};
use crate::error::SqlMiddlewareDbError;
use crate::schema::SchemaCache;

/// Handle passed to every operation: a connection source plus the schema
/// cache it reads from.
///
/// Cheap to clone; clones share both the source and the cache.
#[derive(Clone)]
pub struct Db {
    source: Arc<dyn ClientSource>,
    cache: SchemaCache,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("default_database", &self.source.default_database())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Db {
    /// Build a handle over `source` reading schemas from `cache`.
    pub fn new(source: impl ClientSource + 'static, cache: SchemaCache) -> Self {
        Self {
            source: Arc::new(source),
            cache,
        }
    }

    /// Build a handle that shares the process-wide [`SchemaCache::global`].
    pub fn with_global_cache(source: impl ClientSource + 'static) -> Self {
        Self::new(source, SchemaCache::global())
    }

    #[must_use]
    pub fn from_source(source: Arc<dyn ClientSource>, cache: SchemaCache) -> Self {
        Self { source, cache }
    }

    #[must_use]
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    #[must_use]
    pub fn default_database(&self) -> &str {
        self.source.default_database()
    }

    /// The explicit database if given and non-empty, else the connection default.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ValidationError` when neither names a
    /// database.
    pub fn resolve_database<'a>(
        &'a self,
        explicit: Option<&'a str>,
    ) -> Result<&'a str, SqlMiddlewareDbError> {
        let name = match explicit {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.default_database(),
        };
        if name.trim().is_empty() {
            return Err(SqlMiddlewareDbError::validation("database is required"));
        }
        Ok(name)
    }

    /// Check out a connection for an ad hoc request.
    ///
    /// # Errors
    /// Returns the source's error when no connection can be obtained.
    pub async fn acquire(&self) -> Result<Box<dyn SqlClient>, SqlMiddlewareDbError> {
        self.source.acquire().await
    }

    /// Close the underlying source (for pools: stop handing out connections).
    pub fn close(&self) {
        self.source.close();
    }
}
