//! SQL Server connections via tiberius.
//!
//! A deadpool-managed pool of tiberius clients implements [`ClientSource`];
//! single clients and pooled objects implement [`SqlClient`].

use async_trait::async_trait;
use deadpool::managed::{Pool, PoolError};

use crate::client::{ClientSource, SqlClient};
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::schema::SchemaCache;

pub mod client;
pub mod config;
pub mod manager;
pub mod query;

pub use client::{MssqlClient, PooledClient, create_mssql_client};
pub use config::{MssqlOptions, MssqlOptionsBuilder};
pub use manager::MssqlManager;

fn pool_error(error: PoolError<tiberius::error::Error>) -> SqlMiddlewareDbError {
    match error {
        PoolError::Backend(e) => SqlMiddlewareDbError::MssqlError(e),
        other => SqlMiddlewareDbError::PoolError(other.to_string()),
    }
}

/// A pool of SQL Server connections plus the default database name.
#[derive(Clone)]
pub struct MssqlPool {
    pool: Pool<MssqlManager>,
    database: String,
}

impl std::fmt::Debug for MssqlPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlPool")
            .field("database", &self.database)
            .field("status", &self.pool.status())
            .finish()
    }
}

impl MssqlPool {
    /// Build the pool. No connection is opened until first use.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::PoolError` if the pool cannot be built.
    pub fn new(opts: &MssqlOptions) -> Result<Self, SqlMiddlewareDbError> {
        let pool = Pool::builder(MssqlManager::new(opts))
            .max_size(opts.pool_max_size)
            .build()
            .map_err(|e| {
                SqlMiddlewareDbError::PoolError(format!("Failed to create SQL Server pool: {e}"))
            })?;
        Ok(Self {
            pool,
            database: opts.database.clone(),
        })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<MssqlManager> {
        &self.pool
    }
}

#[async_trait]
impl ClientSource for MssqlPool {
    async fn acquire(&self) -> Result<Box<dyn SqlClient>, SqlMiddlewareDbError> {
        let object = self.pool.get().await.map_err(pool_error)?;
        Ok(Box::new(PooledClient(object)))
    }

    fn default_database(&self) -> &str {
        &self.database
    }

    fn close(&self) {
        self.pool.close();
    }
}

/// Build a pool for `opts`, check that one connection can be opened, and
/// return a [`Db`] reading schemas from `cache`.
///
/// # Errors
/// Pool construction errors, or the driver error from the first connection.
pub async fn connect(opts: &MssqlOptions, cache: SchemaCache) -> Result<Db, SqlMiddlewareDbError> {
    let pool = MssqlPool::new(opts)?;
    drop(pool.pool.get().await.map_err(pool_error)?);
    tracing::info!(
        server = %opts.server,
        database = %opts.database,
        max_size = opts.pool_max_size,
        "SQL Server pool ready"
    );
    Ok(Db::new(pool, cache))
}
