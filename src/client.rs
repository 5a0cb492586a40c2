//! The boundary to the database driver.
//!
//! Everything above this module only needs something that can run a
//! parameterized batch; [`crate::mssql`] provides the tiberius implementation
//! and tests provide scripted ones.

use async_trait::async_trait;

use crate::error::SqlMiddlewareDbError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One connection (or transaction-bound connection) able to run SQL.
///
/// SQL passed here already uses the driver's positional `@P1..@Pn`
/// placeholders; `params[0]` binds `@P1`.
#[async_trait]
pub trait SqlClient: Send {
    /// Run a batch and collect every result set it produces, in order.
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<ResultSet>, SqlMiddlewareDbError>;

    /// Run a statement and return the total rows affected.
    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, SqlMiddlewareDbError>;

    /// Run raw SQL as a plain batch, without parameters.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMiddlewareDbError>;
}

/// Hands out connections, usually from a pool.
#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn SqlClient>, SqlMiddlewareDbError>;

    /// Database used when an operation does not name one.
    fn default_database(&self) -> &str;

    /// Release pooled resources. Connections already handed out stay usable.
    fn close(&self) {}
}
