use crate::client::SqlClient;
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::results::ResultSet;
use crate::translation::translate_positional;
use crate::types::RowValues;

const BEGIN_READ_COMMITTED: &str =
    "SET TRANSACTION ISOLATION LEVEL READ COMMITTED; BEGIN TRANSACTION;";

/// Transaction handle pinned to one connection.
///
/// Pass `Some(&mut tx)` to any write operation to run it inside the
/// transaction. Statements run in the order they are awaited; concurrent use
/// of one handle is not supported.
///
/// Dropping a `Tx` without calling [`commit`](Tx::commit) or
/// [`rollback`](Tx::rollback) hands the connection back mid-transaction; the
/// pool rolls it back when the connection is recycled.
pub struct Tx {
    client: Box<dyn SqlClient>,
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx").finish_non_exhaustive()
    }
}

/// Begin a READ COMMITTED transaction on a fresh connection from `db`.
///
/// # Errors
/// Returns an error if no connection is available or BEGIN fails.
pub async fn begin_transaction(db: &Db) -> Result<Tx, SqlMiddlewareDbError> {
    let mut client = db.acquire().await?;
    client.execute_batch(BEGIN_READ_COMMITTED).await?;
    tracing::debug!("transaction started");
    Ok(Tx { client })
}

impl Tx {
    pub(crate) fn client(&mut self) -> &mut dyn SqlClient {
        self.client.as_mut()
    }

    /// Run a query with positional `?` placeholders inside the transaction.
    ///
    /// # Errors
    /// Returns an error if placeholder binding or execution fails.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
        let sql = translate_positional(sql, params.len())?;
        self.client.query(&sql, params).await
    }

    /// Run a DML statement with positional `?` placeholders inside the transaction.
    ///
    /// # Errors
    /// Returns an error if placeholder binding or execution fails.
    pub async fn execute_dml(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, SqlMiddlewareDbError> {
        let sql = translate_positional(sql, params.len())?;
        self.client.execute(&sql, params).await
    }

    /// Commit the transaction.
    ///
    /// # Errors
    /// Returns the driver error if COMMIT fails.
    pub async fn commit(mut self) -> Result<(), SqlMiddlewareDbError> {
        self.client.execute_batch("COMMIT TRANSACTION;").await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// # Errors
    /// Returns the driver error if ROLLBACK fails.
    pub async fn rollback(mut self) -> Result<(), SqlMiddlewareDbError> {
        self.client.execute_batch("ROLLBACK TRANSACTION;").await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}
