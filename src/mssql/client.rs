use std::ops::DerefMut;

use async_trait::async_trait;
use deadpool::managed::{Manager, Object};
use tiberius::Client;
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use super::config::MssqlOptions;
use super::manager::MssqlManager;
use super::query::{build_result_sets, execute_batch, execute_dml};
use crate::client::SqlClient;
use crate::error::SqlMiddlewareDbError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// A pooled connection; returns to the pool when dropped.
pub struct PooledClient(pub(crate) Object<MssqlManager>);

/// Open a single connection outside any pool.
///
/// # Errors
/// Returns `SqlMiddlewareDbError::ConnectionError` if the TCP or TDS
/// handshake fails.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient, SqlMiddlewareDbError> {
    MssqlManager::new(opts).create().await.map_err(|e| {
        SqlMiddlewareDbError::ConnectionError(format!("SQL Server connection error: {e}"))
    })
}

#[async_trait]
impl SqlClient for MssqlClient {
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
        build_result_sets(self, sql, params).await
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, SqlMiddlewareDbError> {
        execute_dml(self, sql, params).await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMiddlewareDbError> {
        execute_batch(self, sql).await
    }
}

#[async_trait]
impl SqlClient for PooledClient {
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
        build_result_sets(self.0.deref_mut(), sql, params).await
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, SqlMiddlewareDbError> {
        execute_dml(self.0.deref_mut(), sql, params).await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMiddlewareDbError> {
        execute_batch(self.0.deref_mut(), sql).await
    }
}
