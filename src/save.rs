//! One entry point for every write, plus batch variants.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::delete::delete;
use crate::error::SqlMiddlewareDbError;
use crate::insert::insert;
use crate::params::{SaveParams, SaveResult};
use crate::replace::replace;
use crate::transaction::{Tx, begin_transaction};
use crate::update::update;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveType {
    Insert,
    Update,
    Delete,
    Replace,
}

impl fmt::Display for SaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveType::Insert => write!(f, "insert"),
            SaveType::Update => write!(f, "update"),
            SaveType::Delete => write!(f, "delete"),
            SaveType::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for SaveType {
    type Err = SqlMiddlewareDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <SaveType as ValueEnum>::from_str(s, true)
            .map_err(|_| SqlMiddlewareDbError::validation(format!("unknown save type '{s}'")))
    }
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveItem {
    pub save_type: SaveType,
    pub params: SaveParams,
}

impl SaveItem {
    #[must_use]
    pub fn new(save_type: SaveType, params: SaveParams) -> Self {
        Self { save_type, params }
    }
}

/// Run one write of the given kind.
///
/// # Errors
/// Whatever the dispatched operation returns.
pub async fn save(
    db: &Db,
    item: &SaveItem,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    tracing::debug!(save_type = %item.save_type, table = %item.params.table, "save");
    match item.save_type {
        SaveType::Insert => insert(db, &item.params, tx).await,
        SaveType::Update => update(db, &item.params, tx).await,
        SaveType::Delete => delete(db, &item.params, tx).await,
        SaveType::Replace => replace(db, &item.params, tx).await,
    }
}

/// Run all writes concurrently, each on its own connection.
///
/// Not atomic: on the first failure the others are dropped, and writes that
/// already completed stay applied.
///
/// # Errors
/// The first error produced by any item.
pub async fn saves(db: &Db, items: &[SaveItem]) -> Result<Vec<SaveResult>, SqlMiddlewareDbError> {
    try_join_all(items.iter().map(|item| save(db, item, None))).await
}

/// Run writes one after another, stopping at the first failure. Earlier
/// writes stay applied.
///
/// # Errors
/// The first error produced by any item.
pub async fn saves_seq(
    db: &Db,
    items: &[SaveItem],
) -> Result<Vec<SaveResult>, SqlMiddlewareDbError> {
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(save(db, item, None).await?);
    }
    Ok(results)
}

/// Run writes one after another inside a single transaction.
///
/// Commits when every item succeeds. On the first failure the transaction is
/// rolled back and that failure is returned; a failing rollback is logged and
/// does not replace it.
///
/// # Errors
/// The failing item's error, or a BEGIN / COMMIT error.
pub async fn saves_seq_with_tran(
    db: &Db,
    items: &[SaveItem],
) -> Result<Vec<SaveResult>, SqlMiddlewareDbError> {
    let mut tx = begin_transaction(db).await?;
    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match save(db, item, Some(&mut tx)).await {
            Ok(result) => results.push(result),
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(
                        index,
                        error = %error,
                        rollback_error = %rollback_error,
                        "rollback failed after batch error"
                    );
                }
                return Err(error);
            }
        }
    }
    tx.commit().await?;
    Ok(results)
}
