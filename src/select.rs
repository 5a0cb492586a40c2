//! Ad hoc queries with positional `?` placeholders.

use futures_util::future::try_join_all;
use futures_util::try_join;

use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::results::{CustomDbRow, ResultSet};
use crate::translation::translate_positional;
use crate::types::{QueryAndParams, RowValues};

/// One page of a paged query plus the total row count.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub count: i64,
    pub list: Vec<CustomDbRow>,
}

/// Strip trailing whitespace and statement terminators so `sql` can be used
/// as a derived table.
fn as_subquery(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

/// Run `sql`, binding `params` to its `?` markers left to right, and return
/// every result set.
///
/// # Errors
/// `ParameterError` when the marker count differs from `params.len()`; driver
/// errors unchanged.
pub async fn select_base(
    db: &Db,
    sql: &str,
    params: &[RowValues],
) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
    let sql = translate_positional(sql, params.len())?;
    tracing::debug!(sql = %sql, params = params.len(), "select");
    let mut client = db.acquire().await?;
    client.query(&sql, params).await
}

/// Rows of the first result set.
///
/// # Errors
/// Same as [`select_base`].
pub async fn select(
    db: &Db,
    sql: &str,
    params: &[RowValues],
) -> Result<Vec<CustomDbRow>, SqlMiddlewareDbError> {
    let sets = select_base(db, sql, params).await?;
    Ok(sets
        .into_iter()
        .next()
        .map(ResultSet::into_rows)
        .unwrap_or_default())
}

/// First row, or `None` for an empty result.
///
/// # Errors
/// Same as [`select_base`].
pub async fn select_top1(
    db: &Db,
    sql: &str,
    params: &[RowValues],
) -> Result<Option<CustomDbRow>, SqlMiddlewareDbError> {
    Ok(select(db, sql, params).await?.into_iter().next())
}

/// First column of the first row. `None` only when there is no row; a NULL
/// value comes back as `Some(RowValues::Null)`.
///
/// # Errors
/// Same as [`select_base`].
pub async fn select_one_value(
    db: &Db,
    sql: &str,
    params: &[RowValues],
) -> Result<Option<RowValues>, SqlMiddlewareDbError> {
    let row = select_top1(db, sql, params).await?;
    Ok(row.and_then(|row| row.get_by_index(0).cloned()))
}

/// `SELECT COUNT(*)` over `sql` used as a derived table.
///
/// # Errors
/// Same as [`select_base`], plus `ExecutionError` when the count is not an
/// integer.
pub async fn select_count(
    db: &Db,
    sql: &str,
    params: &[RowValues],
) -> Result<i64, SqlMiddlewareDbError> {
    let wrapped = format!(
        "SELECT COUNT(*) AS [count] FROM ({}) AS t",
        as_subquery(sql)
    );
    let value = select_one_value(db, &wrapped, params).await?;
    value
        .as_ref()
        .and_then(RowValues::to_i64)
        .ok_or_else(|| {
            SqlMiddlewareDbError::ExecutionError(format!("count query returned {value:?}"))
        })
}

/// Page bounds `(start, end)` for a 1-based page index; indexes below 1 are
/// treated as 1. Rows with `start < row_number <= end` are on the page.
fn page_window(page_size: u32, index: i64) -> (i64, i64) {
    let index = index.max(1);
    let size = i64::from(page_size);
    ((index - 1).saturating_mul(size), index.saturating_mul(size))
}

/// One page of `sql`, which must expose a `row_number` column (typically
/// `ROW_NUMBER() OVER (ORDER BY ...) AS row_number`), plus the total count.
///
/// The count and the page run concurrently on separate connections.
///
/// # Errors
/// `ValidationError` for a zero page size; otherwise as [`select_base`].
pub async fn select_split_page(
    db: &Db,
    sql: &str,
    params: &[RowValues],
    page_size: u32,
    index: i64,
) -> Result<Page, SqlMiddlewareDbError> {
    if page_size == 0 {
        return Err(SqlMiddlewareDbError::validation("page size must be positive"));
    }
    let (start, end) = page_window(page_size, index);
    let paged = format!(
        "SELECT * FROM ({}) AS t WHERE t.[row_number] > ? AND t.[row_number] <= ?",
        as_subquery(sql)
    );
    let mut paged_params = params.to_vec();
    paged_params.push(RowValues::Int(start));
    paged_params.push(RowValues::Int(end));

    let (count, list) = try_join!(
        select_count(db, sql, params),
        select(db, &paged, &paged_params)
    )?;
    Ok(Page { count, list })
}

/// Run independent queries concurrently; rows of each query's first result
/// set, in input order.
///
/// # Errors
/// The first error produced by any query; the others are dropped.
pub async fn selects(
    db: &Db,
    queries: &[QueryAndParams],
) -> Result<Vec<Vec<CustomDbRow>>, SqlMiddlewareDbError> {
    try_join_all(
        queries
            .iter()
            .map(|q| select(db, &q.query, &q.params)),
    )
    .await
}
