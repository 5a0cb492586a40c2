use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{Query, QueryItem, Uuid};

use super::client::MssqlClient;
use crate::error::SqlMiddlewareDbError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Bind parameters to `@P1..@Pn` in order.
pub fn bind_query_params<'a>(query: &'a str, params: &[RowValues]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}

/// Run a batch and collect every result set, including empty ones.
pub(crate) async fn build_result_sets(
    client: &mut MssqlClient,
    query: &str,
    params: &[RowValues],
) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
    let mut stream = bind_query_params(query, params).query(client).await?;

    let mut sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let column_names: Vec<String> =
                    meta.columns().iter().map(|col| col.name().to_string()).collect();
                let mut result_set = ResultSet::with_capacity(10);
                result_set.set_column_names(Arc::new(column_names));
                sets.push(result_set);
            }
            QueryItem::Row(row) => {
                let Some(result_set) = sets.last_mut() else {
                    return Err(SqlMiddlewareDbError::ExecutionError(
                        "row received before column metadata".to_string(),
                    ));
                };
                let row_values = (0..row.len())
                    .map(|idx| extract_value(&row, idx))
                    .collect();
                result_set.add_row_values(row_values);
            }
        }
    }

    Ok(sets)
}

/// Run a statement and sum the rows affected by each of its parts.
pub(crate) async fn execute_dml(
    client: &mut MssqlClient,
    query: &str,
    params: &[RowValues],
) -> Result<u64, SqlMiddlewareDbError> {
    let exec_result = bind_query_params(query, params).execute(client).await?;
    Ok(exec_result.rows_affected().iter().sum())
}

/// Run raw SQL without `sp_executesql`, so session state such as an open
/// transaction survives the call.
pub(crate) async fn execute_batch(
    client: &mut MssqlClient,
    query: &str,
) -> Result<(), SqlMiddlewareDbError> {
    client.simple_query(query).await?.into_results().await?;
    Ok(())
}

/// Extract a value from a row at a specific index, trying the column types
/// tiberius can produce.
fn extract_value(row: &tiberius::Row, idx: usize) -> RowValues {
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return RowValues::Int(i64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return RowValues::Int(val);
    }
    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return RowValues::Int(i64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return RowValues::Int(i64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return RowValues::Float(f64::from(val));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return RowValues::Float(val);
    }
    if let Ok(Some(val)) = row.try_get::<Numeric, _>(idx) {
        return if val.scale() == 0 {
            i64::try_from(val.value()).map_or(RowValues::Float(f64::from(val)), RowValues::Int)
        } else {
            RowValues::Float(f64::from(val))
        };
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return RowValues::Bool(val);
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return RowValues::Timestamp(val);
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDate, _>(idx) {
        return RowValues::Timestamp(val.and_time(chrono::NaiveTime::MIN));
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return RowValues::Text(val.to_string());
    }
    if let Ok(Some(val)) = row.try_get::<Uuid, _>(idx) {
        return RowValues::Text(val.to_string());
    }
    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return RowValues::Blob(val.to_vec());
    }

    RowValues::Null
}
