use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::executor::{execute_statement, require_table_name, table_target};
use crate::ident::quote_ident;
use crate::params::{SaveParams, SaveResult};
use crate::schema::Table;
use crate::statement::{ParamSet, Statement, WHERE_PREFIX};
use crate::transaction::Tx;
use crate::types::Record;
use crate::where_clause::get_where_sql;

/// Build a DELETE keyed by the primary-key values in `data`.
///
/// Non-key fields of `data` are ignored. With `only_by_primary_key` every key
/// column needs a non-null value; without it, missing keys are left out of the
/// predicate and no key at all deletes every row.
///
/// # Errors
/// Validation error when the table has no primary key, or when a required key
/// value is missing.
pub fn build_delete(
    table: &Table,
    target: &str,
    data: &Record,
    only_by_primary_key: bool,
) -> Result<Statement, SqlMiddlewareDbError> {
    if !table.has_primary_key() {
        return Err(SqlMiddlewareDbError::validation(format!(
            "table '{}' has no primary key; use delete_by_where",
            table.name
        )));
    }

    let present = |name: &str| data.get(name).is_some_and(|v| !v.is_null());

    if only_by_primary_key {
        let missing: Vec<&str> = table
            .primary_keys()
            .map(|c| c.column_name.as_str())
            .filter(|name| !present(name))
            .collect();
        if !missing.is_empty() {
            return Err(SqlMiddlewareDbError::validation(format!(
                "missing primary key value(s) for table '{}': {}",
                table.name,
                missing.join(", ")
            )));
        }
    }

    let mut params = ParamSet::new();
    let mut predicates = Vec::new();
    for column in table.primary_keys() {
        if let Some(value) = data.get(&column.column_name).filter(|v| !v.is_null()) {
            let placeholder = params.bind(WHERE_PREFIX, &column.column_name, value.clone());
            predicates.push(format!("{} = {placeholder}", quote_ident(&column.column_name)));
        }
    }

    let sql = if predicates.is_empty() {
        format!("DELETE FROM {target};")
    } else {
        format!("DELETE FROM {target} WHERE {};", predicates.join(" AND "))
    };
    Ok(params.into_statement(sql))
}

/// Build a DELETE filtered by `filter`. An empty filter deletes every row.
#[must_use]
pub fn build_delete_by_where(table: &Table, target: &str, filter: Option<&Record>) -> Statement {
    let clause = get_where_sql(filter, table);
    let sql = format!("DELETE FROM {target}{};", clause.as_suffix());
    let mut params = ParamSet::new();
    params.extend(clause.into_params());
    params.into_statement(sql)
}

/// Delete the row identified by the primary-key values in `params.data`.
///
/// # Errors
/// Validation error for an empty table name, a keyless table or missing key
/// values; not-found for an unknown table; driver errors unchanged.
pub async fn delete(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let statement = build_delete(
        target.table(),
        &target.qualified(),
        &params.data,
        params.only_delete_by_primary_key,
    )?;
    let rows_affected = execute_statement(db, tx, &statement).await?;
    Ok(SaveResult {
        insert_id: None,
        rows_affected,
    })
}

/// Delete the rows matched by `params.filter`.
///
/// # Errors
/// Validation error for an empty table name, not-found for an unknown table,
/// driver errors unchanged.
pub async fn delete_by_where(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let statement =
        build_delete_by_where(target.table(), &target.qualified(), params.filter.as_ref());
    let rows_affected = execute_statement(db, tx, &statement).await?;
    Ok(SaveResult {
        insert_id: None,
        rows_affected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::types::RowValues;

    fn keyed() -> Table {
        Table::new(
            "tbl1",
            vec![
                Column::new("f1", true, false),
                Column::new("f2", false, false),
                Column::new("f3", false, false),
            ],
        )
    }

    fn composite() -> Table {
        Table::new(
            "link",
            vec![
                Column::new("a", true, false),
                Column::new("b", true, false),
                Column::new("note", false, false),
            ],
        )
    }

    #[test]
    fn deletes_by_key_only() {
        let data = crate::record! { "f1" => 1, "f2" => 2, "f3" => 3, "f4" => 4 };
        let stmt = build_delete(&keyed(), "[tbl1]", &data, true).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM [tbl1] WHERE [f1] = @wparf1;");
        assert_eq!(stmt.params, vec![("wparf1".to_string(), RowValues::Int(1))]);
    }

    #[test]
    fn keyless_table_always_fails() {
        let table = Table::new("t", vec![Column::new("f1", false, false)]);
        for data in [crate::record! { "f1" => 1 }, Record::new()] {
            for strict in [true, false] {
                let err = build_delete(&table, "[t]", &data, strict).unwrap_err();
                assert!(err.to_string().contains("no primary key"));
            }
        }
    }

    #[test]
    fn missing_keys_are_listed() {
        let data = crate::record! { "a" => 1, "b" => RowValues::Null };
        let err = build_delete(&composite(), "[link]", &data, true).unwrap_err();
        assert!(err.to_string().contains(": b"));
    }

    #[test]
    fn relaxed_mode_skips_missing_keys() {
        let data = crate::record! { "b" => 2 };
        let stmt = build_delete(&composite(), "[link]", &data, false).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM [link] WHERE [b] = @wparb;");

        let stmt = build_delete(&composite(), "[link]", &Record::new(), false).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM [link];");
    }

    #[test]
    fn by_where_filters_on_any_column() {
        let filter = crate::record! { "note" => "x", "zzz" => 1 };
        let stmt = build_delete_by_where(&composite(), "[link]", Some(&filter));
        assert_eq!(stmt.sql, "DELETE FROM [link] WHERE [note] = @wparnote;");

        let stmt = build_delete_by_where(&composite(), "[link]", None);
        assert_eq!(stmt.sql, "DELETE FROM [link];");
        assert!(stmt.params.is_empty());
    }
}
