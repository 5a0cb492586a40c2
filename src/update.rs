use crate::audit::{AuditFields, AuditScope, audit_expr};
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::executor::{execute_statement, require_data, require_table_name, table_target};
use crate::ident::quote_ident;
use crate::params::{SaveParams, SaveResult};
use crate::schema::Table;
use crate::statement::{ParamSet, SET_PREFIX, Statement, WHERE_PREFIX};
use crate::transaction::Tx;
use crate::types::Record;
use crate::where_clause::get_where_sql;

/// `[col] = @upar<col>` assignments for the given columns plus update-scope
/// audit columns.
pub(crate) fn set_list(
    table: &Table,
    data: &Record,
    audit: &AuditFields,
    params: &mut ParamSet,
    include_keys: bool,
) -> Vec<String> {
    let mut assignments = Vec::new();
    for (column, value) in table.whitelist(data) {
        if !column.is_writable() || (column.primary_key && !include_keys) {
            continue;
        }
        let placeholder = params.bind(SET_PREFIX, &column.column_name, value.clone());
        assignments.push(format!("{} = {placeholder}", quote_ident(&column.column_name)));
    }
    for (column, value) in audit.resolve(table, data, AuditScope::Update) {
        let expr = audit_expr(params, SET_PREFIX, column, value);
        assignments.push(format!("{} = {expr}", quote_ident(column)));
    }
    assignments
}

/// Equality predicates over the key columns present in `data`, bound under
/// `prefix`.
pub(crate) fn key_predicates(
    table: &Table,
    data: &Record,
    params: &mut ParamSet,
    prefix: &str,
) -> Vec<String> {
    table
        .primary_keys()
        .filter_map(|column| {
            data.get(&column.column_name).map(|value| {
                let placeholder = params.bind(prefix, &column.column_name, value.clone());
                format!("{} = {placeholder}", quote_ident(&column.column_name))
            })
        })
        .collect()
}

fn where_suffix(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

/// Build an UPDATE keyed by the primary-key values found in `data`.
///
/// Non-key columns go to SET, key columns to WHERE. With no key value in
/// `data` there is no WHERE and every row is updated.
///
/// # Errors
/// Validation error when no column is left to SET.
pub fn build_update(
    table: &Table,
    target: &str,
    data: &Record,
    audit: &AuditFields,
) -> Result<Statement, SqlMiddlewareDbError> {
    let mut params = ParamSet::new();
    let assignments = set_list(table, data, audit, &mut params, false);
    if assignments.is_empty() {
        return Err(SqlMiddlewareDbError::validation(format!(
            "no updatable fields for table '{}'",
            table.name
        )));
    }
    let predicates = key_predicates(table, data, &mut params, WHERE_PREFIX);
    let sql = format!(
        "UPDATE {target} SET {}{};",
        assignments.join(", "),
        where_suffix(&predicates)
    );
    Ok(params.into_statement(sql))
}

/// Build an UPDATE filtered by `filter`; every whitelisted field of `data`,
/// key columns included, goes to SET. An empty filter updates every row.
///
/// # Errors
/// Validation error when no column is left to SET.
pub fn build_update_by_where(
    table: &Table,
    target: &str,
    data: &Record,
    filter: Option<&Record>,
    audit: &AuditFields,
) -> Result<Statement, SqlMiddlewareDbError> {
    let mut params = ParamSet::new();
    let assignments = set_list(table, data, audit, &mut params, true);
    if assignments.is_empty() {
        return Err(SqlMiddlewareDbError::validation(format!(
            "no updatable fields for table '{}'",
            table.name
        )));
    }
    let clause = get_where_sql(filter, table);
    let sql = format!(
        "UPDATE {target} SET {}{};",
        assignments.join(", "),
        clause.as_suffix()
    );
    params.extend(clause.into_params());
    Ok(params.into_statement(sql))
}

/// Update rows matched by the primary-key values in `params.data`.
///
/// # Errors
/// Validation error for an empty table name or data, not-found for an unknown
/// table, driver errors unchanged.
pub async fn update(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    require_data(&params.data)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let statement = build_update(
        target.table(),
        &target.qualified(),
        &params.data,
        &params.audit,
    )?;
    let rows_affected = execute_statement(db, tx, &statement).await?;
    Ok(SaveResult {
        insert_id: None,
        rows_affected,
    })
}

/// Update rows matched by `params.filter`.
///
/// # Errors
/// Same as [`update`].
pub async fn update_by_where(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    require_data(&params.data)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let statement = build_update_by_where(
        target.table(),
        &target.qualified(),
        &params.data,
        params.filter.as_ref(),
        &params.audit,
    )?;
    let rows_affected = execute_statement(db, tx, &statement).await?;
    Ok(SaveResult {
        insert_id: None,
        rows_affected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditField;
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

    fn keyless() -> Table {
        Table::new(
            "tbl1",
            vec![
                Column::new("f1", false, false),
                Column::new("f2", false, false),
                Column::new("f3", false, false),
            ],
        )
    }

    #[test]
    fn keys_go_to_where_and_others_to_set() {
        let data = crate::record! { "f1" => 1, "f2" => 2, "f4" => 4 };
        let stmt = build_update(&keyed(), "[tbl1]", &data, &AuditFields::default()).unwrap();
        assert_eq!(stmt.sql, "UPDATE [tbl1] SET [f2] = @uparf2 WHERE [f1] = @wparf1;");
        assert_eq!(stmt.param_names().collect::<Vec<_>>(), vec!["uparf2", "wparf1"]);
    }

    #[test]
    fn keyless_update_touches_every_row() {
        let data = crate::record! { "f3" => 3, "f4" => 4 };
        let stmt = build_update(&keyless(), "[tbl1]", &data, &AuditFields::default()).unwrap();
        assert_eq!(stmt.sql, "UPDATE [tbl1] SET [f3] = @uparf3;");
        assert!(!stmt.sql.contains("WHERE"));
    }

    #[test]
    fn only_keys_is_a_validation_error() {
        let data = crate::record! { "f1" => 1 };
        let err = build_update(&keyed(), "[tbl1]", &data, &AuditFields::default()).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ValidationError(_)));
    }

    #[test]
    fn by_where_can_change_keys() {
        let data = crate::record! { "f1" => 10, "f2" => 20 };
        let filter = crate::record! { "f1" => 1, "nope" => 0 };
        let stmt = build_update_by_where(
            &keyed(),
            "[tbl1]",
            &data,
            Some(&filter),
            &AuditFields::default(),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [tbl1] SET [f1] = @uparf1, [f2] = @uparf2 WHERE [f1] = @wparf1;"
        );
        assert_eq!(stmt.param("wparf1"), Some(&RowValues::Int(1)));
        assert_eq!(stmt.param("uparf1"), Some(&RowValues::Int(10)));
    }

    #[test]
    fn by_where_without_filter_updates_all() {
        let data = crate::record! { "f2" => 2 };
        let stmt =
            build_update_by_where(&keyed(), "[tbl1]", &data, None, &AuditFields::default())
                .unwrap();
        assert_eq!(stmt.sql, "UPDATE [tbl1] SET [f2] = @uparf2;");
    }

    #[test]
    fn update_audit_is_applied() {
        let table = Table::new(
            "doc",
            vec![
                Column::new("id", true, false),
                Column::new("title", false, false),
                Column::new("updateDate", false, false),
                Column::new("createDate", false, false),
            ],
        );
        let audit = AuditFields {
            update_date: Some(AuditField::now()),
            create_date: Some(AuditField::now()),
            ..AuditFields::default()
        };
        let data = crate::record! { "id" => 1, "title" => "t" };
        let stmt = build_update(&table, "[doc]", &data, &audit).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [doc] SET [title] = @upartitle, [updateDate] = GETDATE() WHERE [id] = @wparid;"
        );
    }
}
