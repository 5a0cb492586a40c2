use crate::audit::{AuditFields, AuditScope, audit_expr};
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::executor::{
    execute_statement, query_statement, require_data, require_table_name, table_target,
};
use crate::ident::quote_ident;
use crate::params::{SaveParams, SaveResult};
use crate::schema::Table;
use crate::statement::{INSERT_PREFIX, ParamSet, SELECT_IDENTITY, Statement};
use crate::transaction::Tx;
use crate::types::Record;

/// Insert field list and matching value expressions: whitelisted, writable
/// columns of `data` followed by insert-scope audit columns.
pub(crate) fn insert_lists(
    table: &Table,
    data: &Record,
    audit: &AuditFields,
    params: &mut ParamSet,
) -> (Vec<String>, Vec<String>) {
    let mut fields = Vec::new();
    let mut values = Vec::new();
    for (column, value) in table.whitelist(data) {
        if !column.is_writable() {
            continue;
        }
        fields.push(quote_ident(&column.column_name));
        values.push(params.bind(INSERT_PREFIX, &column.column_name, value.clone()));
    }
    for (column, value) in audit.resolve(table, data, AuditScope::Insert) {
        fields.push(quote_ident(column));
        values.push(audit_expr(params, INSERT_PREFIX, column, value));
    }
    (fields, values)
}

/// `INSERT INTO <target>(...) VALUES(...)`, or `DEFAULT VALUES` when nothing
/// survives the whitelist.
pub(crate) fn insert_sql(target: &str, fields: &[String], values: &[String]) -> String {
    if fields.is_empty() {
        format!("INSERT INTO {target} DEFAULT VALUES")
    } else {
        format!(
            "INSERT INTO {target}({}) VALUES({})",
            fields.join(", "),
            values.join(", ")
        )
    }
}

/// Build the INSERT for `data` into `table`, addressed as `target`.
///
/// Auto-increment columns are never written; when the table has one the
/// statement also selects the new identity.
#[must_use]
pub fn build_insert(table: &Table, target: &str, data: &Record, audit: &AuditFields) -> Statement {
    let mut params = ParamSet::new();
    let (fields, values) = insert_lists(table, data, audit, &mut params);
    let mut sql = insert_sql(target, &fields, &values);
    if table.has_auto_increment() {
        sql.push_str(";\n");
        sql.push_str(SELECT_IDENTITY);
    }
    sql.push(';');
    params.into_statement(sql)
}

/// Insert one row.
///
/// Returns the new identity in `insert_id` when the table has an
/// auto-increment column.
///
/// # Errors
/// Validation error for an empty table name or data, not-found for an unknown
/// table, driver errors unchanged.
pub async fn insert(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    require_data(&params.data)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let table = target.table();
    let statement = build_insert(table, &target.qualified(), &params.data, &params.audit);

    if table.has_auto_increment() {
        let sets = query_statement(db, tx, &statement).await?;
        Ok(SaveResult::from_identity_sets(&sets))
    } else {
        let rows_affected = execute_statement(db, tx, &statement).await?;
        Ok(SaveResult {
            insert_id: None,
            rows_affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditField;
    use crate::schema::Column;
    use crate::types::RowValues;

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

    fn identity() -> Table {
        Table::new(
            "users",
            vec![
                Column::new("id", true, true),
                Column::new("name", false, false),
                Column::new("updateDate", false, false),
            ],
        )
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let data = crate::record! { "f1" => 1, "f2" => 2, "f3" => 3, "f4" => 4 };
        let stmt = build_insert(&keyless(), "[db].[dbo].[tbl1]", &data, &AuditFields::default());
        assert_eq!(
            stmt.sql,
            "INSERT INTO [db].[dbo].[tbl1]([f1], [f2], [f3]) VALUES(@iparf1, @iparf2, @iparf3);"
        );
        assert_eq!(
            stmt.param_names().collect::<Vec<_>>(),
            vec!["iparf1", "iparf2", "iparf3"]
        );
        assert!(!stmt.sql.contains("f4"));
    }

    #[test]
    fn identity_column_is_excluded_and_selected_back() {
        let data = crate::record! { "id" => 99, "name" => "a" };
        let stmt = build_insert(&identity(), "[users]", &data, &AuditFields::default());
        assert!(stmt.sql.starts_with("INSERT INTO [users]([name]) VALUES(@iparname);\n"));
        assert!(stmt.sql.contains("SCOPE_IDENTITY()"));
        assert!(stmt.param("iparid").is_none());
    }

    #[test]
    fn nothing_writable_uses_default_values() {
        let data = crate::record! { "id" => 1 };
        let stmt = build_insert(&identity(), "[users]", &data, &AuditFields::default());
        assert!(stmt.sql.starts_with("INSERT INTO [users] DEFAULT VALUES;"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn audit_columns_are_appended() {
        let audit = AuditFields {
            update_date: Some(AuditField::now()),
            update_by: Some(AuditField::value("ignored: no such column")),
            ..AuditFields::default()
        };
        let data = crate::record! { "name" => "a" };
        let stmt = build_insert(&identity(), "[users]", &data, &audit);
        assert!(stmt
            .sql
            .starts_with("INSERT INTO [users]([name], [updateDate]) VALUES(@iparname, GETDATE());"));
        assert_eq!(stmt.param("iparname"), Some(&RowValues::Text("a".into())));
    }
}
