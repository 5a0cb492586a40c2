use crate::audit::AuditFields;
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::executor::{query_statement, require_data, require_table_name, table_target};
use crate::insert::{insert_lists, insert_sql};
use crate::params::{SaveParams, SaveResult};
use crate::schema::Table;
use crate::statement::{
    EXISTS_PREFIX, ParamSet, SELECT_IDENTITY, SELECT_NO_IDENTITY, Statement, WHERE_PREFIX,
};
use crate::transaction::Tx;
use crate::types::Record;
use crate::update::{key_predicates, set_list};

/// Predicate that never matches, used when a row cannot be located by key.
const NEVER: &str = "1 = 0";

/// Whether every key column has a non-null value in `data`. Keyless tables
/// never match.
fn locatable(table: &Table, data: &Record) -> bool {
    table.has_primary_key()
        && table
            .primary_keys()
            .all(|c| data.get(&c.column_name).is_some_and(|v| !v.is_null()))
}

fn key_filter(table: &Table, data: &Record, params: &mut ParamSet, prefix: &str) -> String {
    if locatable(table, data) {
        key_predicates(table, data, params, prefix).join(" AND ")
    } else {
        NEVER.to_string()
    }
}

/// Build the upsert batch for `data`.
///
/// The row is located by its primary-key values. When it exists the non-key
/// columns are updated, otherwise a row is inserted. A keyless table, or a row
/// with a missing key value, always takes the insert branch. Every branch ends
/// with an `[insertId], [rowsAffected]` row; `insertId` is only set when an
/// identity insert happened.
///
/// # Errors
/// Currently infallible for a resolved table; the `Result` matches the other
/// builders.
pub fn build_replace(
    table: &Table,
    target: &str,
    data: &Record,
    audit: &AuditFields,
) -> Result<Statement, SqlMiddlewareDbError> {
    let mut params = ParamSet::new();
    let exists = key_filter(table, data, &mut params, EXISTS_PREFIX);
    let assignments = set_list(table, data, audit, &mut params, false);
    let (fields, values) = insert_lists(table, data, audit, &mut params);

    let insert_tail = if table.has_auto_increment() {
        SELECT_IDENTITY
    } else {
        SELECT_NO_IDENTITY
    };
    let insert_branch = format!(
        "BEGIN\n    {};\n    {insert_tail};\nEND",
        insert_sql(target, &fields, &values)
    );

    let sql = if assignments.is_empty() {
        format!("IF NOT EXISTS(SELECT 1 FROM {target} WHERE {exists})\n{insert_branch};")
    } else {
        let located = key_filter(table, data, &mut params, WHERE_PREFIX);
        format!(
            "IF EXISTS(SELECT 1 FROM {target} WHERE {exists})\nBEGIN\n    UPDATE {target} SET {} WHERE {located};\n    {SELECT_NO_IDENTITY};\nEND\nELSE\n{insert_branch};",
            assignments.join(", ")
        )
    };
    Ok(params.into_statement(sql))
}

/// Update the row with the same primary key as `params.data`, or insert it.
///
/// # Errors
/// Validation error for an empty table name or data, not-found for an unknown
/// table, driver errors unchanged.
pub async fn replace(
    db: &Db,
    params: &SaveParams,
    tx: Option<&mut Tx>,
) -> Result<SaveResult, SqlMiddlewareDbError> {
    require_table_name(&params.table)?;
    require_data(&params.data)?;
    let target = table_target(db, &params.table, params.database.as_deref()).await?;
    let statement = build_replace(
        target.table(),
        &target.qualified(),
        &params.data,
        &params.audit,
    )?;
    let sets = query_statement(db, tx, &statement).await?;
    Ok(SaveResult::from_identity_sets(&sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditField;
    use crate::schema::Column;
    use crate::types::RowValues;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                Column::new("id", true, true),
                Column::new("name", false, false),
                Column::new("createDate", false, false),
                Column::new("updateDate", false, false),
            ],
        )
    }

    fn keyless() -> Table {
        Table::new(
            "log",
            vec![Column::new("f1", false, false), Column::new("f2", false, false)],
        )
    }

    #[test]
    fn existing_key_updates_and_missing_key_inserts() {
        let data = crate::record! { "id" => 7, "name" => "n", "ghost" => 1 };
        let stmt = build_replace(&users(), "[users]", &data, &AuditFields::default()).unwrap();
        assert!(stmt.sql.starts_with("IF EXISTS(SELECT 1 FROM [users] WHERE [id] = @eparid)"));
        assert!(stmt.sql.contains("UPDATE [users] SET [name] = @uparname WHERE [id] = @wparid;"));
        assert!(stmt.sql.contains("INSERT INTO [users]([name]) VALUES(@iparname);"));
        assert!(stmt.sql.contains("SCOPE_IDENTITY()"));
        assert!(!stmt.sql.contains("ghost"));
        assert_eq!(
            stmt.param_names().collect::<Vec<_>>(),
            vec!["eparid", "uparname", "iparname", "wparid"]
        );
        assert_eq!(stmt.param("eparid"), Some(&RowValues::Int(7)));
    }

    #[test]
    fn keyless_table_always_inserts() {
        let data = crate::record! { "f1" => 1, "f2" => 2 };
        let stmt = build_replace(&keyless(), "[log]", &data, &AuditFields::default()).unwrap();
        assert!(stmt.sql.starts_with("IF EXISTS(SELECT 1 FROM [log] WHERE 1 = 0)"));
        assert!(stmt.sql.contains("UPDATE [log] SET [f1] = @uparf1, [f2] = @uparf2 WHERE 1 = 0;"));
        assert!(stmt.sql.contains("INSERT INTO [log]([f1], [f2]) VALUES(@iparf1, @iparf2);"));
        assert!(stmt.sql.contains("CAST(NULL AS bigint) AS [insertId]"));
        assert!(stmt.param("eparf1").is_none());
    }

    #[test]
    fn missing_key_value_forces_insert() {
        let data = crate::record! { "name" => "n" };
        let stmt = build_replace(&users(), "[users]", &data, &AuditFields::default()).unwrap();
        assert!(stmt.sql.contains("WHERE 1 = 0)"));
        assert!(stmt.param("eparid").is_none());
    }

    #[test]
    fn nothing_to_set_only_inserts_when_absent() {
        let table = Table::new(
            "tags",
            vec![Column::new("a", true, false), Column::new("b", true, false)],
        );
        let data = crate::record! { "a" => 1, "b" => 2 };
        let stmt = build_replace(&table, "[tags]", &data, &AuditFields::default()).unwrap();
        assert!(stmt.sql.starts_with(
            "IF NOT EXISTS(SELECT 1 FROM [tags] WHERE [a] = @epara AND [b] = @eparb)\nBEGIN"
        ));
        assert!(!stmt.sql.contains("UPDATE"));
        assert!(stmt.sql.contains("INSERT INTO [tags]([a], [b]) VALUES(@ipara, @iparb);"));
    }

    #[test]
    fn audit_scopes_differ_per_branch() {
        let audit = AuditFields {
            create_date: Some(AuditField::now()),
            update_date: Some(AuditField::now()),
            ..AuditFields::default()
        };
        let data = crate::record! { "id" => 1, "name" => "n" };
        let stmt = build_replace(&users(), "[users]", &data, &audit).unwrap();
        assert!(stmt.sql.contains("SET [name] = @uparname, [updateDate] = GETDATE() WHERE"));
        assert!(stmt.sql.contains(
            "INSERT INTO [users]([name], [createDate], [updateDate]) VALUES(@iparname, GETDATE(), GETDATE());"
        ));
    }

    #[test]
    fn row_value_beats_audit_timestamp() {
        let audit = AuditFields {
            update_date: Some(AuditField::now()),
            ..AuditFields::default()
        };
        let data = crate::record! { "id" => 1, "name" => "n", "updateDate" => "2020-01-01" };
        let stmt = build_replace(&users(), "[users]", &data, &audit).unwrap();
        assert!(!stmt.sql.contains("GETDATE()"));
        assert!(stmt.sql.contains("[updateDate] = @uparupdateDate"));
    }
}
