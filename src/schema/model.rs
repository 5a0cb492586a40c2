use serde::{Deserialize, Serialize};

use crate::error::SqlMiddlewareDbError;
use crate::types::{Record, RowValues};

/// Schema a bare object name resolves to when several schemas share it.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Introspected metadata for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: Vec<Table>,
    pub procedures: Vec<Procedure>,
}

impl SchemaModel {
    /// Find a table by exact (case-sensitive) name.
    ///
    /// `target` is either a bare name or `schema.name`. A bare name shared by
    /// several schemas resolves to [`DEFAULT_SCHEMA`].
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ValidationError` when a bare name exists
    /// in several schemas, none of them the default.
    pub fn table(&self, target: &str) -> Result<Option<&Table>, SqlMiddlewareDbError> {
        Ok(self.table_index(target)?.map(|index| &self.tables[index]))
    }

    /// Find a stored procedure; same resolution rules as [`SchemaModel::table`].
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ValidationError` for an ambiguous bare name.
    pub fn procedure(&self, target: &str) -> Result<Option<&Procedure>, SqlMiddlewareDbError> {
        Ok(self
            .procedure_index(target)?
            .map(|index| &self.procedures[index]))
    }

    pub(crate) fn table_index(&self, target: &str) -> Result<Option<usize>, SqlMiddlewareDbError> {
        locate(&self.tables, target, |t| (t.schema.as_str(), t.name.as_str()))
    }

    pub(crate) fn procedure_index(
        &self,
        target: &str,
    ) -> Result<Option<usize>, SqlMiddlewareDbError> {
        locate(&self.procedures, target, |p| (p.schema.as_str(), p.name.as_str()))
    }
}

/// Index of the object `target` names. An exact name match is tried first so
/// objects whose names contain a dot stay reachable; otherwise `schema.name`
/// is split on the first dot.
fn locate<T>(
    items: &[T],
    target: &str,
    key: impl Fn(&T) -> (&str, &str),
) -> Result<Option<usize>, SqlMiddlewareDbError> {
    let matching = |schema: Option<&str>, name: &str| -> Vec<usize> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                let (s, n) = key(item);
                n == name && schema.is_none_or(|wanted| s == wanted)
            })
            .map(|(index, _)| index)
            .collect()
    };

    let mut found = matching(None, target);
    if found.is_empty() {
        if let Some((schema, name)) = target.split_once('.') {
            found = matching(Some(schema), name);
        }
    }

    match found.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        several => several
            .iter()
            .copied()
            .find(|&index| key(&items[index]).0 == DEFAULT_SCHEMA)
            .map(Some)
            .ok_or_else(|| {
                let schemas: Vec<&str> = several.iter().map(|&i| key(&items[i]).0).collect();
                SqlMiddlewareDbError::validation(format!(
                    "'{target}' is ambiguous across schemas {}; qualify it as schema.name",
                    schemas.join(", ")
                ))
            }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    /// Owning schema, e.g. `dbo`.
    pub schema: String,
    /// `MS_Description` extended property, when set.
    pub description: Option<String>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub column_name: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub data_type: String,
    pub nullable: bool,
}

impl Column {
    /// Shorthand used by fixtures and tests.
    #[must_use]
    pub fn new(column_name: &str, primary_key: bool, auto_increment: bool) -> Self {
        Self {
            column_name: column_name.to_string(),
            primary_key,
            auto_increment,
            data_type: String::new(),
            nullable: !primary_key,
        }
    }

    /// Auto-increment columns are never written by callers.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self.auto_increment
    }
}

impl Table {
    #[must_use]
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        Self {
            name: name.to_string(),
            schema: "dbo".to_string(),
            description: None,
            columns,
        }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    #[must_use]
    pub fn has_auto_increment(&self) -> bool {
        self.columns.iter().any(|c| c.auto_increment)
    }

    /// Intersect the caller's record with this table's columns.
    ///
    /// Keys that are not columns are dropped. The result follows column order.
    #[must_use]
    pub fn whitelist<'t, 'd>(&'t self, data: &'d Record) -> Vec<(&'t Column, &'d RowValues)> {
        self.columns
            .iter()
            .filter_map(|column| data.get(&column.column_name).map(|value| (column, value)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterMode {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureParameter {
    /// Name without the leading `@`.
    pub name: String,
    pub parameter_mode: ParameterMode,
    /// Declaration text, e.g. `nvarchar(50)` or `decimal(18,2)`.
    pub data_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub name: String,
    pub schema: String,
    pub object_id: i64,
    pub pars: Vec<ProcedureParameter>,
}

impl Procedure {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ProcedureParameter> {
        self.pars.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tbl1() -> Table {
        Table::new(
            "tbl1",
            vec![
                Column::new("id", true, true),
                Column::new("f1", false, false),
                Column::new("f2", false, false),
            ],
        )
    }

    #[test]
    fn whitelist_keeps_known_columns_in_table_order() {
        let data = crate::record! { "f2" => 2, "ghost" => 9, "f1" => 1 };
        let table = tbl1();
        let kept: Vec<&str> = table
            .whitelist(&data)
            .into_iter()
            .map(|(c, _)| c.column_name.as_str())
            .collect();
        assert_eq!(kept, vec!["f1", "f2"]);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let model = SchemaModel {
            tables: vec![tbl1()],
            procedures: vec![],
        };
        assert!(model.table("tbl1").unwrap().is_some());
        assert!(model.table("TBL1").unwrap().is_none());
        assert!(model.procedure("tbl1").unwrap().is_none());
    }

    fn in_schema(schema: &str, name: &str, column: &str) -> Table {
        Table {
            schema: schema.to_string(),
            ..Table::new(name, vec![Column::new(column, false, false)])
        }
    }

    #[test]
    fn shared_name_prefers_default_schema() {
        let model = SchemaModel {
            tables: vec![in_schema("audit", "users", "at"), in_schema("dbo", "users", "name")],
            procedures: vec![],
        };
        assert_eq!(model.table("users").unwrap().unwrap().schema, "dbo");
        assert_eq!(model.table("audit.users").unwrap().unwrap().schema, "audit");
        assert_eq!(model.table("dbo.users").unwrap().unwrap().schema, "dbo");
        assert!(model.table("sales.users").unwrap().is_none());
    }

    #[test]
    fn shared_name_without_default_schema_is_ambiguous() {
        let model = SchemaModel {
            tables: vec![in_schema("audit", "log", "a"), in_schema("sales", "log", "b")],
            procedures: vec![],
        };
        let err = model.table("log").unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ValidationError(ref m) if m.contains("ambiguous")));
        assert_eq!(model.table("sales.log").unwrap().unwrap().columns[0].column_name, "b");
    }

    #[test]
    fn dotted_name_matches_exactly_first() {
        let model = SchemaModel {
            tables: vec![in_schema("dbo", "a.b", "x"), in_schema("a", "b", "y")],
            procedures: vec![],
        };
        assert_eq!(model.table("a.b").unwrap().unwrap().columns[0].column_name, "x");
    }

    #[test]
    fn key_flags() {
        let table = tbl1();
        assert!(table.has_primary_key());
        assert!(table.has_auto_increment());
        assert_eq!(table.primary_keys().count(), 1);
        assert!(!table.column("id").unwrap().is_writable());
    }

    #[test]
    fn parameter_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ParameterMode::Out).unwrap();
        assert_eq!(json, "\"out\"");
    }
}
