use std::collections::BTreeMap;

use crate::audit::AuditFields;
use crate::results::ResultSet;
use crate::types::{Record, RowValues};

/// Inputs shared by insert / update / delete / replace.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    pub table: String,
    pub data: Record,
    /// Filter for the `*_by_where` variants.
    pub filter: Option<Record>,
    /// Target database; `None` uses the connection default.
    pub database: Option<String>,
    pub audit: AuditFields,
    /// Delete only: require every key column to have a value.
    pub only_delete_by_primary_key: bool,
}

impl SaveParams {
    pub fn new(table: impl Into<String>, data: Record) -> Self {
        Self {
            table: table.into(),
            data,
            filter: None,
            database: None,
            audit: AuditFields::default(),
            only_delete_by_primary_key: true,
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_where(mut self, filter: Record) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditFields) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn only_delete_by_primary_key(mut self, only: bool) -> Self {
        self.only_delete_by_primary_key = only;
        self
    }
}

/// Inputs for a stored procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureParams {
    pub procedure: String,
    /// Arguments by parameter name; a leading `@` is optional.
    pub data: Record,
    pub database: Option<String>,
}

impl ProcedureParams {
    pub fn new(procedure: impl Into<String>, data: Record) -> Self {
        Self {
            procedure: procedure.into(),
            data,
            database: None,
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveResult {
    /// Identity assigned by an insert into an auto-increment table.
    pub insert_id: Option<i64>,
    pub rows_affected: u64,
}

impl SaveResult {
    /// Read the `[insertId], [rowsAffected]` row appended to identity-aware
    /// statements. No such row means nothing was written.
    pub(crate) fn from_identity_sets(sets: &[ResultSet]) -> Self {
        let row = sets
            .iter()
            .filter_map(ResultSet::first)
            .find(|row| row.get_column_index("insertId").is_some());
        match row {
            Some(row) => SaveResult {
                insert_id: row.get("insertId").and_then(RowValues::to_i64),
                rows_affected: row
                    .get("rowsAffected")
                    .and_then(RowValues::to_i64)
                    .and_then(|n| u64::try_from(n).ok())
                    .unwrap_or(0),
            },
            None => SaveResult::default(),
        }
    }
}

/// Result of a stored procedure call.
#[derive(Debug, Clone, Default)]
pub struct ProcedureResult {
    /// Result sets produced by the procedure itself, in order.
    pub recordsets: Vec<ResultSet>,
    /// Output parameter values by name (without `@`).
    pub output: BTreeMap<String, RowValues>,
    /// The procedure's RETURN value.
    pub return_value: Option<i64>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn identity_row_is_read() {
        let mut rs = ResultSet::default();
        rs.set_column_names(Arc::new(vec!["insertId".into(), "rowsAffected".into()]));
        rs.add_row_values(vec![RowValues::Int(41), RowValues::Int(1)]);
        let result = SaveResult::from_identity_sets(&[ResultSet::default(), rs]);
        assert_eq!(
            result,
            SaveResult {
                insert_id: Some(41),
                rows_affected: 1
            }
        );
    }

    #[test]
    fn null_identity_is_none() {
        let mut rs = ResultSet::default();
        rs.set_column_names(Arc::new(vec!["insertId".into(), "rowsAffected".into()]));
        rs.add_row_values(vec![RowValues::Null, RowValues::Int(2)]);
        let result = SaveResult::from_identity_sets(&[rs]);
        assert_eq!(result.insert_id, None);
        assert_eq!(result.rows_affected, 2);
        assert_eq!(SaveResult::from_identity_sets(&[]), SaveResult::default());
    }

    #[test]
    fn builder_defaults() {
        let params = SaveParams::new("t", Record::new());
        assert!(params.only_delete_by_primary_key);
        assert!(params.database.is_none());
        let params = params.with_database("other").only_delete_by_primary_key(false);
        assert_eq!(params.database.as_deref(), Some("other"));
        assert!(!params.only_delete_by_primary_key);
    }
}
