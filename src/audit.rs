//! Optional `createBy` / `createDate` / `updateBy` / `updateDate` columns
//! filled in by insert, update and replace.

use crate::schema::Table;
use crate::statement::{CURRENT_TIMESTAMP, ParamSet};
use crate::types::{Record, RowValues};

/// What to write into an audit column.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditValue {
    /// Bind this value as a parameter.
    Value(RowValues),
    /// Use the server clock (`GETDATE()`).
    CurrentTimestamp,
}

/// One audit column: an optional target column override and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditField {
    /// Target column; `None` means the default name for the slot.
    pub field_name: Option<String>,
    pub value: AuditValue,
}

impl AuditField {
    pub fn value(value: impl Into<RowValues>) -> Self {
        Self {
            field_name: None,
            value: AuditValue::Value(value.into()),
        }
    }

    #[must_use]
    pub fn now() -> Self {
        Self {
            field_name: None,
            value: AuditValue::CurrentTimestamp,
        }
    }

    /// Write into `field_name` instead of the slot's default column.
    #[must_use]
    pub fn into_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }
}

impl From<RowValues> for AuditField {
    fn from(value: RowValues) -> Self {
        AuditField::value(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFields {
    pub create_by: Option<AuditField>,
    pub create_date: Option<AuditField>,
    pub update_by: Option<AuditField>,
    pub update_date: Option<AuditField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuditScope {
    /// All four slots.
    Insert,
    /// `updateBy` / `updateDate` only.
    Update,
}

impl AuditFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create_by.is_none()
            && self.create_date.is_none()
            && self.update_by.is_none()
            && self.update_date.is_none()
    }

    /// `createBy`/`updateBy` set to `user`, both dates set to the server clock.
    pub fn stamped_by(user: impl Into<RowValues>) -> Self {
        let user = user.into();
        Self {
            create_by: Some(AuditField::value(user.clone())),
            create_date: Some(AuditField::now()),
            update_by: Some(AuditField::value(user)),
            update_date: Some(AuditField::now()),
        }
    }

    fn slots(&self, scope: AuditScope) -> Vec<(&'static str, &AuditField)> {
        let slots = [
            ("createBy", &self.create_by, AuditScope::Insert),
            ("createDate", &self.create_date, AuditScope::Insert),
            ("updateBy", &self.update_by, AuditScope::Update),
            ("updateDate", &self.update_date, AuditScope::Update),
        ];
        slots
            .into_iter()
            .filter(|(_, _, slot_scope)| scope == AuditScope::Insert || *slot_scope == scope)
            .filter_map(|(default, field, _)| field.as_ref().map(|f| (default, f)))
            .collect()
    }

    /// Audit assignments that apply to `table` for this row.
    ///
    /// A slot is skipped when the table lacks the column, the column is
    /// auto-increment (or a key, for updates), or `data` already has a value
    /// for it: row data wins over the operation-level setting.
    pub(crate) fn resolve<'a>(
        &'a self,
        table: &'a Table,
        data: &Record,
        scope: AuditScope,
    ) -> Vec<(&'a str, &'a AuditValue)> {
        let mut out: Vec<(&str, &AuditValue)> = Vec::new();
        for (default, field) in self.slots(scope) {
            let name = field.field_name.as_deref().unwrap_or(default);
            let Some(column) = table.column(name) else {
                continue;
            };
            if column.auto_increment
                || (scope == AuditScope::Update && column.primary_key)
                || data.contains_key(name)
                || out.iter().any(|(taken, _)| *taken == name)
            {
                continue;
            }
            out.push((column.column_name.as_str(), &field.value));
        }
        out
    }
}

/// SQL text for an audit value: a bound parameter or the server clock.
pub(crate) fn audit_expr(
    params: &mut ParamSet,
    prefix: &str,
    column: &str,
    value: &AuditValue,
) -> String {
    match value {
        AuditValue::Value(v) => params.bind(prefix, column, v.clone()),
        AuditValue::CurrentTimestamp => CURRENT_TIMESTAMP.to_string(),
    }
}
