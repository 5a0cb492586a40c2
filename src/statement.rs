use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::translation::bind_named;
use crate::types::RowValues;

/// Appended to inserts into tables with an identity column. `@@ROWCOUNT` in
/// the select list still refers to the INSERT.
pub(crate) const SELECT_IDENTITY: &str =
    "SELECT CAST(SCOPE_IDENTITY() AS bigint) AS [insertId], @@ROWCOUNT AS [rowsAffected]";

/// Same shape as [`SELECT_IDENTITY`] for branches that never insert.
pub(crate) const SELECT_NO_IDENTITY: &str =
    "SELECT CAST(NULL AS bigint) AS [insertId], @@ROWCOUNT AS [rowsAffected]";

/// Server-side timestamp used for audit columns.
pub(crate) const CURRENT_TIMESTAMP: &str = "GETDATE()";

/// Prefix of insert value parameters.
pub const INSERT_PREFIX: &str = "ipar";
/// Prefix of UPDATE ... SET parameters.
pub const SET_PREFIX: &str = "upar";
/// Prefix of filter parameters.
pub const WHERE_PREFIX: &str = "wpar";
/// Prefix of the replace existence-check parameters.
pub const EXISTS_PREFIX: &str = "epar";
/// Prefix of stored procedure argument parameters.
pub const PROCEDURE_PREFIX: &str = "ppar";

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static pattern compiles"));

/// One generated SQL statement with its named parameters.
///
/// `sql` references parameters as `@name`; `params` holds them in binding
/// order. Only schema-validated identifiers appear in `sql`; every value is a
/// parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, RowValues)>,
}

impl Statement {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&RowValues> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// SQL with named placeholders rewritten to `@P1..@Pn`, plus the values
    /// in matching order.
    #[must_use]
    pub fn positional(&self) -> (Cow<'_, str>, Vec<RowValues>) {
        let names: Vec<&str> = self.param_names().collect();
        let sql = bind_named(&self.sql, &names);
        let values = self.params.iter().map(|(_, value)| value.clone()).collect();
        (sql, values)
    }
}

/// Parameter name for `column` under `prefix`: non-word characters become `_`.
#[must_use]
pub fn param_name(prefix: &str, column: &str) -> String {
    format!("{prefix}{}", NON_WORD.replace_all(column, "_"))
}

/// Collects the parameters of one statement and keeps their names unique.
#[derive(Debug, Default)]
pub(crate) struct ParamSet {
    entries: Vec<(String, RowValues)>,
    /// `@names` the statement writes as text; never used for a parameter.
    reserved: Vec<String>,
}

impl ParamSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keep generated names clear of `names`, which appear in the SQL as
    /// `@name` and must not be rewritten to positional placeholders.
    pub(crate) fn reserve<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        self.reserved.extend(names.into_iter().map(str::to_string));
    }

    /// Bind `value` for `column` and return the `@name` to splice into SQL.
    pub(crate) fn bind(&mut self, prefix: &str, column: &str, value: RowValues) -> String {
        let base = param_name(prefix, column);
        let mut name = base.clone();
        let mut suffix = 2;
        while self.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        let placeholder = format!("@{name}");
        self.entries.push((name, value));
        placeholder
    }

    /// Append already-unique entries (e.g. from a where clause).
    pub(crate) fn extend(&mut self, entries: impl IntoIterator<Item = (String, RowValues)>) {
        self.entries.extend(entries);
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name) || self.reserved.iter().any(|r| r == name)
    }

    pub(crate) fn into_statement(self, sql: String) -> Statement {
        tracing::debug!(
            sql = %sql,
            params = ?self.entries.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "built statement"
        );
        Statement {
            sql,
            params: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_names_are_sanitized() {
        assert_eq!(param_name("wpar", "f1"), "wparf1");
        assert_eq!(param_name("upar", "first name"), "uparfirst_name");
        assert_eq!(param_name("ipar", "a-b.c"), "ipara_b_c");
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let mut params = ParamSet::new();
        assert_eq!(params.bind("upar", "a b", RowValues::Int(1)), "@upara_b");
        assert_eq!(params.bind("upar", "a_b", RowValues::Int(2)), "@upara_b_2");
        assert_eq!(params.bind("upar", "a.b", RowValues::Int(3)), "@upara_b_3");
        let stmt = params.into_statement(String::new());
        assert_eq!(
            stmt.param_names().collect::<Vec<_>>(),
            vec!["upara_b", "upara_b_2", "upara_b_3"]
        );
    }

    #[test]
    fn reserved_names_are_skipped() {
        let mut params = ParamSet::new();
        params.reserve(["pparA"]);
        assert_eq!(params.bind("ppar", "A", RowValues::Int(1)), "@pparA_2");
    }

    #[test]
    fn positional_form_orders_values_by_binding() {
        let mut params = ParamSet::new();
        let a = params.bind("upar", "a", RowValues::Int(1));
        let id = params.bind("wpar", "id", RowValues::Int(9));
        let stmt = params.into_statement(format!("UPDATE [t] SET [a] = {a} WHERE [id] = {id}"));

        let (sql, values) = stmt.positional();
        assert_eq!(sql, "UPDATE [t] SET [a] = @P1 WHERE [id] = @P2");
        assert_eq!(values, vec![RowValues::Int(1), RowValues::Int(9)]);
    }
}
