use std::collections::BTreeMap;

use crate::ident::quote_ident;
use crate::schema::Table;
use crate::statement::{ParamSet, WHERE_PREFIX};
use crate::types::{Record, RowValues};

/// A parameterized equality filter built from caller data.
///
/// An empty `where_sql` means "no restriction": statements built from it
/// affect the whole table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    /// `[a] = @wpara AND [b] = @wparb`, without the `WHERE` keyword.
    pub where_sql: String,
    /// Values in predicate order.
    pub where_list: Vec<RowValues>,
    /// Values keyed by parameter name (`wpar<column>`).
    pub where_pars: BTreeMap<String, RowValues>,
    names: Vec<String>,
}

impl WhereClause {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.where_sql.is_empty()
    }

    /// ` WHERE <predicate>` or nothing.
    #[must_use]
    pub fn as_suffix(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_sql)
        }
    }

    /// `(name, value)` pairs in predicate order.
    pub(crate) fn into_params(self) -> impl Iterator<Item = (String, RowValues)> {
        self.names.into_iter().zip(self.where_list)
    }
}

/// Build an AND-joined equality filter from `filter`, keeping only keys that
/// are columns of `table`. Unknown keys are dropped silently.
#[must_use]
pub fn get_where_sql(filter: Option<&Record>, table: &Table) -> WhereClause {
    let Some(filter) = filter else {
        return WhereClause::default();
    };

    let mut params = ParamSet::new();
    let mut predicates = Vec::new();
    for (column, value) in table.whitelist(filter) {
        let placeholder = params.bind(WHERE_PREFIX, &column.column_name, value.clone());
        predicates.push(format!("{} = {placeholder}", quote_ident(&column.column_name)));
    }

    let statement = params.into_statement(predicates.join(" AND "));
    let mut clause = WhereClause {
        where_sql: statement.sql,
        ..WhereClause::default()
    };
    for (name, value) in statement.params {
        clause.where_pars.insert(name.clone(), value.clone());
        clause.where_list.push(value);
        clause.names.push(name);
    }
    clause
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn table() -> Table {
        Table::new(
            "tbl1",
            vec![Column::new("id", true, false), Column::new("name", false, false)],
        )
    }

    #[test]
    fn empty_and_absent_filters_have_no_predicate() {
        let table = table();
        for clause in [get_where_sql(None, &table), get_where_sql(Some(&Record::new()), &table)] {
            assert_eq!(clause.where_sql, "");
            assert!(clause.where_list.is_empty());
            assert!(clause.where_pars.is_empty());
            assert_eq!(clause.as_suffix(), "");
        }
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let filter = crate::record! { "id" => 1, "ghost" => 2 };
        let clause = get_where_sql(Some(&filter), &table());
        assert_eq!(clause.where_sql, "[id] = @wparid");
        assert_eq!(clause.where_list, vec![RowValues::Int(1)]);
        assert_eq!(clause.where_pars.keys().collect::<Vec<_>>(), vec!["wparid"]);
        assert!(!clause.where_sql.contains("ghost"));
    }

    #[test]
    fn predicates_are_and_joined() {
        let filter = crate::record! { "name" => "n", "id" => 1 };
        let clause = get_where_sql(Some(&filter), &table());
        assert_eq!(clause.where_sql, "[id] = @wparid AND [name] = @wparname");
        assert_eq!(clause.as_suffix(), " WHERE [id] = @wparid AND [name] = @wparname");
        let params: Vec<_> = clause.into_params().collect();
        assert_eq!(params[1], ("wparname".to_string(), RowValues::Text("n".into())));
    }

    #[test]
    fn only_unknown_keys_means_no_restriction() {
        let filter = crate::record! { "ghost" => 1 };
        assert!(get_where_sql(Some(&filter), &table()).is_empty());
    }
}
