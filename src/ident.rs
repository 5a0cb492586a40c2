//! SQL Server identifier quoting.
//!
//! Every identifier that ends up in generated SQL text goes through
//! [`quote_ident`] or [`qualify`]. Values never do; they are always bound
//! as parameters.

/// Quote a single identifier part as `[name]`, doubling any `]`.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('[');
    for ch in name.chars() {
        if ch == ']' {
            out.push_str("]]");
        } else {
            out.push(ch);
        }
    }
    out.push(']');
    out
}

/// Build a qualified object name.
///
/// | database | schema | result |
/// |---|---|---|
/// | yes | yes | `[db].[schema].[object]` |
/// | yes | no  | `[db]..[object]` |
/// | no  | yes | `[schema].[object]` |
/// | no  | no  | `[object]` |
#[must_use]
pub fn qualify(database: Option<&str>, schema: Option<&str>, object: &str) -> String {
    let database = database.filter(|d| !d.is_empty());
    let schema = schema.filter(|s| !s.is_empty());
    match (database, schema) {
        (Some(db), Some(schema)) => format!(
            "{}.{}.{}",
            quote_ident(db),
            quote_ident(schema),
            quote_ident(object)
        ),
        (Some(db), None) => format!("{}..{}", quote_ident(db), quote_ident(object)),
        (None, Some(schema)) => format!("{}.{}", quote_ident(schema), quote_ident(object)),
        (None, None) => quote_ident(object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote_ident("users"), "[users]");
        assert_eq!(quote_ident("odd]name"), "[odd]]name]");
        assert_eq!(quote_ident("with space"), "[with space]");
    }

    #[test]
    fn qualification_forms() {
        assert_eq!(qualify(Some("db"), Some("dbo"), "t"), "[db].[dbo].[t]");
        assert_eq!(qualify(Some("db"), None, "t"), "[db]..[t]");
        assert_eq!(qualify(None, Some("dbo"), "t"), "[dbo].[t]");
        assert_eq!(qualify(None, None, "t"), "[t]");
        assert_eq!(qualify(Some(""), Some(""), "t"), "[t]");
    }
}
