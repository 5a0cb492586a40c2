//! Stored procedure calls.
//!
//! tiberius has no RPC output parameters, so a call runs as a small batch:
//!
//! ```sql
//! DECLARE @__ret int;
//! DECLARE @__out1 int = @pparTotal;
//! EXEC @__ret = [db].[dbo].[proc] @Name = @pparName, @Total = @__out1 OUTPUT;
//! SELECT @__ret AS [__returnValue], @__out1 AS [Total];
//! ```
//!
//! The trailing SELECT is split off into [`ProcedureResult::output`] and
//! [`ProcedureResult::return_value`].

use futures_util::future::try_join_all;

use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::executor::{procedure_target, query_statement};
use crate::ident::quote_ident;
use crate::params::{ProcedureParams, ProcedureResult};
use crate::schema::{ParameterMode, Procedure};
use crate::statement::{PROCEDURE_PREFIX, ParamSet, Statement};
use crate::transaction::Tx;
use crate::types::{Record, RowValues};

const RETURN_VALUE: &str = "__returnValue";

/// Type used for an output variable whose declared type is unknown.
const FALLBACK_TYPE: &str = "sql_variant";

/// Build the EXEC batch for `procedure` with the arguments in `data`.
///
/// Keys may carry a leading `@`. Keys that are not parameters of the
/// procedure are dropped; parameters absent from `data` are left to their
/// defaults. A parameter given both as `@Name` and `Name` takes the first key
/// in record order (`@Name`). Output parameters get a local variable,
/// initialised from `data` when a non-null value is given.
#[must_use]
pub fn build_exec(procedure: &Procedure, target: &str, data: &Record) -> Statement {
    let mut params = ParamSet::new();
    params.reserve(procedure.pars.iter().map(|p| p.name.as_str()));
    let mut declarations = vec!["DECLARE @__ret int;".to_string()];
    let mut arguments = Vec::new();
    let mut outputs = Vec::new();
    let mut bound: Vec<&str> = Vec::new();

    for (key, value) in data {
        let name = key.strip_prefix('@').unwrap_or(key);
        let Some(parameter) = procedure.parameter(name) else {
            continue;
        };
        if bound.contains(&name) {
            continue;
        }
        bound.push(name);
        match parameter.parameter_mode {
            ParameterMode::In => {
                let placeholder = params.bind(PROCEDURE_PREFIX, name, value.clone());
                arguments.push(format!("@{name} = {placeholder}"));
            }
            ParameterMode::Out => {
                let variable = format!("@__out{}", outputs.len() + 1);
                let data_type = if parameter.data_type.is_empty() {
                    FALLBACK_TYPE
                } else {
                    parameter.data_type.as_str()
                };
                if value.is_null() {
                    declarations.push(format!("DECLARE {variable} {data_type};"));
                } else {
                    let placeholder = params.bind(PROCEDURE_PREFIX, name, value.clone());
                    declarations.push(format!("DECLARE {variable} {data_type} = {placeholder};"));
                }
                arguments.push(format!("@{name} = {variable} OUTPUT"));
                outputs.push(format!("{variable} AS {}", quote_ident(name)));
            }
        }
    }

    let mut sql = declarations.join("\n");
    sql.push_str("\nEXEC @__ret = ");
    sql.push_str(target);
    if !arguments.is_empty() {
        sql.push(' ');
        sql.push_str(&arguments.join(", "));
    }
    sql.push_str(";\nSELECT @__ret AS ");
    sql.push_str(&quote_ident(RETURN_VALUE));
    for output in &outputs {
        sql.push_str(", ");
        sql.push_str(output);
    }
    sql.push(';');
    params.into_statement(sql)
}

/// Split the trailing return/output row off the procedure's own result sets.
fn into_procedure_result(mut sets: Vec<crate::results::ResultSet>) -> ProcedureResult {
    let Some(trailer) = sets.pop() else {
        return ProcedureResult::default();
    };
    let mut result = ProcedureResult {
        recordsets: sets,
        ..ProcedureResult::default()
    };
    if let (Some(row), Some(names)) = (trailer.first(), trailer.get_column_names()) {
        for (index, name) in names.iter().enumerate() {
            let value = row.get_by_index(index).cloned().unwrap_or(RowValues::Null);
            if name == RETURN_VALUE {
                result.return_value = value.to_i64();
            } else {
                result.output.insert(name.clone(), value);
            }
        }
    }
    result
}

/// Execute a stored procedure.
///
/// # Errors
/// Validation error for an empty procedure name, not-found for an unknown
/// procedure, driver errors unchanged.
pub async fn exec(
    db: &Db,
    params: &ProcedureParams,
    tx: Option<&mut Tx>,
) -> Result<ProcedureResult, SqlMiddlewareDbError> {
    let target = procedure_target(db, &params.procedure, params.database.as_deref()).await?;
    let statement = build_exec(target.procedure(), &target.qualified(), &params.data);
    let sets = query_statement(db, tx, &statement).await?;
    Ok(into_procedure_result(sets))
}

/// Execute several procedures concurrently, each on its own connection.
///
/// Results come back in input order. The first failure is returned and the
/// remaining calls are dropped; calls that already reached the server are not
/// undone.
///
/// # Errors
/// The first error produced by any call.
pub async fn execs(
    db: &Db,
    items: &[ProcedureParams],
) -> Result<Vec<ProcedureResult>, SqlMiddlewareDbError> {
    try_join_all(items.iter().map(|item| exec(db, item, None))).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::results::ResultSet;
    use crate::schema::ProcedureParameter;

    fn proc_fixture() -> Procedure {
        let par = |name: &str, mode, data_type: &str| ProcedureParameter {
            name: name.to_string(),
            parameter_mode: mode,
            data_type: data_type.to_string(),
        };
        Procedure {
            name: "usp_total".to_string(),
            schema: "dbo".to_string(),
            object_id: 1001,
            pars: vec![
                par("Name", ParameterMode::In, "nvarchar(50)"),
                par("Total", ParameterMode::Out, "int"),
                par("Note", ParameterMode::Out, ""),
            ],
        }
    }

    #[test]
    fn binds_inputs_and_declares_outputs() {
        let data = crate::record! {
            "@Name" => "x",
            "Total" => RowValues::Null,
            "Unknown" => 5,
        };
        let stmt = build_exec(&proc_fixture(), "[db].[dbo].[usp_total]", &data);
        assert_eq!(
            stmt.sql,
            "DECLARE @__ret int;\n\
             DECLARE @__out1 int;\n\
             EXEC @__ret = [db].[dbo].[usp_total] @Name = @pparName, @Total = @__out1 OUTPUT;\n\
             SELECT @__ret AS [__returnValue], @__out1 AS [Total];"
        );
        assert_eq!(stmt.param_names().collect::<Vec<_>>(), vec!["pparName"]);
    }

    #[test]
    fn output_with_value_is_initialised_and_untyped_falls_back() {
        let data = crate::record! { "Note" => "seed" };
        let stmt = build_exec(&proc_fixture(), "[usp_total]", &data);
        assert!(stmt.sql.contains("DECLARE @__out1 sql_variant = @pparNote;"));
        assert!(stmt.sql.contains("@Note = @__out1 OUTPUT"));
    }

    fn par(name: &str) -> ProcedureParameter {
        ProcedureParameter {
            name: name.to_string(),
            parameter_mode: ParameterMode::In,
            data_type: "int".to_string(),
        }
    }

    #[test]
    fn argument_names_survive_placeholder_rewrite() {
        let procedure = Procedure {
            name: "usp".to_string(),
            pars: vec![par("A"), par("pparA")],
            ..Procedure::default()
        };
        let data = crate::record! { "A" => 1, "pparA" => 2 };
        let stmt = build_exec(&procedure, "[usp]", &data);
        let (sql, values) = stmt.positional();
        assert_eq!(
            sql,
            "DECLARE @__ret int;\n\
             EXEC @__ret = [usp] @A = @P1, @pparA = @P2;\n\
             SELECT @__ret AS [__returnValue];"
        );
        assert_eq!(values, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn parameter_is_bound_once_with_or_without_at_sign() {
        let data = crate::record! { "@Name" => 1, "Name" => 2 };
        let stmt = build_exec(&proc_fixture(), "[usp_total]", &data);
        assert!(stmt.sql.contains("EXEC @__ret = [usp_total] @Name = @pparName;"));
        assert_eq!(stmt.params, vec![("pparName".to_string(), RowValues::Int(1))]);
    }

    #[test]
    fn no_arguments() {
        let stmt = build_exec(&proc_fixture(), "[usp_total]", &Record::new());
        assert_eq!(
            stmt.sql,
            "DECLARE @__ret int;\nEXEC @__ret = [usp_total];\nSELECT @__ret AS [__returnValue];"
        );
    }

    #[test]
    fn trailer_is_split_off() {
        let mut body = ResultSet::default();
        body.set_column_names(Arc::new(vec!["a".into()]));
        body.add_row_values(vec![RowValues::Int(1)]);

        let mut trailer = ResultSet::default();
        trailer.set_column_names(Arc::new(vec!["__returnValue".into(), "Total".into()]));
        trailer.add_row_values(vec![RowValues::Int(0), RowValues::Int(42)]);

        let result = into_procedure_result(vec![body, trailer]);
        assert_eq!(result.recordsets.len(), 1);
        assert_eq!(result.return_value, Some(0));
        assert_eq!(result.output.get("Total"), Some(&RowValues::Int(42)));
        assert!(into_procedure_result(Vec::new()).recordsets.is_empty());
    }
}
