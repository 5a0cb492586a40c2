//! Shared plumbing for the write operations: the validation preamble and
//! running a built [`Statement`] on either an ad hoc connection or a
//! transaction.

use std::sync::Arc;

use crate::db::Db;
use crate::error::{ObjectKind, SqlMiddlewareDbError};
use crate::ident::qualify;
use crate::results::ResultSet;
use crate::schema::{Procedure, SchemaModel, Table, get_schema};
use crate::statement::Statement;
use crate::transaction::Tx;
use crate::types::Record;

/// A table resolved against its database's cached schema.
pub(crate) struct TableTarget {
    schema: Arc<SchemaModel>,
    index: usize,
    pub(crate) database: String,
}

impl TableTarget {
    pub(crate) fn table(&self) -> &Table {
        &self.schema.tables[self.index]
    }

    /// `[database].[schema].[table]`
    pub(crate) fn qualified(&self) -> String {
        let table = self.table();
        qualify(Some(&self.database), Some(&table.schema), &table.name)
    }
}

pub(crate) struct ProcedureTarget {
    schema: Arc<SchemaModel>,
    index: usize,
    pub(crate) database: String,
}

impl ProcedureTarget {
    pub(crate) fn procedure(&self) -> &Procedure {
        &self.schema.procedures[self.index]
    }

    pub(crate) fn qualified(&self) -> String {
        let procedure = self.procedure();
        qualify(Some(&self.database), Some(&procedure.schema), &procedure.name)
    }
}

pub(crate) fn require_table_name(table: &str) -> Result<(), SqlMiddlewareDbError> {
    if table.trim().is_empty() {
        return Err(SqlMiddlewareDbError::validation("table is required"));
    }
    Ok(())
}

pub(crate) fn require_data(data: &Record) -> Result<(), SqlMiddlewareDbError> {
    if data.is_empty() {
        return Err(SqlMiddlewareDbError::validation("data is required"));
    }
    Ok(())
}

/// Resolve the database, load its schema and find `table` in it. `table` may
/// be `schema.name`; a bare name shared by several schemas means `dbo`.
pub(crate) async fn table_target(
    db: &Db,
    table: &str,
    database: Option<&str>,
) -> Result<TableTarget, SqlMiddlewareDbError> {
    require_table_name(table)?;
    let database = db.resolve_database(database)?.to_string();
    let schema = get_schema(db, &database).await?;
    let index = schema
        .table_index(table)?
        .ok_or_else(|| SqlMiddlewareDbError::not_found(ObjectKind::Table, table, &database))?;
    Ok(TableTarget {
        schema,
        index,
        database,
    })
}

pub(crate) async fn procedure_target(
    db: &Db,
    procedure: &str,
    database: Option<&str>,
) -> Result<ProcedureTarget, SqlMiddlewareDbError> {
    if procedure.trim().is_empty() {
        return Err(SqlMiddlewareDbError::validation("procedure is required"));
    }
    let database = db.resolve_database(database)?.to_string();
    let schema = get_schema(db, &database).await?;
    let index = schema
        .procedure_index(procedure)?
        .ok_or_else(|| {
            SqlMiddlewareDbError::not_found(ObjectKind::Procedure, procedure, &database)
        })?;
    Ok(ProcedureTarget {
        schema,
        index,
        database,
    })
}

/// Run `statement` and collect its result sets.
pub(crate) async fn query_statement(
    db: &Db,
    tx: Option<&mut Tx>,
    statement: &Statement,
) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
    let (sql, values) = statement.positional();
    match tx {
        Some(tx) => tx.client().query(&sql, &values).await,
        None => db.acquire().await?.query(&sql, &values).await,
    }
}

/// Run `statement` and return rows affected.
pub(crate) async fn execute_statement(
    db: &Db,
    tx: Option<&mut Tx>,
    statement: &Statement,
) -> Result<u64, SqlMiddlewareDbError> {
    let (sql, values) = statement.positional();
    match tx {
        Some(tx) => tx.client().execute(&sql, &values).await,
        None => db.acquire().await?.execute(&sql, &values).await,
    }
}
