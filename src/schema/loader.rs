use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::try_join;

use super::model::{Column, ParameterMode, Procedure, ProcedureParameter, SchemaModel, Table};
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::ident::quote_ident;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

pub(crate) const TABLES_MARKER: &str = "-- schema:tables";
pub(crate) const COLUMNS_MARKER: &str = "-- schema:columns";
pub(crate) const PROCEDURES_MARKER: &str = "-- schema:procedures";
pub(crate) const PARAMETERS_MARKER: &str = "-- schema:parameters";

fn tables_sql(db: &str) -> String {
    format!(
        r"{TABLES_MARKER}
SELECT
  t.object_id AS objectId,
  t.name AS name,
  s.name AS schemaName,
  CAST(ep.value AS nvarchar(4000)) AS description
FROM {db}.sys.tables t
JOIN {db}.sys.schemas s ON s.schema_id = t.schema_id
LEFT JOIN {db}.sys.extended_properties ep
  ON ep.class = 1 AND ep.major_id = t.object_id AND ep.minor_id = 0
  AND ep.name = 'MS_Description'
WHERE t.is_ms_shipped = 0
ORDER BY s.name, t.name"
    )
}

fn columns_sql(db: &str) -> String {
    format!(
        r"{COLUMNS_MARKER}
SELECT
  s.name AS schemaName,
  t.name AS tableName,
  c.name AS columnName,
  c.is_identity AS isIdentity,
  CAST(CASE WHEN pk.column_id IS NULL THEN 0 ELSE 1 END AS bit) AS isPrimaryKey,
  ty.name AS typeName,
  c.max_length AS maxLength,
  c.[precision] AS [precision],
  c.scale AS scale,
  c.is_nullable AS isNullable
FROM {db}.sys.columns c
JOIN {db}.sys.tables t ON t.object_id = c.object_id
JOIN {db}.sys.schemas s ON s.schema_id = t.schema_id
JOIN {db}.sys.types ty ON ty.user_type_id = c.user_type_id
LEFT JOIN (
  SELECT ic.object_id, ic.column_id
  FROM {db}.sys.indexes i
  JOIN {db}.sys.index_columns ic
    ON ic.object_id = i.object_id AND ic.index_id = i.index_id
  WHERE i.is_primary_key = 1
) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id
WHERE t.is_ms_shipped = 0
ORDER BY s.name, t.name, c.column_id"
    )
}

fn procedures_sql(db: &str) -> String {
    format!(
        r"{PROCEDURES_MARKER}
SELECT
  p.object_id AS objectId,
  p.name AS name,
  s.name AS schemaName
FROM {db}.sys.procedures p
JOIN {db}.sys.schemas s ON s.schema_id = p.schema_id
WHERE p.is_ms_shipped = 0
ORDER BY s.name, p.name"
    )
}

fn parameters_sql(db: &str) -> String {
    format!(
        r"{PARAMETERS_MARKER}
SELECT
  pr.object_id AS objectId,
  SUBSTRING(pr.name, 2, LEN(pr.name)) AS name,
  CASE WHEN pr.is_output = 1 THEN 'out' ELSE 'in' END AS parameterMode,
  ty.name AS typeName,
  pr.max_length AS maxLength,
  pr.[precision] AS [precision],
  pr.scale AS scale
FROM {db}.sys.parameters pr
JOIN {db}.sys.procedures p ON p.object_id = pr.object_id
JOIN {db}.sys.types ty ON ty.user_type_id = pr.user_type_id
WHERE pr.parameter_id > 0 AND p.is_ms_shipped = 0
ORDER BY pr.object_id, pr.parameter_id"
    )
}

/// SQL declaration text for a catalog type, e.g. `nvarchar(50)`.
///
/// `max_length` is in bytes as reported by the catalog; `-1` means `max`.
#[must_use]
pub fn declaration_type(type_name: &str, max_length: i64, precision: i64, scale: i64) -> String {
    let length = |divisor: i64| {
        if max_length == -1 {
            "max".to_string()
        } else {
            (max_length / divisor).to_string()
        }
    };
    match type_name {
        "nvarchar" | "nchar" => format!("{type_name}({})", length(2)),
        "varchar" | "char" | "varbinary" | "binary" => format!("{type_name}({})", length(1)),
        "decimal" | "numeric" => format!("{type_name}({precision},{scale})"),
        "datetime2" | "time" | "datetimeoffset" => format!("{type_name}({scale})"),
        _ => type_name.to_string(),
    }
}

fn missing(column: &str) -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::ExecutionError(format!("schema query returned no '{column}' column"))
}

fn text(row: &CustomDbRow, column: &str) -> Result<String, SqlMiddlewareDbError> {
    match row.get(column) {
        Some(RowValues::Text(value)) => Ok(value.clone()),
        Some(_) => Err(SqlMiddlewareDbError::ExecutionError(format!(
            "schema column '{column}' is not text"
        ))),
        None => Err(missing(column)),
    }
}

fn optional_text(row: &CustomDbRow, column: &str) -> Option<String> {
    row.get(column).and_then(RowValues::as_text).map(str::to_string)
}

fn int(row: &CustomDbRow, column: &str) -> Result<i64, SqlMiddlewareDbError> {
    row.get(column)
        .ok_or_else(|| missing(column))?
        .to_i64()
        .ok_or_else(|| {
            SqlMiddlewareDbError::ExecutionError(format!("schema column '{column}' is not numeric"))
        })
}

fn flag(row: &CustomDbRow, column: &str) -> Result<bool, SqlMiddlewareDbError> {
    Ok(int(row, column)? != 0)
}

fn type_of(row: &CustomDbRow) -> Result<String, SqlMiddlewareDbError> {
    Ok(declaration_type(
        &text(row, "typeName")?,
        int(row, "maxLength")?,
        int(row, "precision")?,
        int(row, "scale")?,
    ))
}

fn rows(sets: Vec<ResultSet>) -> Vec<CustomDbRow> {
    sets.into_iter()
        .next()
        .map(ResultSet::into_rows)
        .unwrap_or_default()
}

/// Build a [`SchemaModel`] from the four catalog result sets.
///
/// Columns attach to tables by `(schema, table)` name; parameters attach to
/// procedures by object id. Orphans are ignored.
pub(crate) fn assemble(
    tables: &[CustomDbRow],
    columns: &[CustomDbRow],
    procedures: &[CustomDbRow],
    parameters: &[CustomDbRow],
) -> Result<SchemaModel, SqlMiddlewareDbError> {
    let mut by_name: BTreeMap<(String, String), Table> = BTreeMap::new();
    for row in tables {
        let table = Table {
            name: text(row, "name")?,
            schema: text(row, "schemaName")?,
            description: optional_text(row, "description"),
            columns: Vec::new(),
        };
        by_name.insert((table.schema.clone(), table.name.clone()), table);
    }
    for row in columns {
        let key = (text(row, "schemaName")?, text(row, "tableName")?);
        let Some(table) = by_name.get_mut(&key) else {
            continue;
        };
        table.columns.push(Column {
            column_name: text(row, "columnName")?,
            primary_key: flag(row, "isPrimaryKey")?,
            auto_increment: flag(row, "isIdentity")?,
            data_type: type_of(row)?,
            nullable: flag(row, "isNullable")?,
        });
    }

    let mut by_id: HashMap<i64, usize> = HashMap::new();
    let mut procs = Vec::with_capacity(procedures.len());
    for row in procedures {
        let object_id = int(row, "objectId")?;
        by_id.insert(object_id, procs.len());
        procs.push(Procedure {
            name: text(row, "name")?,
            schema: text(row, "schemaName")?,
            object_id,
            pars: Vec::new(),
        });
    }
    for row in parameters {
        let Some(&index) = by_id.get(&int(row, "objectId")?) else {
            continue;
        };
        let parameter_mode = match text(row, "parameterMode")?.as_str() {
            "out" => ParameterMode::Out,
            _ => ParameterMode::In,
        };
        procs[index].pars.push(ProcedureParameter {
            name: text(row, "name")?,
            parameter_mode,
            data_type: type_of(row)?,
        });
    }

    Ok(SchemaModel {
        tables: by_name.into_values().collect(),
        procedures: procs,
    })
}

async fn catalog_query(db: &Db, sql: String) -> Result<Vec<CustomDbRow>, SqlMiddlewareDbError> {
    let mut client = db.acquire().await?;
    Ok(rows(client.query(&sql, &[]).await?))
}

/// Introspect `database` without touching the cache.
///
/// # Errors
/// `ValidationError` for an empty database name, driver errors from any of the
/// catalog queries, or `ExecutionError` for an unexpected row shape.
pub async fn load_schema(db: &Db, database: &str) -> Result<SchemaModel, SqlMiddlewareDbError> {
    if database.trim().is_empty() {
        return Err(SqlMiddlewareDbError::validation("database is required"));
    }
    let qualified = quote_ident(database);
    let (tables, columns, procedures, parameters) = try_join!(
        catalog_query(db, tables_sql(&qualified)),
        catalog_query(db, columns_sql(&qualified)),
        catalog_query(db, procedures_sql(&qualified)),
        catalog_query(db, parameters_sql(&qualified)),
    )?;
    assemble(&tables, &columns, &procedures, &parameters)
}

/// Schema of `database`, loaded and cached on first use.
///
/// # Errors
/// Same as [`load_schema`].
pub async fn get_schema(db: &Db, database: &str) -> Result<Arc<SchemaModel>, SqlMiddlewareDbError> {
    if let Some(model) = db.cache().get(database) {
        tracing::debug!(database, "schema cache hit");
        return Ok(model);
    }
    let model = load_schema(db, database).await?;
    tracing::info!(
        database,
        tables = model.tables.len(),
        procedures = model.procedures.len(),
        "schema loaded"
    );
    Ok(db.cache().set(database, model))
}

/// Drop the cached schema of `database` (or the default database) so the next
/// operation reloads it. Call after DDL.
pub fn clear_schema(db: &Db, database: Option<&str>) {
    // Nothing can be cached under an empty name.
    if let Ok(database) = db.resolve_database(database) {
        db.cache().clear(database);
        tracing::debug!(database, "schema cache cleared");
    }
}
