//! A scripted in-memory [`ClientSource`] for exercising operations without a
//! server.
//!
//! Catalog queries are answered from the [`SchemaModel`]s registered with
//! [`MockSource::with_schema`]; everything else goes to an optional handler.
//! Every call is recorded.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::runtime::Runtime;

use crate::client::{ClientSource, SqlClient};
use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::ident::quote_ident;
use crate::results::ResultSet;
use crate::schema::{
    COLUMNS_MARKER, PARAMETERS_MARKER, PROCEDURES_MARKER, ParameterMode, SchemaCache, SchemaModel,
    TABLES_MARKER,
};
use crate::types::RowValues;

/// Shared tokio runtime for tests that drive async operations synchronously.
pub static SHARED_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("Failed to create tokio runtime for test utilities"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Execute,
    Batch,
}

/// One recorded call. `sql` is what reached the client, i.e. with `@Pn`
/// placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<RowValues>,
}

impl Call {
    #[must_use]
    pub fn is_catalog(&self) -> bool {
        [TABLES_MARKER, COLUMNS_MARKER, PROCEDURES_MARKER, PARAMETERS_MARKER]
            .iter()
            .any(|marker| self.sql.starts_with(marker))
    }
}

/// What the handler answers: result sets for queries, a row count for
/// statements.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub sets: Vec<ResultSet>,
    pub rows_affected: u64,
}

impl MockReply {
    #[must_use]
    pub fn sets(sets: Vec<ResultSet>) -> Self {
        Self {
            sets,
            rows_affected: 0,
        }
    }

    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            sets: Vec::new(),
            rows_affected,
        }
    }

    /// The `[insertId], [rowsAffected]` row appended by identity-aware writes.
    #[must_use]
    pub fn identity(insert_id: Option<i64>, rows_affected: u64) -> Self {
        let rows = i64::try_from(rows_affected).unwrap_or(i64::MAX);
        Self::sets(vec![result_set(
            &["insertId", "rowsAffected"],
            vec![vec![RowValues::from(insert_id), RowValues::Int(rows)]],
        )])
    }
}

type Handler = Arc<dyn Fn(&Call) -> Result<MockReply, SqlMiddlewareDbError> + Send + Sync>;

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    schemas: HashMap<String, SchemaModel>,
}

/// Cheap to clone; clones share recorded calls and registered schemas.
#[derive(Clone)]
pub struct MockSource {
    database: String,
    state: Arc<Mutex<MockState>>,
    handler: Option<Handler>,
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSource")
            .field("database", &self.database)
            .field("calls", &self.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl MockSource {
    #[must_use]
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
            handler: None,
        }
    }

    #[must_use]
    pub fn with_schema(self, database: &str, model: SchemaModel) -> Self {
        self.lock().schemas.insert(database.to_string(), model);
        self
    }

    /// Answer non-catalog calls. Without a handler queries return no result
    /// sets and statements report one affected row.
    #[must_use]
    pub fn with_handler(
        mut self,
        handler: impl Fn(&Call) -> Result<MockReply, SqlMiddlewareDbError> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// A [`Db`] over this source with its own empty cache.
    #[must_use]
    pub fn db(&self) -> Db {
        Db::new(self.clone(), SchemaCache::new())
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls other than schema introspection.
    #[must_use]
    pub fn statements(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| !call.is_catalog())
            .cloned()
            .collect()
    }

    /// How many times the table list was introspected.
    #[must_use]
    pub fn catalog_loads(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.sql.starts_with(TABLES_MARKER))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, call: Call) -> Result<MockReply, SqlMiddlewareDbError> {
        self.lock().calls.push(call.clone());
        if call.is_catalog() {
            return Ok(MockReply::sets(self.catalog(&call.sql)));
        }
        match &self.handler {
            Some(handler) => handler(&call),
            None => Ok(MockReply {
                sets: Vec::new(),
                rows_affected: 1,
            }),
        }
    }

    fn catalog(&self, sql: &str) -> Vec<ResultSet> {
        let state = self.lock();
        let model = state
            .schemas
            .iter()
            .find(|(database, _)| sql.contains(&format!("{}.sys.", quote_ident(database))))
            .map(|(_, model)| model.clone())
            .unwrap_or_default();
        drop(state);
        vec![catalog_rows(sql, &model)]
    }
}

fn text(value: &str) -> RowValues {
    RowValues::Text(value.to_string())
}

/// Rows shaped like the loader's catalog queries. Types are passed through as
/// `typeName` with zero lengths, so declaration text round-trips.
fn catalog_rows(sql: &str, model: &SchemaModel) -> ResultSet {
    if sql.starts_with(TABLES_MARKER) {
        result_set(
            &["objectId", "name", "schemaName", "description"],
            model
                .tables
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    vec![
                        RowValues::Int(i64::try_from(i).unwrap_or_default()),
                        text(&t.name),
                        text(&t.schema),
                        RowValues::from(t.description.clone()),
                    ]
                })
                .collect(),
        )
    } else if sql.starts_with(COLUMNS_MARKER) {
        result_set(
            &[
                "schemaName",
                "tableName",
                "columnName",
                "isIdentity",
                "isPrimaryKey",
                "typeName",
                "maxLength",
                "precision",
                "scale",
                "isNullable",
            ],
            model
                .tables
                .iter()
                .flat_map(|t| {
                    t.columns.iter().map(move |c| {
                        vec![
                            text(&t.schema),
                            text(&t.name),
                            text(&c.column_name),
                            RowValues::Bool(c.auto_increment),
                            RowValues::Bool(c.primary_key),
                            text(&c.data_type),
                            RowValues::Int(0),
                            RowValues::Int(0),
                            RowValues::Int(0),
                            RowValues::Bool(c.nullable),
                        ]
                    })
                })
                .collect(),
        )
    } else if sql.starts_with(PROCEDURES_MARKER) {
        result_set(
            &["objectId", "name", "schemaName"],
            model
                .procedures
                .iter()
                .map(|p| vec![RowValues::Int(p.object_id), text(&p.name), text(&p.schema)])
                .collect(),
        )
    } else {
        result_set(
            &[
                "objectId",
                "name",
                "parameterMode",
                "typeName",
                "maxLength",
                "precision",
                "scale",
            ],
            model
                .procedures
                .iter()
                .flat_map(|p| {
                    p.pars.iter().map(move |par| {
                        let mode = match par.parameter_mode {
                            ParameterMode::In => "in",
                            ParameterMode::Out => "out",
                        };
                        vec![
                            RowValues::Int(p.object_id),
                            text(&par.name),
                            text(mode),
                            text(&par.data_type),
                            RowValues::Int(0),
                            RowValues::Int(0),
                            RowValues::Int(0),
                        ]
                    })
                })
                .collect(),
        )
    }
}

/// Build a result set from column names and rows.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}

#[async_trait]
impl ClientSource for MockSource {
    async fn acquire(&self) -> Result<Box<dyn SqlClient>, SqlMiddlewareDbError> {
        Ok(Box::new(MockClient {
            source: self.clone(),
        }))
    }

    fn default_database(&self) -> &str {
        &self.database
    }
}

struct MockClient {
    source: MockSource,
}

#[async_trait]
impl SqlClient for MockClient {
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<ResultSet>, SqlMiddlewareDbError> {
        let call = Call {
            kind: CallKind::Query,
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        Ok(self.source.respond(call)?.sets)
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<u64, SqlMiddlewareDbError> {
        let call = Call {
            kind: CallKind::Execute,
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        Ok(self.source.respond(call)?.rows_affected)
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMiddlewareDbError> {
        let call = Call {
            kind: CallKind::Batch,
            sql: sql.to_string(),
            params: Vec::new(),
        };
        self.source.respond(call).map(|_| ())
    }
}
