//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::audit::{AuditField, AuditFields, AuditValue};
pub use crate::client::{ClientSource, SqlClient};
pub use crate::db::Db;
pub use crate::delete::{delete, delete_by_where};
pub use crate::error::{ObjectKind, SqlMiddlewareDbError};
pub use crate::insert::insert;
pub use crate::params::{ProcedureParams, ProcedureResult, SaveParams, SaveResult};
pub use crate::procedure::{exec, execs};
pub use crate::record;
pub use crate::replace::replace;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::save::{SaveItem, SaveType, save, saves, saves_seq, saves_seq_with_tran};
pub use crate::schema::{SchemaCache, SchemaModel, clear_schema, get_schema};
pub use crate::select::{
    Page, select, select_base, select_count, select_one_value, select_split_page, select_top1,
    selects,
};
pub use crate::transaction::{Tx, begin_transaction};
pub use crate::types::{QueryAndParams, Record, RowValues};
pub use crate::update::{update, update_by_where};
pub use crate::where_clause::{WhereClause, get_where_sql};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlClient, MssqlOptions, MssqlOptionsBuilder, MssqlPool, connect, create_mssql_client};
