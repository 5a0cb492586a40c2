//! Introspected table and procedure metadata, and the cache that holds it.

mod cache;
mod loader;
mod model;

pub use cache::SchemaCache;
pub use loader::{clear_schema, declaration_type, get_schema, load_schema};
pub(crate) use loader::{COLUMNS_MARKER, PARAMETERS_MARKER, PROCEDURES_MARKER, TABLES_MARKER};
pub use model::{
    Column, DEFAULT_SCHEMA, ParameterMode, Procedure, ProcedureParameter, SchemaModel, Table,
};
