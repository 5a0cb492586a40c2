//! Schema-aware CRUD helpers for SQL Server.
//!
//! The first operation against a database introspects its tables, columns,
//! stored procedures and procedure parameters and caches the result. Writes
//! then build parameterized SQL from the cached schema, dropping any field
//! that is not a column of the target table (or a parameter of the target
//! procedure). Values are always bound; only schema-validated identifiers
//! reach SQL text.
//!
//! ```no_run
//! use mssql_middleware::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlMiddlewareDbError> {
//! let opts = MssqlOptions::new("localhost".into(), "app".into(), "sa".into(), "pw".into());
//! let db = connect(&opts, SchemaCache::global()).await?;
//!
//! let saved = insert(&db, &SaveParams::new("users", record! { "name" => "alice" }), None).await?;
//! let rows = select(&db, "SELECT * FROM users WHERE id = ?", &[RowValues::from(saved.insert_id)]).await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod client;
pub mod db;
pub mod delete;
pub mod error;
mod executor;
pub mod ident;
pub mod insert;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod params;
pub mod prelude;
pub mod procedure;
pub mod replace;
pub mod results;
pub mod save;
pub mod schema;
pub mod select;
pub mod statement;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transaction;
pub mod translation;
pub mod types;
pub mod update;
pub mod where_clause;

pub use error::SqlMiddlewareDbError;
pub use types::{QueryAndParams, Record, RowValues};
