use std::fmt;

use serde::Deserialize;
use tiberius::{AuthMethod, Config as TiberiusConfig};

use crate::db::Db;
use crate::error::SqlMiddlewareDbError;
use crate::schema::SchemaCache;

fn default_port() -> u16 {
    1433
}

fn default_trust_cert() -> bool {
    true
}

fn default_pool_max_size() -> usize {
    20
}

/// Options for connecting to SQL Server.
///
/// Deserializable from JSON (or any serde format) with camelCase keys;
/// `port`, `instanceName`, `trustCert` and `poolMaxSize` are optional.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MssqlOptions {
    pub server: String,
    /// Default database for operations that do not name one.
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Named instance, resolved through the SQL Browser service.
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default = "default_trust_cert")]
    pub trust_cert: bool,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,
}

impl fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("instance_name", &self.instance_name)
            .field("trust_cert", &self.trust_cert)
            .field("pool_max_size", &self.pool_max_size)
            .finish_non_exhaustive()
    }
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: default_port(),
            instance_name: None,
            trust_cert: default_trust_cert(),
            pool_max_size: default_pool_max_size(),
        }
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` for malformed JSON or
    /// missing required keys.
    pub fn from_json(json: &str) -> Result<Self, SqlMiddlewareDbError> {
        serde_json::from_str(json)
            .map_err(|e| SqlMiddlewareDbError::ConfigError(format!("invalid SQL Server options: {e}")))
    }
}

/// Fluent builder for [`MssqlOptions`].
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.opts.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn pool_max_size(mut self, pool_max_size: usize) -> Self {
        self.opts.pool_max_size = pool_max_size;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }

    /// Build the pool and wrap it in a [`Db`] reading from `cache`.
    ///
    /// # Errors
    /// Same as [`connect`](super::connect).
    pub async fn build(self, cache: SchemaCache) -> Result<Db, SqlMiddlewareDbError> {
        super::connect(&self.finish(), cache).await
    }
}

pub(crate) fn build_tiberius_config(opts: &MssqlOptions) -> TiberiusConfig {
    let mut config = TiberiusConfig::new();
    config.host(&opts.server);
    config.database(&opts.database);
    config.port(opts.port);
    config.authentication(AuthMethod::sql_server(&opts.user, &opts.password));
    if let Some(instance) = &opts.instance_name {
        config.instance_name(instance);
    }
    if opts.trust_cert {
        config.trust_cert();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let opts = MssqlOptions::from_json(
            r#"{"server":"localhost","database":"app","user":"sa","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(opts.port, 1433);
        assert_eq!(opts.pool_max_size, 20);
        assert!(opts.trust_cert);
        assert!(opts.instance_name.is_none());
    }

    #[test]
    fn json_missing_key_is_config_error() {
        let err = MssqlOptions::from_json(r#"{"server":"localhost"}"#).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)));
    }

    #[test]
    fn builder_and_debug_hides_password() {
        let opts = MssqlOptionsBuilder::new("h".into(), "d".into(), "u".into(), "secret".into())
            .port(14333)
            .instance_name(Some("SQLEXPRESS".into()))
            .pool_max_size(4)
            .finish();
        assert_eq!(opts.port, 14333);
        assert_eq!(opts.pool_max_size, 4);
        assert!(!format!("{opts:?}").contains("secret"));
    }
}
