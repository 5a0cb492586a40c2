use std::fmt;

use deadpool::managed::{Manager, Metrics, RecycleResult};
use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use super::client::MssqlClient;
use super::config::{MssqlOptions, build_tiberius_config};

/// Rolls back anything a dropped transaction left open, then pings.
const RECYCLE_SQL: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION; SELECT 1";

/// Manager for SQL Server connections (used with Deadpool)
#[derive(Clone)]
pub struct MssqlManager {
    config: tiberius::Config,
    server: String,
    port: u16,
    named_instance: bool,
}

impl fmt::Debug for MssqlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlManager")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("named_instance", &self.named_instance)
            .finish()
    }
}

impl MssqlManager {
    #[must_use]
    pub fn new(opts: &MssqlOptions) -> Self {
        Self {
            config: build_tiberius_config(opts),
            server: opts.server.clone(),
            port: opts.port,
            named_instance: opts.instance_name.is_some(),
        }
    }
}

impl Manager for MssqlManager {
    type Type = MssqlClient;
    type Error = tiberius::error::Error;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let tcp = if self.named_instance {
            TcpStream::connect_named(&self.config).await?
        } else {
            TcpStream::connect(self.config.get_addr()).await?
        };
        tcp.set_nodelay(true)?;
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn recycle(&self, client: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        client.simple_query(RECYCLE_SQL).await?.into_results().await?;
        Ok(())
    }
}
