//! Single-connection manager with scoped open/close and explicit
//! transaction control.

use crate::config::ConnectionParams;
use crate::error::{BulkError, Result};
use crate::result::OperationResult;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

/// Tiberius client over a compat TCP stream.
pub type SqlClient = Client<Compat<TcpStream>>;

/// Owns exactly one physical connection to SQL Server.
///
/// `open`/`close` are idempotent; reopening never creates a second
/// connection. Dropping the manager clears the credentials it held.
pub struct BulkDatabase {
    params: ConnectionParams,
    client: Option<SqlClient>,
    broken: bool,
}

impl BulkDatabase {
    /// Build a manager from validated parameters.
    ///
    /// Validation runs before any I/O and names the first invalid field.
    pub fn new(params: ConnectionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            client: None,
            broken: false,
        })
    }

    /// Build a manager from a named connection string.
    pub fn from_name(name: &str, timeout: u32) -> Result<Self> {
        let params = ConnectionParams::resolve(name, timeout)?;
        Self::new(params)
    }

    /// Configured command/bulk-copy timeout in seconds.
    pub fn timeout(&self) -> u32 {
        self.params.timeout
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.params.server);
        config.port(self.params.port);
        config.database(&self.params.catalog);
        config.authentication(AuthMethod::sql_server(
            &self.params.username,
            &self.params.password,
        ));
        // Legacy connection strings do not enable TLS.
        config.encryption(EncryptionLevel::NotSupported);
        config
    }

    /// Open the physical connection. No-op when already open.
    pub async fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write()).await?;
        info!(
            "Connected to MSSQL: {}:{}/{}",
            self.params.server, self.params.port, self.params.catalog
        );
        self.client = Some(client);
        Ok(())
    }

    /// Close the physical connection. No-op when already closed.
    ///
    /// A session marked broken is dropped without the closing handshake;
    /// the server discards its uncommitted work when the socket goes away.
    pub async fn close(&mut self) -> Result<()> {
        if self.broken {
            if self.client.take().is_some() {
                debug!("Dropped broken connection to {}", self.params.server);
            }
            self.broken = false;
            return Ok(());
        }
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!("Closed connection to {}", self.params.server);
        }
        Ok(())
    }

    /// Mark the session as unable to accept further batches.
    pub(crate) fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Access the open connection.
    pub fn client(&mut self) -> Result<&mut SqlClient> {
        self.client
            .as_mut()
            .ok_or_else(|| BulkError::Config("connection is not open".into()))
    }

    /// Execute a single non-query statement, converting failure into a
    /// result instead of an error.
    pub async fn execute_non_query(&mut self, sql: &str) -> OperationResult {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return OperationResult::from_error(&e),
        };
        match client.execute(sql, &[]).await {
            Ok(_) => OperationResult::ok(),
            Err(e) => OperationResult::fail(e.to_string()),
        }
    }

    /// Begin a read-uncommitted transaction on the owned connection.
    pub async fn begin_transaction(&mut self) -> Result<Transaction<'_>> {
        let client = self.client()?;
        run_batch(
            client,
            "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED; BEGIN TRANSACTION",
        )
        .await?;
        debug!("Began read-uncommitted transaction");
        Ok(Transaction {
            db: self,
            finished: false,
            poisoned: false,
        })
    }
}

impl Drop for BulkDatabase {
    fn drop(&mut self) {
        // Do not retain secrets past the manager's lifetime.
        self.params.clear();
    }
}

/// An in-flight transaction on a [`BulkDatabase`] connection.
///
/// Statements executed through the same session participate in the
/// transaction until `commit` or `rollback` runs.
pub struct Transaction<'a> {
    db: &'a mut BulkDatabase,
    finished: bool,
    poisoned: bool,
}

impl Transaction<'_> {
    /// Access the transaction's connection.
    pub fn client(&mut self) -> Result<&mut SqlClient> {
        self.db.client()
    }

    /// Configured timeout of the underlying connection, in seconds.
    pub fn timeout(&self) -> u32 {
        self.db.timeout()
    }

    /// Execute a statement inside the transaction, converting failure into
    /// a result.
    pub async fn execute_non_query(&mut self, sql: &str) -> OperationResult {
        self.db.execute_non_query(sql).await
    }

    /// Mark the session as stuck inside a cancelled bulk-load exchange.
    ///
    /// A poisoned transaction can no longer commit; rollback becomes a
    /// no-op batch-wise, relying on connection teardown to discard the
    /// uncommitted work server-side.
    pub(crate) fn poison(&mut self) {
        self.poisoned = true;
        self.db.mark_broken();
    }

    /// Commit the transaction.
    pub async fn commit(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(BulkError::sql(
                "COMMIT TRANSACTION",
                "session is unusable after a cancelled bulk load",
            ));
        }
        let client = self.db.client()?;
        run_batch(client, "COMMIT TRANSACTION").await?;
        self.finished = true;
        debug!("Committed transaction");
        Ok(())
    }

    /// Roll the transaction back. Safe to call when the server already
    /// aborted it.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.poisoned {
            self.finished = true;
            warn!("Session unusable after cancelled bulk load; dropping the connection discards the transaction");
            return Ok(());
        }
        let client = self.db.client()?;
        run_batch(client, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await?;
        self.finished = true;
        debug!("Rolled back transaction");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Rollback needs an await; the session drop will discard the
            // uncommitted work server-side when the connection closes.
            warn!("Transaction dropped without commit or rollback");
        }
    }
}

/// Run a batch and drain its token stream.
async fn run_batch(client: &mut SqlClient, sql: &str) -> Result<()> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PORT;

    fn params(timeout: u32) -> ConnectionParams {
        ConnectionParams {
            server: "localhost".to_string(),
            catalog: "sales".to_string(),
            username: "sa".to_string(),
            password: "password".to_string(),
            timeout,
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn test_new_validates_before_io() {
        // Timeout below 30 must fail before any connection attempt.
        let err = match BulkDatabase::new(params(10)) {
            Ok(_) => panic!("timeout below 30 must not validate"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_new_accepts_valid_params() {
        let db = BulkDatabase::new(params(60)).unwrap();
        assert!(!db.is_open());
        assert_eq!(db.timeout(), 60);
    }

    #[test]
    fn test_client_requires_open_connection() {
        let mut db = BulkDatabase::new(params(60)).unwrap();
        assert!(db.client().is_err());
    }

    #[tokio::test]
    async fn test_poisoned_transaction_skips_batches() {
        // The connection was never opened, so any attempt to send a batch
        // would fail; rollback on a poisoned transaction must not try.
        let mut db = BulkDatabase::new(params(60)).unwrap();
        let mut tx = Transaction {
            db: &mut db,
            finished: false,
            poisoned: false,
        };
        tx.poison();
        assert!(tx.rollback().await.is_ok());

        let err = match tx.commit().await {
            Ok(()) => panic!("poisoned transaction must not commit"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("unusable"));
    }

    #[tokio::test]
    async fn test_close_on_broken_session_skips_handshake() {
        // No client to hand-shake with; a broken session closes silently
        // and the manager is reusable afterwards.
        let mut db = BulkDatabase::new(params(60)).unwrap();
        db.mark_broken();
        assert!(db.close().await.is_ok());
        assert!(!db.is_open());
    }
}
