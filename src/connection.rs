use std::fmt;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::{DriverError, MiddlewareError};
use crate::results::ResultSet;
use crate::types::{ServerType, Value};

/// One physical link to a MySQL server, as provided by the underlying driver.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a statement without parameters.
    async fn query(&mut self, sql: &str) -> Result<ResultSet, DriverError>;

    /// Prepare `sql` and execute it with positional parameters.
    async fn exec(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError>;

    async fn begin(&mut self) -> Result<(), DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;
}

/// Opens physical links by host name.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// A driver link tagged with the role of the server it reached, plus nested transaction state.
///
/// Only the outermost `begin`/`commit` pair reaches the server; inner pairs just move the depth.
pub struct Connection {
    host: String,
    server_type: ServerType,
    link: Box<dyn DriverConnection>,
    tx_depth: usize,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("server_type", &self.server_type)
            .field("tx_depth", &self.tx_depth)
            .finish_non_exhaustive()
    }
}

impl Connection {
    #[must_use]
    pub fn new(host: impl Into<String>, server_type: ServerType, link: Box<dyn DriverConnection>) -> Self {
        Self {
            host: host.into(),
            server_type,
            link,
            tx_depth: 0,
        }
    }

    /// Host this link is connected to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Role of the server actually reached, which is `Primary` after a replica failover.
    #[must_use]
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.tx_depth
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx_depth > 0
    }

    /// Liveness probe.
    ///
    /// # Errors
    /// Returns the driver error if the server does not answer.
    pub async fn ping(&mut self) -> Result<ResultSet, MiddlewareError> {
        self.execute("SELECT 1", &[]).await
    }

    /// Run `sql`, preparing it when there are parameters to bind.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Driver` on any driver failure.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, MiddlewareError> {
        let result = if params.is_empty() {
            self.link.query(sql).await
        } else {
            self.link.exec(sql, params).await
        };
        Ok(result?)
    }

    /// Open a transaction, or a nested level inside the current one.
    ///
    /// Returns whether the physical `BEGIN` succeeded; nested levels always report `true`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Driver` if the physical `BEGIN` fails.
    pub async fn begin(&mut self) -> Result<bool, MiddlewareError> {
        if self.tx_depth == 0 {
            self.link.begin().await?;
        }
        self.tx_depth += 1;
        Ok(true)
    }

    /// Close the current transaction level; the outermost level commits on the server.
    ///
    /// # Errors
    /// Returns `MiddlewareError::TransactionState` without a matching `begin`, or
    /// `MiddlewareError::Driver` if the physical `COMMIT` fails.
    pub async fn commit(&mut self) -> Result<bool, MiddlewareError> {
        match self.tx_depth {
            0 => {
                return Err(MiddlewareError::TransactionState(
                    "You cannot make commit without begin".into(),
                ));
            }
            1 => self.link.commit().await?,
            _ => {}
        }
        self.tx_depth -= 1;
        Ok(true)
    }

    /// Roll back the outermost transaction. Rolling back a nested level is refused.
    ///
    /// # Errors
    /// Returns `MiddlewareError::TransactionState` unless exactly one level is open, or
    /// `MiddlewareError::Driver` if the physical `ROLLBACK` fails.
    pub async fn rollback(&mut self) -> Result<bool, MiddlewareError> {
        if self.tx_depth != 1 {
            return Err(MiddlewareError::TransactionState(
                "Nested transaction is rolled back".into(),
            ));
        }
        self.link.rollback().await?;
        self.tx_depth = 0;
        Ok(true)
    }
}
