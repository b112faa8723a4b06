use std::fmt;

use thiserror::Error;

/// MySQL client error: "MySQL server has gone away".
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
/// MySQL client error: "Lost connection to MySQL server during query".
pub const CR_SERVER_LOST: u16 = 2013;

/// Error reported by the underlying driver, carrying the numeric MySQL error code when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: Option<u16>,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self::new(Some(code), message)
    }

    /// Whether the error means the link dropped and a fresh connection may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.code, Some(CR_SERVER_GONE_ERROR | CR_SERVER_LOST))
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Transaction error: {0}")]
    TransactionState(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MiddlewareError {
    /// Transient driver failures are the only errors the query layer retries.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Driver(err) if err.is_transient())
    }

    /// Numeric driver error code, if this is a driver error that carries one.
    #[must_use]
    pub fn driver_code(&self) -> Option<u16> {
        match self {
            Self::Driver(err) => err.code,
            _ => None,
        }
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DriverError {
    fn from(err: mysql_async::Error) -> Self {
        let code = match &err {
            mysql_async::Error::Server(server) => Some(server.code),
            mysql_async::Error::Io(_) => Some(CR_SERVER_LOST),
            mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => {
                Some(CR_SERVER_GONE_ERROR)
            }
            _ => None,
        };
        DriverError::new(code, err.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for MiddlewareError {
    fn from(err: mysql_async::Error) -> Self {
        MiddlewareError::Driver(err.into())
    }
}
