//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that
//! `use mysql_middleware::prelude::*;` is enough to route, pool and query.

pub use crate::cache::{Cache, FailureStatistics, MemoryCache};
pub use crate::config::{Configuration, Credentials, PoolOptions};
pub use crate::connection::{Connection, Connector, DriverConnection};
pub use crate::criteria::{Comparator, Criteria, CriteriaMeta, MetaKey, SortOrder};
pub use crate::error::{DriverError, MiddlewareError};
pub use crate::pool::Pool;
pub use crate::query::{Query, RetryPolicy, Statement};
pub use crate::results::{ResultSet, Row};
pub use crate::routing::{Route, Routing, TableEntry};
pub use crate::types::{ServerType, Value};

#[cfg(feature = "mysql")]
pub use crate::mysql::MysqlConnector;
