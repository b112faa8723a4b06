//! Data-access middleware for sharded MySQL deployments.
//!
//! - [`Routing`] turns a logical table plus request metadata into a physical `database.table`.
//! - [`Pool`] keeps one connection per host and role, picks healthy replicas and fails over to
//!   the primary, sharing replica failure counts through a [`Cache`].
//! - [`Query`] compiles a [`Criteria`] into parameterized SQL and runs it, reconnecting once
//!   when the server went away.

pub mod cache;
pub mod config;
pub mod connection;
pub mod criteria;
pub mod error;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod results;
pub mod routing;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{Cache, FailureStatistics, MemoryCache};
pub use config::{Configuration, Credentials, PoolOptions};
pub use connection::{Connection, Connector, DriverConnection};
pub use criteria::{
    Aggregation, Comparator, Condition, Criteria, CriteriaMeta, MetaKey, SortOrder, UpsertEntry,
};
pub use error::{DriverError, MiddlewareError};
pub use pool::Pool;
pub use query::{Query, RetryPolicy, Statement};
pub use results::{ResultSet, Row};
pub use routing::{Route, Routing, ShardOption, TableEntry};
pub use types::{ServerType, Value};
