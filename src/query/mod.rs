//! Compilation of [`Criteria`] into parameterized SQL, and execution with transient-failure retry.

use crate::connection::Connection;
use crate::criteria::Criteria;
use crate::error::MiddlewareError;
use crate::pool::Pool;
use crate::results::ResultSet;
use crate::routing::{Route, Routing};
use crate::types::{ServerType, Value};

mod dml;
mod filter;
mod retry;
mod select;

pub use retry::RetryPolicy;

/// SQL text with its positional parameters and the place it must run.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub route: Route,
    pub server_type: ServerType,
}

/// Front door for data operations: routes criteria, compiles SQL and runs it through the pool.
///
/// Each `select`/`insert`/`update`/`delete`/`increment` has a `compile_*` counterpart that
/// only builds the [`Statement`].
///
/// ```rust
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use mysql_middleware::prelude::*;
/// use mysql_middleware::test_utils::ScriptedConnector;
///
/// let config = Configuration::new([("test", "localhost")], "user", "pw");
/// let pool = Pool::new(config, Arc::new(ScriptedConnector::new()), Arc::new(MemoryCache::new()));
/// let query = Query::new(pool, Routing::new("test", HashMap::new()));
///
/// let criteria = Criteria::new("trololo").filter("a", 1).limit(1);
/// let statement = query.compile_select(&criteria).unwrap();
/// assert_eq!(statement.sql, "SELECT * FROM test.trololo WHERE a=? LIMIT 1");
/// assert_eq!(statement.params, vec![Value::Int(1)]);
/// ```
#[derive(Debug)]
pub struct Query {
    pool: Pool,
    routing: Routing,
    retry: RetryPolicy,
}

impl Query {
    #[must_use]
    pub fn new(pool: Pool, routing: Routing) -> Self {
        Self {
            pool,
            routing,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        &mut self.pool
    }

    #[must_use]
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    /// Role requested by the criteria: a replica only when the metadata explicitly allows it.
    #[must_use]
    pub fn server_type(criteria: &Criteria) -> ServerType {
        if criteria.reads_from_replica() {
            ServerType::Replica
        } else {
            ServerType::Primary
        }
    }

    fn write_server_type(criteria: &Criteria) -> Result<ServerType, MiddlewareError> {
        match Self::server_type(criteria) {
            ServerType::Primary => Ok(ServerType::Primary),
            ServerType::Replica => Err(MiddlewareError::Query(
                "write queries can only run on primary".into(),
            )),
        }
    }

    /// # Errors
    /// Returns compile errors from [`Query::compile_select`] or the final execution error.
    pub async fn select(&mut self, criteria: &Criteria) -> Result<ResultSet, MiddlewareError> {
        let statement = self.compile_select(criteria)?;
        self.execute(&statement).await
    }

    /// # Errors
    /// Returns compile errors from [`Query::compile_insert`] or the final execution error.
    pub async fn insert(&mut self, criteria: &Criteria) -> Result<ResultSet, MiddlewareError> {
        let statement = self.compile_insert(criteria)?;
        self.execute(&statement).await
    }

    /// # Errors
    /// Returns compile errors from [`Query::compile_update`] or the final execution error.
    pub async fn update(&mut self, criteria: &Criteria) -> Result<ResultSet, MiddlewareError> {
        let statement = self.compile_update(criteria)?;
        self.execute(&statement).await
    }

    /// # Errors
    /// Returns compile errors from [`Query::compile_increment`] or the final execution error.
    pub async fn increment(&mut self, criteria: &Criteria) -> Result<ResultSet, MiddlewareError> {
        let statement = self.compile_increment(criteria)?;
        self.execute(&statement).await
    }

    /// # Errors
    /// Returns compile errors from [`Query::compile_delete`] or the final execution error.
    pub async fn delete(&mut self, criteria: &Criteria) -> Result<ResultSet, MiddlewareError> {
        let statement = self.compile_delete(criteria)?;
        self.execute(&statement).await
    }

    /// Run a compiled statement on its route's database.
    ///
    /// # Errors
    /// Returns the driver error once the retry policy gives up, or any connect error.
    pub async fn execute(&mut self, statement: &Statement) -> Result<ResultSet, MiddlewareError> {
        self.run(
            statement.route.database(),
            statement.server_type,
            &statement.sql,
            &statement.params,
        )
        .await
    }

    /// Live connection for the database the criteria routes to, verified with a ping.
    ///
    /// # Errors
    /// Returns routing errors, connect errors, or the ping failure once retries are exhausted.
    pub async fn get_connection(
        &mut self,
        criteria: &Criteria,
    ) -> Result<&mut Connection, MiddlewareError> {
        let route = self.routing.get_route(criteria)?;
        let server_type = Self::server_type(criteria);
        self.run(route.database(), server_type, "SELECT 1", &[]).await?;
        self.pool.connect(route.database(), server_type, false).await
    }

    async fn run(
        &mut self,
        database: &str,
        server_type: ServerType,
        sql: &str,
        params: &[Value],
    ) -> Result<ResultSet, MiddlewareError> {
        let mut force = false;
        let mut retries = 0;
        loop {
            // A link with an open transaction is never replaced: reconnecting would run the
            // statement outside the caller's transaction.
            let mut in_transaction = false;
            let attempt = match self.pool.connect(database, server_type, force).await {
                Ok(conn) => {
                    in_transaction = conn.in_transaction();
                    conn.execute(sql, params).await
                }
                Err(err) => Err(err),
            };
            match attempt {
                Ok(result) => return Ok(result),
                Err(err) if !in_transaction && self.retry.should_retry(&err, retries) => {
                    tracing::warn!("Reconnecting to {database} ({server_type}) after: {err}");
                    retries += 1;
                    force = true;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
