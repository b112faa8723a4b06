use async_trait::async_trait;
use mysql_async::prelude::{Protocol, Queryable};
use mysql_async::{Conn, QueryResult};

use super::config::build_opts;
use super::params::{from_mysql, to_params};
use crate::config::Credentials;
use crate::connection::{Connector, DriverConnection};
use crate::error::DriverError;
use crate::results::ResultSet;
use crate::types::Value;

/// Opens `mysql_async` connections, one physical link per call.
#[derive(Debug, Clone, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let opts =
            build_opts(host, credentials).map_err(|e| DriverError::new(None, e.to_string()))?;
        let conn = Conn::new(opts).await?;
        Ok(Box::new(MysqlLink { conn }))
    }
}

/// A single `mysql_async` connection.
pub struct MysqlLink {
    conn: Conn,
}

impl MysqlLink {
    /// Wrap an already opened connection.
    #[must_use]
    pub fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DriverConnection for MysqlLink {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        let result = self.conn.query_iter(sql).await?;
        Ok(build_result_set(result).await?)
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let result = self.conn.exec_iter(sql, to_params(params)).await?;
        Ok(build_result_set(result).await?)
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        Ok(self.conn.query_drop("BEGIN").await?)
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        Ok(self.conn.query_drop("COMMIT").await?)
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        Ok(self.conn.query_drop("ROLLBACK").await?)
    }
}

/// Drain the first result set of `result` into an owned [`ResultSet`].
///
/// # Errors
/// Returns the driver error raised while fetching rows.
pub async fn build_result_set<P: Protocol>(
    mut result: QueryResult<'_, 'static, P>,
) -> Result<ResultSet, mysql_async::Error> {
    let column_names: Vec<String> = result
        .columns()
        .map(|columns| {
            columns
                .iter()
                .map(|column| column.name_str().into_owned())
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<mysql_async::Row> = result.collect().await?;
    let mut result_set = if column_names.is_empty() {
        ResultSet::affected(result.affected_rows(), result.last_insert_id())
    } else {
        ResultSet::with_columns(column_names)
    };
    for mut row in rows {
        let values = (0..row.len())
            .map(|idx| row.take::<mysql_async::Value, _>(idx).map_or(Value::Null, from_mysql))
            .collect();
        result_set.add_row_values(values);
    }
    result.drop_result().await?;
    Ok(result_set)
}
