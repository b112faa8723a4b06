//! In-memory driver used by the test suites.
//!
//! [`ScriptedConnector`] hands out links that record every statement and can be told to refuse
//! connections to chosen hosts or to fail upcoming statements with a given error code.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::config::Credentials;
use crate::connection::{Connector, DriverConnection};
use crate::error::DriverError;
use crate::results::ResultSet;
use crate::types::Value;

/// MySQL client error: "Can't connect to MySQL server".
pub const CR_CONN_HOST_ERROR: u16 = 2003;

/// One statement seen by a scripted link.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedStatement {
    pub host: String,
    /// Sequence number of the link that ran the statement (1 for the first connect).
    pub link_id: usize,
    pub sql: String,
    /// `None` for unprepared statements.
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Default)]
struct State {
    connects: Vec<String>,
    refused_hosts: HashSet<String>,
    pending_connect_errors: VecDeque<DriverError>,
    pending_errors: VecDeque<DriverError>,
    pending_results: VecDeque<ResultSet>,
    log: Vec<LoggedStatement>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<State>>,
}

impl ScriptedConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Refuse every future connection to `host`.
    pub fn refuse(&self, host: &str) {
        self.state().refused_hosts.insert(host.to_string());
    }

    /// Accept connections to `host` again.
    pub fn accept(&self, host: &str) {
        self.state().refused_hosts.remove(host);
    }

    /// Fail the next connection attempt (to any host) with `code`.
    pub fn fail_next_connect(&self, code: u16, message: &str) {
        self.state()
            .pending_connect_errors
            .push_back(DriverError::with_code(code, message));
    }

    /// Fail the next statement (on any link) with `code`.
    pub fn fail_next(&self, code: u16, message: &str) {
        self.state()
            .pending_errors
            .push_back(DriverError::with_code(code, message));
    }

    /// Return `result` from the next successful statement.
    pub fn respond_with(&self, result: ResultSet) {
        self.state().pending_results.push_back(result);
    }

    /// Hosts connected to, in order, including refused attempts.
    #[must_use]
    pub fn connects(&self) -> Vec<String> {
        self.state().connects.clone()
    }

    #[must_use]
    pub fn log(&self) -> Vec<LoggedStatement> {
        self.state().log.clone()
    }

    /// SQL text of the statements that ran on `host`.
    #[must_use]
    pub fn statements_on(&self, host: &str) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter(|entry| entry.host == host)
            .map(|entry| entry.sql.clone())
            .collect()
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        host: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let mut state = self.state();
        state.connects.push(host.to_string());
        if state.refused_hosts.contains(host) {
            return Err(DriverError::with_code(
                CR_CONN_HOST_ERROR,
                format!("Can't connect to MySQL server on '{host}'"),
            ));
        }
        if let Some(err) = state.pending_connect_errors.pop_front() {
            return Err(err);
        }
        Ok(Box::new(ScriptedLink {
            host: host.to_string(),
            link_id: state.connects.len(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedLink {
    host: String,
    link_id: usize,
    state: Arc<Mutex<State>>,
}

impl ScriptedLink {
    fn run(&self, sql: &str, params: Option<&[Value]>) -> Result<ResultSet, DriverError> {
        let mut state = lock(&self.state);
        state.log.push(LoggedStatement {
            host: self.host.clone(),
            link_id: self.link_id,
            sql: sql.to_string(),
            params: params.map(<[Value]>::to_vec),
        });
        if let Some(err) = state.pending_errors.pop_front() {
            return Err(err);
        }
        Ok(state.pending_results.pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl DriverConnection for ScriptedLink {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        self.run(sql, None)
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        self.run(sql, Some(params))
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.run("BEGIN", None).map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.run("COMMIT", None).map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.run("ROLLBACK", None).map(|_| ())
    }
}
