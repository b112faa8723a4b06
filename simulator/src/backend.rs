use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mysql_middleware::config::Credentials;
use mysql_middleware::error::{CR_SERVER_GONE_ERROR, CR_SERVER_LOST};
use mysql_middleware::test_utils::CR_CONN_HOST_ERROR;
use mysql_middleware::{Connector, DriverConnection, DriverError, ResultSet, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::Event;

struct Faults {
    rng: ChaCha8Rng,
    replicas: HashSet<String>,
    replica_failure_rate: f64,
    transient_rate: f64,
    events: Vec<Event>,
}

/// In-process stand-in for a MySQL fleet. Replicas refuse connections and
/// statements fail with transient codes at seeded rates.
#[derive(Clone)]
pub(crate) struct SimConnector {
    faults: Arc<Mutex<Faults>>,
}

impl SimConnector {
    pub(crate) fn new(
        seed: u64,
        replicas: impl IntoIterator<Item = String>,
        replica_failure_rate: f64,
        transient_rate: f64,
    ) -> Self {
        Self {
            faults: Arc::new(Mutex::new(Faults {
                rng: ChaCha8Rng::seed_from_u64(seed),
                replicas: replicas.into_iter().collect(),
                replica_failure_rate,
                transient_rate,
                events: Vec::new(),
            })),
        }
    }

    pub(crate) fn is_replica(&self, host: &str) -> bool {
        lock(&self.faults).replicas.contains(host)
    }

    /// Events recorded since the previous call.
    pub(crate) fn drain_events(&self) -> Vec<Event> {
        std::mem::take(&mut lock(&self.faults).events)
    }
}

fn lock(faults: &Mutex<Faults>) -> MutexGuard<'_, Faults> {
    match faults.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Connector for SimConnector {
    async fn connect(
        &self,
        host: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let mut faults = lock(&self.faults);
        let rate = faults.replica_failure_rate;
        let refused = faults.replicas.contains(host) && faults.rng.random_bool(rate);
        faults.events.push(Event::Connect {
            host: host.to_string(),
            refused,
        });
        if refused {
            return Err(DriverError::with_code(
                CR_CONN_HOST_ERROR,
                format!("Can't connect to MySQL server on '{host}'"),
            ));
        }
        Ok(Box::new(SimLink {
            host: host.to_string(),
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct SimLink {
    host: String,
    faults: Arc<Mutex<Faults>>,
}

impl SimLink {
    fn run(&self, sql: &str) -> Result<ResultSet, DriverError> {
        let mut faults = lock(&self.faults);
        let rate = faults.transient_rate;
        let failed = faults.rng.random_bool(rate);
        let lost = faults.rng.random_bool(0.5);
        faults.events.push(Event::Statement {
            host: self.host.clone(),
            sql: sql.to_string(),
            failed,
        });
        if failed {
            return Err(if lost {
                DriverError::with_code(CR_SERVER_LOST, "Lost connection to MySQL server during query")
            } else {
                DriverError::with_code(CR_SERVER_GONE_ERROR, "MySQL server has gone away")
            });
        }
        if sql.starts_with("SELECT") {
            let mut result = ResultSet::with_columns(vec!["id".to_string()]);
            result.add_row_values(vec![Value::Int(1)]);
            Ok(result)
        } else {
            Ok(ResultSet::affected(1, None))
        }
    }
}

#[async_trait]
impl DriverConnection for SimLink {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        self.run(sql)
    }

    async fn exec(&mut self, sql: &str, _params: &[Value]) -> Result<ResultSet, DriverError> {
        self.run(sql)
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.run("BEGIN").map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.run("COMMIT").map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.run("ROLLBACK").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn primaries_never_refuse() {
        let connector = SimConnector::new(1, ["replica".to_string()], 1.0, 0.0);
        let credentials = Credentials {
            user: "sim".into(),
            password: "sim".into(),
        };
        assert!(connector.connect("primary", &credentials).await.is_ok());
        assert!(connector.connect("replica", &credentials).await.is_err());
        assert_eq!(
            connector.drain_events(),
            vec![
                Event::Connect { host: "primary".into(), refused: false },
                Event::Connect { host: "replica".into(), refused: true },
            ]
        );
        assert!(connector.drain_events().is_empty());
    }
}
