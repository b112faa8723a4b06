use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MiddlewareError;

/// Cache key under which replica failure statistics are stored.
pub const DEFAULT_FAILURES_KEY: &str = "mysql_replica_failures";
/// Replicas with more recorded failures than this are skipped.
pub const DEFAULT_MAX_FAILURES: u32 = 15;
/// Lifetime of the failure statistics in the cache.
pub const DEFAULT_FAILURE_TTL: Duration = Duration::from_secs(60);

/// User name and password used for every link the pool opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Mapping of logical database names onto hosts, plus replica hosts per primary host.
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let config = Configuration::new([("linguadb", "db-master-1")], "root", "secret")
///     .with_replicas("db-master-1", ["db-replica-1", "db-replica-2"]);
/// assert_eq!(config.get_host("linguadb").unwrap(), "db-master-1");
/// assert_eq!(config.replicas_of("db-master-1").len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    hosts: HashMap<String, String>,
    #[serde(flatten)]
    credentials: Credentials,
    #[serde(default)]
    replicas: HashMap<String, Vec<String>>,
}

impl Configuration {
    #[must_use]
    pub fn new<I, K, V>(hosts: I, user: impl Into<String>, password: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|(db, host)| (db.into(), host.into()))
                .collect(),
            credentials: Credentials {
                user: user.into(),
                password: password.into(),
            },
            replicas: HashMap::new(),
        }
    }

    /// Register the replica hosts serving reads for `host`.
    #[must_use]
    pub fn with_replicas<I, S>(mut self, host: impl Into<String>, replicas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replicas
            .insert(host.into(), replicas.into_iter().map(Into::into).collect());
        self
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Serialization` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, MiddlewareError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Io` if the file cannot be read or
    /// `MiddlewareError::Serialization` if it is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MiddlewareError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.credentials.user
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.credentials.password
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the host serving `dbname`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Configuration` if no host is mapped for the database.
    pub fn get_host(&self, dbname: &str) -> Result<&str, MiddlewareError> {
        match self.hosts.get(dbname) {
            Some(host) if !host.is_empty() => Ok(host),
            _ => Err(MiddlewareError::Configuration(format!(
                "Host is not defined for {dbname} database"
            ))),
        }
    }

    /// Replica hosts configured for a primary host; empty when none are known.
    #[must_use]
    pub fn replicas_of(&self, host: &str) -> &[String] {
        self.replicas
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Tuning knobs for replica selection and failure tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub max_failures: u32,
    #[serde(with = "duration_secs")]
    pub failure_ttl: Duration,
    pub failures_key: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            failure_ttl: DEFAULT_FAILURE_TTL,
            failures_key: DEFAULT_FAILURES_KEY.to_string(),
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    #[must_use]
    pub fn with_failure_ttl(mut self, failure_ttl: Duration) -> Self {
        self.failure_ttl = failure_ttl;
        self
    }

    #[must_use]
    pub fn with_failures_key(mut self, key: impl Into<String>) -> Self {
        self.failures_key = key.into();
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
