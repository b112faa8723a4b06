//! Connection cache keyed by host and server role, with replica selection and failover.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use rand::Rng;

use crate::cache::{Cache, FailureStatistics};
use crate::config::{Configuration, PoolOptions};
use crate::connection::{Connection, Connector};
use crate::error::MiddlewareError;
use crate::types::ServerType;

/// Keeps at most one live connection per `(host, role)`.
///
/// Replica requests go to a randomly chosen healthy replica of the database's host. A replica
/// that refuses the connection gets a failure recorded in the shared statistics, and the request
/// is served by the primary instead. Replicas whose failure count exceeds
/// [`PoolOptions::max_failures`] are skipped until the statistics expire.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), mysql_middleware::MiddlewareError> {
/// use std::sync::Arc;
/// use mysql_middleware::prelude::*;
///
/// let config = Configuration::new([("linguadb", "db-master-1")], "app", "secret")
///     .with_replicas("db-master-1", ["db-replica-1"]);
/// let mut pool = Pool::mysql(config, Arc::new(MemoryCache::new()));
/// let conn = pool.connect("linguadb", ServerType::Replica, false).await?;
/// conn.ping().await?;
/// # Ok(()) }
/// ```
pub struct Pool {
    hosts: HostConnector,
    connections: HashMap<(String, ServerType), Connection>,
}

/// Everything needed to open a link to a host, kept apart from the connection cache.
struct HostConnector {
    config: Arc<Configuration>,
    connector: Arc<dyn Connector>,
    cache: Arc<dyn Cache>,
    options: PoolOptions,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("options", &self.hosts.options)
            .field("connections", &self.connections.values().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Pool {
    #[must_use]
    pub fn new(config: Configuration, connector: Arc<dyn Connector>, cache: Arc<dyn Cache>) -> Self {
        Self {
            hosts: HostConnector {
                config: Arc::new(config),
                connector,
                cache,
                options: PoolOptions::default(),
            },
            connections: HashMap::new(),
        }
    }

    /// Pool backed by the `mysql_async` driver.
    #[cfg(feature = "mysql")]
    #[must_use]
    pub fn mysql(config: Configuration, cache: Arc<dyn Cache>) -> Self {
        Self::new(config, Arc::new(crate::mysql::MysqlConnector::new()), cache)
    }

    #[must_use]
    pub fn with_options(mut self, options: PoolOptions) -> Self {
        self.hosts.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.hosts.options
    }

    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.hosts.config
    }

    /// Connection for `database` on a server of the requested role.
    ///
    /// The cached link is reused unless `force` is set or none exists yet. The returned
    /// connection reports the role it actually reached, which is `Primary` after a failover.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Configuration` if the database has no host, or
    /// `MiddlewareError::Driver` if the primary cannot be reached.
    pub async fn connect(
        &mut self,
        database: &str,
        server_type: ServerType,
        force: bool,
    ) -> Result<&mut Connection, MiddlewareError> {
        let Self { hosts, connections } = self;
        let host = hosts.config.get_host(database)?.to_string();

        match connections.entry((host, server_type)) {
            Entry::Occupied(mut slot) => {
                if force {
                    let fresh = hosts.connect_host(&slot.key().0, server_type).await?;
                    slot.insert(fresh);
                }
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => {
                let fresh = hosts.connect_host(&slot.key().0, server_type).await?;
                Ok(slot.insert(fresh))
            }
        }
    }

    /// Connection to the primary serving `database`.
    ///
    /// # Errors
    /// See [`Pool::connect`].
    #[deprecated(note = "use `Pool::connect` with an explicit `ServerType`")]
    pub async fn connect_primary(
        &mut self,
        database: &str,
        force: bool,
    ) -> Result<&mut Connection, MiddlewareError> {
        tracing::warn!(
            "Pool::connect_primary is deprecated, use Pool::connect with ServerType::Primary ({database})"
        );
        self.connect(database, ServerType::Primary, force).await
    }

    /// Current replica failure statistics.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Serialization` if the cached document is corrupt.
    pub async fn failure_statistics(&self) -> Result<FailureStatistics, MiddlewareError> {
        FailureStatistics::load(self.hosts.cache.as_ref(), &self.hosts.options.failures_key).await
    }

    /// Number of cached links.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop every cached link.
    pub fn disconnect_all(&mut self) {
        self.connections.clear();
    }
}

impl HostConnector {
    /// Open a link to `host` (or one of its replicas), falling back to the primary when no
    /// replica can serve the request.
    async fn connect_host(
        &self,
        host: &str,
        requested: ServerType,
    ) -> Result<Connection, MiddlewareError> {
        let mut server_type = requested;
        loop {
            let target = match server_type {
                ServerType::Primary => host.to_string(),
                ServerType::Replica => match self.available_replica(host).await {
                    Some(replica) => replica,
                    None => {
                        tracing::info!("No replica is available for {host}, using primary");
                        server_type = ServerType::Primary;
                        continue;
                    }
                },
            };

            match self
                .connector
                .connect(&target, self.config.credentials())
                .await
            {
                Ok(link) => return Ok(Connection::new(target, server_type, link)),
                Err(err) if server_type == ServerType::Replica => {
                    let failures = self.record_failure(&target).await?;
                    tracing::error!(
                        "Replica {target} of {host} failed ({failures} failures recorded), using primary: {err}"
                    );
                    server_type = ServerType::Primary;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Pick a random replica of `host` whose failure count is within the threshold.
    async fn available_replica(&self, host: &str) -> Option<String> {
        let replicas = self.config.replicas_of(host);
        if replicas.is_empty() {
            return None;
        }
        let stats = self.load_statistics().await;
        let eligible: Vec<&String> = replicas
            .iter()
            .filter(|replica| stats.failures(replica) <= self.options.max_failures)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..eligible.len());
        Some(eligible[idx].clone())
    }

    /// Add one failure for `replica` and rewrite the statistics.
    ///
    /// The statistics are read and rewritten as a whole without compare-and-swap, so two
    /// processes recording failures at the same time can lose one of the increments.
    async fn record_failure(&self, replica: &str) -> Result<u32, MiddlewareError> {
        let mut stats = self.load_statistics().await;
        let failures = stats.increment(replica);
        stats
            .store(
                self.cache.as_ref(),
                &self.options.failures_key,
                self.options.failure_ttl,
            )
            .await?;
        Ok(failures)
    }

    async fn load_statistics(&self) -> FailureStatistics {
        match FailureStatistics::load(self.cache.as_ref(), &self.options.failures_key).await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!("Discarding unreadable replica failure statistics: {err}");
                FailureStatistics::default()
            }
        }
    }
}
