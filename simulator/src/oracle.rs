use std::collections::HashMap;

use mysql_middleware::FailureStatistics;

use crate::backend::SimConnector;
use crate::model::{Event, Op, is_write};

/// Invariants checked after every step against what the simulated servers saw.
pub(crate) struct Oracle {
    connector: SimConnector,
    max_failures: u32,
}

impl Oracle {
    pub(crate) fn new(connector: SimConnector, max_failures: u32) -> Self {
        Self {
            connector,
            max_failures,
        }
    }

    pub(crate) fn check(
        &self,
        op: Op,
        observed: &[Event],
        before: &FailureStatistics,
        after: &FailureStatistics,
    ) -> Result<(), String> {
        self.primary_only(op, observed)?;
        self.exclusion(observed, before, after)?;
        Self::monotonic(before, after)?;

        let statements = observed
            .iter()
            .filter(|event| matches!(event, Event::Statement { .. }))
            .count();
        if statements > op.max_statements() {
            return Err(format!(
                "{op:?} issued {statements} statements, at most {} allowed",
                op.max_statements()
            ));
        }
        Ok(())
    }

    fn primary_only(&self, op: Op, observed: &[Event]) -> Result<(), String> {
        for event in observed {
            let Event::Statement { host, sql, .. } = event else {
                continue;
            };
            if !self.connector.is_replica(host) {
                continue;
            }
            if is_write(sql) {
                return Err(format!("write ran on replica {host}: {sql}"));
            }
            if !op.allows_replica() {
                return Err(format!("{op:?} ran on replica {host}: {sql}"));
            }
        }
        Ok(())
    }

    /// Replays the step's connects from the `before` counts: no replica over the threshold
    /// may be contacted, and each refusal adds exactly one failure.
    fn exclusion(
        &self,
        observed: &[Event],
        before: &FailureStatistics,
        after: &FailureStatistics,
    ) -> Result<(), String> {
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for event in observed {
            let Event::Connect { host, refused } = event else {
                continue;
            };
            if !self.connector.is_replica(host) {
                continue;
            }
            let count = counts
                .entry(host.as_str())
                .or_insert_with(|| before.failures(host));
            if *count > self.max_failures {
                return Err(format!(
                    "excluded replica {host} selected with {count} failures (max {})",
                    self.max_failures
                ));
            }
            if *refused {
                *count += 1;
            }
        }

        for (host, expected) in counts {
            let actual = after.failures(host);
            if actual != expected {
                return Err(format!(
                    "replica {host} has {actual} recorded failures, expected {expected}"
                ));
            }
        }
        Ok(())
    }

    fn monotonic(before: &FailureStatistics, after: &FailureStatistics) -> Result<(), String> {
        for (host, count) in before.iter() {
            let now = after.failures(host);
            if now < count {
                return Err(format!("failure count for {host} dropped from {count} to {now}"));
            }
        }
        Ok(())
    }
}
