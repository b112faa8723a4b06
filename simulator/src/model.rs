/// One simulated client call against the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Select,
    ReplicaSelect,
    Insert,
    Update,
    Increment,
    Delete,
    /// `get_connection`, `begin`, an insert, then `commit` on the cached link.
    Transaction,
}

impl Op {
    pub(crate) fn allows_replica(self) -> bool {
        self == Op::ReplicaSelect
    }

    /// Statements one call may issue, counting a single retry per statement.
    pub(crate) fn max_statements(self) -> usize {
        match self {
            Op::Transaction => 8,
            _ => 2,
        }
    }
}

/// Something the simulated servers observed during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Connect { host: String, refused: bool },
    Statement { host: String, sql: String, failed: bool },
}

pub(crate) fn is_write(sql: &str) -> bool {
    ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|verb| sql.starts_with(verb))
}

#[derive(Debug, Default)]
pub(crate) struct Summary {
    pub(crate) steps: u64,
    pub(crate) ok: u64,
    pub(crate) errors: u64,
    pub(crate) replica_reads: u64,
    pub(crate) refused_connects: u64,
    pub(crate) transient_failures: u64,
}
