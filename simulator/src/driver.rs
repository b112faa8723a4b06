use std::sync::Arc;
use std::time::Duration;

use mysql_middleware::prelude::*;
use rand::Rng;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;

use crate::args::SimConfig;
use crate::backend::SimConnector;
use crate::logging::EventLog;
use crate::model::{Event, Op, Summary};
use crate::oracle::Oracle;

const PRIMARY_DB: &str = "simdb";
const PRIMARIES: [&str; 2] = ["db-master-1", "db-master-2"];
const TABLES: &str = r#"{
    "content": { "options": "spotted" },
    "word_user": { "options": ["spotted", "chunked"] }
}"#;

/// Lives longer than any run so failure counts never expire mid-simulation.
const FAILURE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Chance that a step ends a client request and drops every cached link.
const REQUEST_END_RATE: f64 = 0.25;

pub(crate) fn run(config: SimConfig, rng: &mut ChaCha8Rng) -> Result<Summary, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| format!("tokio runtime: {err}"))?;

    let replicas: Vec<(String, Vec<String>)> = PRIMARIES
        .iter()
        .map(|primary| {
            let names = (1..=config.replicas)
                .map(|i| format!("{primary}-replica-{i}"))
                .collect();
            (primary.to_string(), names)
        })
        .collect();
    let connector = SimConnector::new(
        rng.random(),
        replicas.iter().flat_map(|(_, names)| names.iter().cloned()),
        config.replica_failure_rate,
        config.transient_rate,
    );

    let mut configuration = Configuration::new(
        [
            (PRIMARY_DB, PRIMARIES[0]),
            ("simdb_1", PRIMARIES[0]),
            ("simdb_2", PRIMARIES[1]),
        ],
        "sim",
        "sim",
    );
    for (primary, names) in &replicas {
        configuration = configuration.with_replicas(primary.as_str(), names.iter().cloned());
    }

    let pool = Pool::new(
        configuration,
        Arc::new(connector.clone()),
        Arc::new(MemoryCache::new()),
    )
    .with_options(
        PoolOptions::default()
            .with_max_failures(config.max_failures)
            .with_failure_ttl(FAILURE_TTL),
    );
    let routing = Routing::from_json(PRIMARY_DB, TABLES).map_err(|err| err.to_string())?;
    let mut query = Query::new(pool, routing);
    let oracle = Oracle::new(connector.clone(), config.max_failures);

    let mut events = EventLog::new(config.first_steps, config.tail_steps);
    let mut summary = Summary::default();

    for step in 0..config.iterations {
        let op = next_op(rng);
        let criteria = criteria_for(op, rng);
        let before = runtime.block_on(statistics(&query))?;
        let result = runtime.block_on(apply(&mut query, op, &criteria));
        let after = runtime.block_on(statistics(&query))?;
        let observed = connector.drain_events();

        let result_label = match &result {
            Ok(()) => "Ok".to_string(),
            Err(err) => format!("Err({err})"),
        };
        events.record(format!(
            "step={step} op={op:?} route={} events={} result={result_label}",
            query
                .routing()
                .get_route(&criteria)
                .map(|route| route.to_string())
                .unwrap_or_default(),
            observed.len(),
        ));

        if let Err(reason) = oracle.check(op, &observed, &before, &after) {
            events.dump_failure(&reason);
            return Err(reason);
        }

        tally(&mut summary, op, &result, &observed, &connector);
        summary.steps += 1;

        // A failed transaction may leave its link half-open.
        if (result.is_err() && op == Op::Transaction) || rng.random_bool(REQUEST_END_RATE) {
            query.pool_mut().disconnect_all();
        }
    }

    tracing::info!(
        "complete: steps={} ok={} errors={} replica_reads={} refused_connects={} transient_failures={}",
        summary.steps,
        summary.ok,
        summary.errors,
        summary.replica_reads,
        summary.refused_connects,
        summary.transient_failures
    );
    Ok(summary)
}

async fn statistics(query: &Query) -> Result<FailureStatistics, String> {
    query
        .pool()
        .failure_statistics()
        .await
        .map_err(|err| format!("failure statistics unreadable: {err}"))
}

async fn apply(query: &mut Query, op: Op, criteria: &Criteria) -> Result<(), MiddlewareError> {
    match op {
        Op::Select | Op::ReplicaSelect => query.select(criteria).await.map(|_| ()),
        Op::Insert => query.insert(criteria).await.map(|_| ()),
        Op::Update => query.update(criteria).await.map(|_| ()),
        Op::Increment => query.increment(criteria).await.map(|_| ()),
        Op::Delete => query.delete(criteria).await.map(|_| ()),
        Op::Transaction => {
            query.get_connection(criteria).await?.begin().await?;
            query.insert(criteria).await?;
            query.get_connection(criteria).await?.commit().await?;
            Ok(())
        }
    }
}

fn tally(
    summary: &mut Summary,
    op: Op,
    result: &Result<(), MiddlewareError>,
    observed: &[Event],
    connector: &SimConnector,
) {
    match result {
        Ok(()) => summary.ok += 1,
        Err(_) => summary.errors += 1,
    }
    for event in observed {
        match event {
            Event::Connect { refused: true, .. } => summary.refused_connects += 1,
            Event::Statement { failed: true, .. } => summary.transient_failures += 1,
            Event::Statement { host, failed: false, .. }
                if op.allows_replica() && connector.is_replica(host) =>
            {
                summary.replica_reads += 1;
            }
            _ => {}
        }
    }
}

fn next_op(rng: &mut ChaCha8Rng) -> Op {
    let weights = [
        (Op::Select, 0.20),
        (Op::ReplicaSelect, 0.30),
        (Op::Insert, 0.15),
        (Op::Update, 0.10),
        (Op::Increment, 0.10),
        (Op::Delete, 0.05),
        (Op::Transaction, 0.10),
    ];
    choose_weighted(&weights, rng)
}

fn choose_weighted(items: &[(Op, f64)], rng: &mut ChaCha8Rng) -> Op {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    let mut target = rng.random::<f64>() * total;
    for (op, weight) in items {
        let w = weight.max(0.0);
        if target <= w {
            return *op;
        }
        target -= w;
    }
    items.last().map_or(Op::Select, |(op, _)| *op)
}

fn criteria_for(op: Op, rng: &mut ChaCha8Rng) -> Criteria {
    let location = ["word", "content", "word_user"]
        .choose(rng)
        .copied()
        .unwrap_or("word");
    let meta = CriteriaMeta::new()
        .with_spot_id(rng.random_range(1..=2_u32))
        .with_chunk_id(rng.random_range(0..16_u32))
        .with_read_from_replica(op.allows_replica());
    let id = rng.random_range(1..10_000_i64);
    let criteria = Criteria::new(location).with_meta(meta);

    match op {
        Op::Select | Op::ReplicaSelect => criteria
            .read(["id", "name"])
            .filter("id", id)
            .order_by("id", SortOrder::Desc)
            .limit(rng.random_range(0..20)),
        Op::Insert | Op::Transaction => criteria
            .write([("id", Value::Int(id)), ("hits", Value::Int(1))])
            .upsert_with("hits", "inc"),
        Op::Update => criteria
            .write([("name", Value::Text(format!("name-{id}")))])
            .filter("id", id),
        Op::Increment => criteria
            .write([("hits", Value::Int(rng.random_range(1..5)))])
            .filter("id", id),
        Op::Delete => criteria.filter("id", id),
    }
}
