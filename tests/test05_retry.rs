use std::sync::Arc;

use mysql_middleware::error::{CR_SERVER_GONE_ERROR, CR_SERVER_LOST};
use mysql_middleware::prelude::*;
use mysql_middleware::test_utils::ScriptedConnector;

fn query(connector: &ScriptedConnector, replicas: &[&str]) -> Query {
    let config = Configuration::new([("test", "master")], "test", "test")
        .with_replicas("master", replicas.iter().copied());
    let pool = Pool::new(
        config,
        Arc::new(connector.clone()),
        Arc::new(MemoryCache::new()),
    );
    Query::new(pool, Routing::from_json("test", "{}").unwrap())
}

#[tokio::test]
async fn one_transient_failure_is_absorbed() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    let mut expected = ResultSet::with_columns(vec!["id".into()]);
    expected.add_row_values(vec![Value::Int(1)]);
    connector.fail_next(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    connector.respond_with(expected.clone());

    let result = query.select(&Criteria::new("word")).await.unwrap();
    assert_eq!(result, expected);
    assert_eq!(connector.connects(), vec!["master", "master"]);
}

#[tokio::test]
async fn second_transient_failure_propagates() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.fail_next(CR_SERVER_LOST, "Lost connection to MySQL server during query");
    connector.fail_next(CR_SERVER_GONE_ERROR, "MySQL server has gone away");

    let err = query.select(&Criteria::new("word")).await.unwrap_err();
    assert_eq!(err.driver_code(), Some(CR_SERVER_GONE_ERROR));
    assert_eq!(connector.connects().len(), 2);
    assert_eq!(connector.log().len(), 2);
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.fail_next(1062, "Duplicate entry '1' for key 'PRIMARY'");
    let err = query
        .insert(&Criteria::new("word").write([("id", 1)]))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Driver error: [1062] Duplicate entry '1' for key 'PRIMARY'"
    );
    assert_eq!(connector.connects(), vec!["master"]);
}

#[tokio::test]
async fn retry_can_be_disabled() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]).with_retry_policy(RetryPolicy::never());

    connector.fail_next(CR_SERVER_LOST, "Lost connection to MySQL server during query");
    let err = query.delete(&Criteria::new("word")).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(connector.connects().len(), 1);
}

#[tokio::test]
async fn get_connection_retries_the_ping() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.fail_next(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    let conn = query.get_connection(&Criteria::new("word")).await.unwrap();
    assert_eq!(conn.host(), "master");

    let pings: Vec<usize> = connector.log().iter().map(|entry| entry.link_id).collect();
    assert_eq!(pings, vec![1, 2]);
}

#[tokio::test]
async fn replica_reads_reconnect_to_a_replica() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &["replica-1"]);
    let criteria =
        Criteria::new("word").with_meta(CriteriaMeta::new().with_read_from_replica(true));

    connector.fail_next(CR_SERVER_LOST, "Lost connection to MySQL server during query");
    query.select(&criteria).await.unwrap();

    assert_eq!(connector.connects(), vec!["replica-1", "replica-1"]);
    assert!(connector.statements_on("master").is_empty());
}

#[tokio::test]
async fn write_outcome_is_returned() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.respond_with(ResultSet::affected(1, Some(42)));
    let result = query
        .insert(&Criteria::new("word").write([("name", "leo")]))
        .await
        .unwrap();
    assert_eq!(result.count(), 1);
    assert_eq!(result.last_insert_id, Some(42));
}

#[tokio::test]
async fn transient_connect_failure_is_retried() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.fail_next_connect(
        CR_SERVER_LOST,
        "Lost connection to MySQL server at 'reading initial communication packet'",
    );
    query.select(&Criteria::new("word")).await.unwrap();

    assert_eq!(connector.connects(), vec!["master", "master"]);
    assert_eq!(connector.statements_on("master").len(), 1);
}

#[tokio::test]
async fn repeated_connect_failure_propagates() {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector, &[]);

    connector.fail_next_connect(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    connector.fail_next_connect(CR_SERVER_GONE_ERROR, "MySQL server has gone away");

    let err = query.select(&Criteria::new("word")).await.unwrap_err();
    assert_eq!(err.driver_code(), Some(CR_SERVER_GONE_ERROR));
    assert_eq!(connector.connects().len(), 2);
    assert!(connector.log().is_empty());
}
