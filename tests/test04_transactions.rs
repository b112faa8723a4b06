use std::sync::Arc;

use mysql_middleware::error::CR_SERVER_GONE_ERROR;
use mysql_middleware::prelude::*;
use mysql_middleware::test_utils::ScriptedConnector;

fn query(connector: &ScriptedConnector) -> Query {
    let config = Configuration::new([("test", "localhost")], "test", "test");
    let pool = Pool::new(
        config,
        Arc::new(connector.clone()),
        Arc::new(MemoryCache::new()),
    );
    Query::new(pool, Routing::from_json("test", "{}").unwrap())
}

#[tokio::test]
async fn statements_inside_a_transaction_share_the_link() -> Result<(), MiddlewareError> {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector);
    let criteria = Criteria::new("word").write([("id", 1)]);

    let conn = query.get_connection(&criteria).await?;
    conn.begin().await?;
    query.insert(&criteria).await?;
    let conn = query.get_connection(&criteria).await?;
    assert_eq!(conn.transaction_depth(), 1);
    conn.commit().await?;

    assert_eq!(connector.connects(), vec!["localhost"]);
    assert_eq!(
        connector.statements_on("localhost"),
        vec![
            "SELECT 1",
            "BEGIN",
            "INSERT INTO test.word(id) VALUES (?)",
            "SELECT 1",
            "COMMIT",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn nested_levels_issue_one_physical_pair() -> Result<(), MiddlewareError> {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector);
    let conn = query.get_connection(&Criteria::new("word")).await?;

    assert!(conn.begin().await?);
    assert!(conn.begin().await?);
    assert!(conn.commit().await?);
    assert!(conn.commit().await?);
    assert!(!conn.in_transaction());

    let physical: Vec<String> = connector
        .statements_on("localhost")
        .into_iter()
        .filter(|sql| sql != "SELECT 1")
        .collect();
    assert_eq!(physical, vec!["BEGIN", "COMMIT"]);
    Ok(())
}

#[tokio::test]
async fn misuse_is_reported() -> Result<(), MiddlewareError> {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector);
    let conn = query.get_connection(&Criteria::new("word")).await?;

    let err = conn.commit().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Transaction error: You cannot make commit without begin"
    );

    conn.begin().await?;
    conn.begin().await?;
    let err = conn.rollback().await.unwrap_err();
    assert!(matches!(err, MiddlewareError::TransactionState(_)));
    assert_eq!(conn.transaction_depth(), 2);
    assert!(!connector.statements_on("localhost").contains(&"ROLLBACK".to_string()));
    Ok(())
}

#[tokio::test]
async fn transient_failure_mid_transaction_reaches_the_caller() -> Result<(), MiddlewareError> {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector);
    let criteria = Criteria::new("word").write([("id", 1)]).filter("id", 2);

    query.get_connection(&criteria).await?.begin().await?;
    connector.fail_next(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    let err = query.update(&criteria).await.unwrap_err();
    assert_eq!(err.driver_code(), Some(CR_SERVER_GONE_ERROR));

    // No second link: the update must not re-run outside the transaction.
    assert_eq!(connector.connects(), vec!["localhost"]);
    let updates: Vec<usize> = connector
        .log()
        .iter()
        .filter(|entry| entry.sql.starts_with("UPDATE"))
        .map(|entry| entry.link_id)
        .collect();
    assert_eq!(updates, vec![1]);

    let conn = query.get_connection(&criteria).await?;
    assert_eq!(conn.transaction_depth(), 1);
    assert!(conn.rollback().await?);
    Ok(())
}

#[tokio::test]
async fn transient_failure_after_commit_is_retried() -> Result<(), MiddlewareError> {
    let connector = ScriptedConnector::new();
    let mut query = query(&connector);
    let criteria = Criteria::new("word").write([("id", 1)]).filter("id", 2);

    let conn = query.get_connection(&criteria).await?;
    conn.begin().await?;
    conn.commit().await?;
    connector.fail_next(CR_SERVER_GONE_ERROR, "MySQL server has gone away");
    query.update(&criteria).await?;

    assert_eq!(connector.connects(), vec!["localhost", "localhost"]);
    let last = connector.log().pop().unwrap();
    assert_eq!(last.link_id, 2);
    assert_eq!(last.sql, "UPDATE test.word SET id=? WHERE id=?");
    Ok(())
}
