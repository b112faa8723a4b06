use std::sync::Arc;

use mysql_middleware::prelude::*;
use mysql_middleware::test_utils::ScriptedConnector;

fn query() -> Query {
    let config = Configuration::new([("test", "localhost")], "test", "test");
    let pool = Pool::new(
        config,
        Arc::new(ScriptedConnector::new()),
        Arc::new(MemoryCache::new()),
    );
    let routing = Routing::from_json("test", r#"{"trololo": null}"#).unwrap();
    Query::new(pool, routing)
}

fn criteria() -> Criteria {
    Criteria::new("trololo")
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

fn assert_sql(statement: &Statement, sql: &str, params: &[i64]) {
    assert_eq!(statement.sql, sql);
    assert_eq!(statement.params, ints(params));
}

#[test]
fn find_all() {
    let q = query();
    assert_sql(
        &q.compile_select(&criteria()).unwrap(),
        "SELECT * FROM test.trololo WHERE 1",
        &[],
    );
}

#[test]
fn find_all_with_columns() {
    let q = query();
    let c = criteria().read(["foo", "bar + 1"]);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT foo,bar + 1 FROM test.trololo WHERE 1",
        &[],
    );
}

#[test]
fn find_with_single_condition() {
    let q = query();
    let c = criteria().filter("a", 1);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a=?",
        &[1],
    );
}

#[test]
fn find_with_limit_and_offset() {
    let q = query();
    assert_sql(
        &q.compile_select(&criteria().limit(1)).unwrap(),
        "SELECT * FROM test.trololo WHERE 1 LIMIT 1",
        &[],
    );
    assert_sql(
        &q.compile_select(&criteria().limit(1).offset(2)).unwrap(),
        "SELECT * FROM test.trololo WHERE 1 LIMIT 1 OFFSET 2",
        &[],
    );
    // OFFSET never appears without LIMIT, and zero values are dropped
    assert_sql(
        &q.compile_select(&criteria().offset(2)).unwrap(),
        "SELECT * FROM test.trololo WHERE 1",
        &[],
    );
    assert_sql(
        &q.compile_select(&criteria().limit(0).offset(2)).unwrap(),
        "SELECT * FROM test.trololo WHERE 1",
        &[],
    );
}

#[test]
fn find_with_complex_conditions() {
    let q = query();
    let c = criteria()
        .filter_with("a", 1, Comparator::NotEqual)
        .filter_with("b", 2, Comparator::Greater)
        .filter_with("c", 3, Comparator::Less)
        .filter_with("d", 4, Comparator::GreaterOrEqual)
        .filter_with("e", 5, Comparator::LessOrEqual);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a<>? AND b>? AND c<? AND d>=? AND e<=?",
        &[1, 2, 3, 4, 5],
    );
}

#[test]
fn find_with_in_lists() {
    let q = query();
    let c = criteria().filter_with("a", vec![1, 2, 3], Comparator::In);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a IN(?,?,?)",
        &[1, 2, 3],
    );

    let c = criteria().filter_with("a", vec![1, 2, 3], Comparator::NotIn);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a NOT IN(?,?,?)",
        &[1, 2, 3],
    );

    let c = criteria()
        .filter_with("a", vec![1, 2, 3], Comparator::In)
        .filter("b", 4);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a IN(?,?,?) AND b=?",
        &[1, 2, 3, 4],
    );
}

#[test]
fn find_null_checks() {
    let q = query();
    let c = criteria().filter_with("a", Value::Null, Comparator::IsNull);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a IS NULL",
        &[],
    );
    let c = criteria().filter_with("a", Value::Null, Comparator::IsNotNull);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE a IS NOT NULL",
        &[],
    );
}

#[test]
fn select_with_multi_order() {
    let q = query();
    let c = criteria()
        .order_by("foo", SortOrder::Asc)
        .order_by("bar", SortOrder::Desc);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE 1 ORDER BY foo ASC, bar DESC",
        &[],
    );
}

#[test]
fn select_with_order_and_limit() {
    let q = query();
    let c = criteria().limit(100).order_by("foo", "asc");
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT * FROM test.trololo WHERE 1 ORDER BY foo ASC LIMIT 100",
        &[],
    );
}

#[test]
fn unknown_order_type() {
    let q = query();
    let err = q
        .compile_select(&criteria().order_by("foo", "natural"))
        .unwrap_err();
    assert!(matches!(err, MiddlewareError::Query(_)));
}

#[test]
fn non_scalar_values_in_conditions() {
    let q = query();
    let values = [
        Value::List(Vec::new()),
        Value::Json(serde_json::json!({"a": 1})),
        Value::Null,
    ];
    for value in values {
        let err = q
            .compile_select(&criteria().filter("foo", value))
            .unwrap_err();
        assert!(matches!(err, MiddlewareError::Query(_)), "{err}");
    }
}

#[test]
fn aggregates() {
    let q = query();
    let c = criteria().aggregate("count", None, None).filter("foo", 1);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT COUNT(*) FROM test.trololo WHERE foo=?",
        &[1],
    );

    let c = criteria()
        .read(["baz"])
        .aggregate("count", None, None)
        .aggregate("sum", Some("bar"), None)
        .filter("foo", 1);
    assert_sql(
        &q.compile_select(&c).unwrap(),
        "SELECT baz,COUNT(*),SUM(bar) FROM test.trololo WHERE foo=? GROUP BY baz",
        &[1],
    );
}

#[test]
fn update_value() {
    let q = query();
    let c = criteria().write([("a", 1)]);
    assert_sql(
        &q.compile_update(&c).unwrap(),
        "UPDATE test.trololo SET a=? WHERE 1",
        &[1],
    );
}

#[test]
fn increment_values() {
    let q = query();
    let c = criteria().write([("a", 1), ("b", -1)]).filter("c", 2);
    assert_sql(
        &q.compile_increment(&c).unwrap(),
        "UPDATE test.trololo SET a=a+(?),b=b+(?) WHERE c=?",
        &[1, -1, 2],
    );
}

#[test]
fn update_without_write_definition() {
    let q = query();
    let err = q.compile_update(&criteria()).unwrap_err();
    assert_eq!(err.to_string(), "Query error: No fields for update statement");
    assert!(q.compile_increment(&criteria()).is_err());
}

#[test]
fn update_rejects_fields_without_values() {
    let q = query();
    let c = criteria().read(["a", "b"]);
    let err = q.compile_update(&c).unwrap_err();
    assert_eq!(err.to_string(), "Query error: Wrong values count for update statement");
    assert!(q.compile_increment(&c).is_err());
}

#[test]
fn update_rejects_list_and_object_values() {
    let q = query();
    let c = criteria().write([("a", Value::from(vec![1, 2]))]);
    let err = q.compile_update(&c).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query error: The array type of value is wrong for \"a\" column"
    );

    let c = criteria().write([("a", Value::Json(serde_json::json!({"b": 1})))]);
    let err = q.compile_increment(&c).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query error: The object type of value is wrong for \"a\" column"
    );
}

#[test]
fn update_binds_null() {
    let q = query();
    let c = criteria().write([("a", Value::Null)]).filter("b", 1);
    let statement = q.compile_update(&c).unwrap();
    assert_eq!(statement.sql, "UPDATE test.trololo SET a=? WHERE b=?");
    assert_eq!(statement.params, vec![Value::Null, Value::Int(1)]);
}

#[test]
fn insert_row() {
    let q = query();
    let c = criteria().write([("foo", 1), ("bar", -2)]);
    assert_sql(
        &q.compile_insert(&c).unwrap(),
        "INSERT INTO test.trololo(foo,bar) VALUES (?,?)",
        &[1, -2],
    );
}

#[test]
fn multi_insert_row() {
    let q = query();
    let c = criteria().write([("foo", vec![1, 2]), ("bar", vec![-2, 3])]);
    assert_sql(
        &q.compile_insert(&c).unwrap(),
        "INSERT INTO test.trololo(foo,bar) VALUES (?,?),(?,?)",
        &[1, -2, 2, 3],
    );
}

#[test]
fn wrong_values_count_for_multi_insert() {
    let q = query();
    let c = criteria().write([("foo", Value::from(vec![1, 2])), ("bar", Value::from(-2))]);
    let err = q.compile_insert(&c).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query error: Wrong rows count in 1 column for multi insert query"
    );
}

#[test]
fn multi_insert_rejects_nested_cells() {
    let q = query();
    let c = criteria().write([
        ("foo", Value::List(vec![Value::Int(1), Value::from(vec![2, 3])])),
        ("bar", Value::from(vec![1, 2])),
    ]);
    let err = q.compile_insert(&c).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query error: The array type of value is wrong for \"foo\" column"
    );

    let c = criteria().write([("foo", Value::Json(serde_json::json!([1])))]);
    assert!(q.compile_insert(&c).is_err());
}

#[test]
fn insert_on_duplicate_two_columns() {
    let q = query();
    let c = criteria()
        .write([("foo", 1), ("bar", -2), ("baz", 3)])
        .upsert(["foo", "baz"]);
    assert_sql(
        &q.compile_insert(&c).unwrap(),
        "INSERT INTO test.trololo(foo,bar,baz) VALUES (?,?,?) ON DUPLICATE KEY UPDATE foo=VALUES(foo),baz=VALUES(baz)",
        &[1, -2, 3],
    );
}

#[test]
fn insert_on_duplicate_increment() {
    let q = query();
    let c = criteria()
        .write([("id", 7), ("hits", 1)])
        .upsert_with("hits", "inc");
    assert_sql(
        &q.compile_insert(&c).unwrap(),
        "INSERT INTO test.trololo(id,hits) VALUES (?,?) ON DUPLICATE KEY UPDATE hits=hits+(?)",
        &[7, 1, 1],
    );
}

#[test]
fn insert_without_write_definition() {
    let q = query();
    let err = q.compile_insert(&criteria()).unwrap_err();
    assert_eq!(err.to_string(), "Query error: No fields for insert statement");
}

#[test]
fn delete() {
    let q = query();
    assert_sql(
        &q.compile_delete(&criteria()).unwrap(),
        "DELETE FROM test.trololo WHERE 1",
        &[],
    );
    assert_sql(
        &q.compile_delete(&criteria().filter("foo", 1)).unwrap(),
        "DELETE FROM test.trololo WHERE foo=?",
        &[1],
    );
}

#[test]
fn writes_refuse_replica_affinity() {
    let q = query();
    let c = criteria()
        .with_meta(CriteriaMeta::new().with_read_from_replica(true))
        .write([("a", 1)]);
    for result in [
        q.compile_insert(&c),
        q.compile_update(&c),
        q.compile_increment(&c),
        q.compile_delete(&c),
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Query error: write queries can only run on primary");
    }

    let statement = q.compile_select(&c).unwrap();
    assert_eq!(statement.server_type, ServerType::Replica);
    assert_eq!(statement.route.to_string(), "test.trololo");
}
