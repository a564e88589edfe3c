//! End-to-end scenarios through the database facade.

use serde_json::json;
use tempfile::TempDir;

use minisql::{Config, Database};

fn open(dir: &TempDir) -> Database {
    Database::open(Config::default().with_data_dir(dir.path())).expect("open database")
}

/// Runs a script that must succeed.
fn run(db: &Database, sql: &str) -> minisql::db::QueryOutcome {
    let outcome = db.execute(sql, None);
    assert!(
        outcome.success,
        "statement failed: {} -> {:?}",
        sql, outcome.error
    );
    outcome
}

/// Result rows as one JSON array, for literal comparisons.
fn rows_json(outcome: &minisql::db::QueryOutcome) -> serde_json::Value {
    serde_json::Value::Array(
        outcome
            .result
            .clone()
            .expect("query result")
            .into_iter()
            .map(serde_json::Value::Object)
            .collect(),
    )
}

fn seed_users_and_orders(db: &Database) {
    run(
        db,
        "CREATE TABLE users (id INT PRIMARY KEY, name TEXT); \
         INSERT INTO users VALUES (1, 'Alice'); \
         INSERT INTO users VALUES (2, 'Bob'); \
         CREATE TABLE o (id INT PRIMARY KEY, uid INT REFERENCES users(id)); \
         INSERT INTO o VALUES (1, 1), (2, 1), (3, 2);",
    );
}

#[test]
fn test_create_insert_select() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(&db, "CREATE TABLE users (id INT PRIMARY KEY, name TEXT);");
    run(&db, "INSERT INTO users VALUES (1, 'Alice');");
    run(&db, "INSERT INTO users VALUES (2, 'Bob');");

    let outcome = run(&db, "SELECT * FROM users;");
    assert_eq!(
        outcome.columns,
        Some(vec!["id".to_string(), "name".to_string()])
    );
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}])
    );
}

#[test]
fn test_primary_key_duplicate_leaves_table_unchanged() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE users (id INT PRIMARY KEY, name TEXT); \
         INSERT INTO users VALUES (1, 'Alice'); \
         INSERT INTO users VALUES (2, 'Bob');",
    );

    let outcome = db.execute("INSERT INTO users VALUES (1, 'X');", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    let outcome = run(&db, "SELECT * FROM users;");
    assert_eq!(outcome.result.as_ref().unwrap().len(), 2);
}

#[test]
fn test_foreign_key_on_insert() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE users (id INT PRIMARY KEY, name TEXT); \
         INSERT INTO users VALUES (1, 'Alice'); \
         CREATE TABLE o (id INT PRIMARY KEY, uid INT REFERENCES users(id));",
    );

    let outcome = db.execute("INSERT INTO o VALUES (1, 99);", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    run(&db, "INSERT INTO o VALUES (1, 1);");
    // A null foreign key value is always allowed.
    run(&db, "INSERT INTO o VALUES (2, NULL);");
}

#[test]
fn test_inner_join_with_aggregate() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    seed_users_and_orders(&db);

    let outcome = run(
        &db,
        "SELECT u.name, COUNT(o.id) AS n FROM users u \
         INNER JOIN o ON u.id = o.uid \
         GROUP BY u.name ORDER BY u.name ASC;",
    );
    assert_eq!(
        outcome.columns,
        Some(vec!["name".to_string(), "n".to_string()])
    );
    assert_eq!(
        rows_json(&outcome),
        json!([{"name": "Alice", "n": 2}, {"name": "Bob", "n": 1}])
    );
}

#[test]
fn test_left_join_preserves_unmatched_rows() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    seed_users_and_orders(&db);
    run(&db, "INSERT INTO users VALUES (3, 'Carol');");

    let outcome = run(
        &db,
        "SELECT u.id, COUNT(o.id) AS n FROM users u \
         LEFT JOIN o ON u.id = o.uid \
         GROUP BY u.id ORDER BY u.id ASC;",
    );
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 1, "n": 2}, {"id": 2, "n": 1}, {"id": 3, "n": 0}])
    );
}

#[test]
fn test_right_and_full_outer_joins() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE a (id INT PRIMARY KEY); \
         CREATE TABLE b (id INT PRIMARY KEY, aid INT); \
         INSERT INTO a VALUES (1), (2); \
         INSERT INTO b VALUES (10, 1), (11, 99);",
    );

    let outcome = run(
        &db,
        "SELECT a.id, b.id FROM a RIGHT JOIN b ON a.id = b.aid ORDER BY b.id ASC;",
    );
    assert_eq!(
        rows_json(&outcome),
        json!([{"a.id": 1, "b.id": 10}, {"a.id": null, "b.id": 11}])
    );

    let outcome = run(
        &db,
        "SELECT a.id, b.id FROM a FULL OUTER JOIN b ON a.id = b.aid;",
    );
    assert_eq!(
        rows_json(&outcome),
        json!([
            {"a.id": 1, "b.id": 10},
            {"a.id": 2, "b.id": null},
            {"a.id": null, "b.id": 11}
        ])
    );
}

#[test]
fn test_delete_blocked_by_referrer() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    seed_users_and_orders(&db);

    let outcome = db.execute("DELETE FROM users WHERE id = 1;", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    assert_eq!(
        run(&db, "SELECT * FROM users;").result.unwrap().len(),
        2
    );
    assert_eq!(run(&db, "SELECT * FROM o;").result.unwrap().len(), 3);

    // Deleting the referrers first unblocks the row.
    run(&db, "DELETE FROM o WHERE uid = 1;");
    let outcome = run(&db, "DELETE FROM users WHERE id = 1;");
    assert_eq!(outcome.affected_rows, Some(1));
}

#[test]
fn test_drop_table_blocked_by_foreign_key() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    seed_users_and_orders(&db);

    let outcome = db.execute("DROP TABLE users;", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    run(&db, "DROP TABLE o;");
    run(&db, "DROP TABLE users;");
    assert!(db.tables().unwrap().is_empty());
}

#[test]
fn test_update_swaps_through_pre_update_values() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE p (id INT PRIMARY KEY, a INT, b INT); \
         INSERT INTO p VALUES (1, 10, 20);",
    );

    run(&db, "UPDATE p SET a = b, b = a WHERE id = 1;");
    let outcome = run(&db, "SELECT a, b FROM p;");
    assert_eq!(rows_json(&outcome), json!([{"a": 20, "b": 10}]));
}

#[test]
fn test_update_rejects_orphaning_key_change() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    seed_users_and_orders(&db);

    let outcome = db.execute("UPDATE users SET id = 9 WHERE id = 1;", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    // Unreferenced key values may change freely.
    run(&db, "INSERT INTO users VALUES (4, 'Dave');");
    run(&db, "UPDATE users SET id = 9 WHERE id = 4;");
}

#[test]
fn test_update_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, v INT UNIQUE); \
         INSERT INTO t VALUES (1, 10), (2, 11);",
    );

    // Row 1 would collide with row 2's unique value; nothing may change.
    let outcome = db.execute("UPDATE t SET v = 11 WHERE id = 1;", None);
    assert!(!outcome.success);
    let outcome = run(&db, "SELECT v FROM t ORDER BY id ASC;");
    assert_eq!(rows_json(&outcome), json!([{"v": 10}, {"v": 11}]));
}

#[test]
fn test_insert_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(&db, "CREATE TABLE t (id INT PRIMARY KEY);");

    let outcome = db.execute("INSERT INTO t VALUES (1), (2), (1);", None);
    assert!(!outcome.success);
    let outcome = run(&db, "SELECT * FROM t;");
    assert_eq!(outcome.result.unwrap().len(), 0);
}

#[test]
fn test_named_insert_fills_missing_with_null() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, a TEXT, b FLOAT); \
         INSERT INTO t (b, id) VALUES (2, 7);",
    );

    let outcome = run(&db, "SELECT * FROM t;");
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 7, "a": null, "b": 2.0}])
    );
}

#[test]
fn test_not_null_and_type_errors() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, name TEXT NOT NULL);",
    );

    let outcome = db.execute("INSERT INTO t VALUES (1, NULL);", None);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    let outcome = db.execute("INSERT INTO t VALUES ('x', 'y');", None);
    assert!(outcome.error.as_deref().unwrap().starts_with("TypeError:"));
}

#[test]
fn test_where_between_and_is_null() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE m (id INT PRIMARY KEY, score FLOAT); \
         INSERT INTO m VALUES (1, 1.5), (2, 3.5), (3, NULL), (4, 9.0);",
    );

    let outcome = run(&db, "SELECT id FROM m WHERE score BETWEEN 1 AND 4;");
    assert_eq!(rows_json(&outcome), json!([{"id": 1}, {"id": 2}]));

    let outcome = run(&db, "SELECT id FROM m WHERE score IS NULL;");
    assert_eq!(rows_json(&outcome), json!([{"id": 3}]));

    // Comparisons against null match nothing.
    let outcome = run(&db, "SELECT id FROM m WHERE score != 1.5;");
    assert_eq!(rows_json(&outcome), json!([{"id": 2}, {"id": 4}]));
}

#[test]
fn test_order_by_desc_puts_nulls_first() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE m (id INT PRIMARY KEY, score FLOAT); \
         INSERT INTO m VALUES (1, 2.0), (2, NULL), (3, 1.0);",
    );

    let outcome = run(&db, "SELECT id FROM m ORDER BY score ASC;");
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 3}, {"id": 1}, {"id": 2}])
    );

    let outcome = run(&db, "SELECT id FROM m ORDER BY score DESC;");
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 2}, {"id": 1}, {"id": 3}])
    );
}

#[test]
fn test_distinct_after_projection() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, tag TEXT); \
         INSERT INTO t VALUES (1, 'x'), (2, 'y'), (3, 'x');",
    );

    let outcome = run(&db, "SELECT DISTINCT tag FROM t;");
    assert_eq!(rows_json(&outcome), json!([{"tag": "x"}, {"tag": "y"}]));
}

#[test]
fn test_aggregates_without_grouping() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, v FLOAT); \
         INSERT INTO t VALUES (1, 1.0), (2, 2.0), (3, NULL);",
    );

    let outcome = run(
        &db,
        "SELECT COUNT(*) AS total, COUNT(v) AS with_v, SUM(v) AS s, \
                AVG(v) AS a, MIN(v) AS lo, MAX(v) AS hi FROM t;",
    );
    assert_eq!(
        rows_json(&outcome),
        json!([{"total": 3, "with_v": 2, "s": 3.0, "a": 1.5, "lo": 1.0, "hi": 2.0}])
    );

    // The implicit group exists even over an empty table.
    run(&db, "DELETE FROM t;");
    let outcome = run(&db, "SELECT COUNT(*) AS total, SUM(v) AS s FROM t;");
    assert_eq!(rows_json(&outcome), json!([{"total": 0, "s": null}]));
}

#[test]
fn test_group_by_violation_is_semantic_error() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, tag TEXT); \
         INSERT INTO t VALUES (1, 'x');",
    );

    let outcome = db.execute("SELECT id, COUNT(*) FROM t GROUP BY tag;", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("SemanticError:"));
}

#[test]
fn test_ambiguous_column_is_semantic_error() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE a (id INT PRIMARY KEY); \
         CREATE TABLE b (id INT PRIMARY KEY); \
         INSERT INTO a VALUES (1); INSERT INTO b VALUES (1);",
    );

    let outcome = db.execute("SELECT id FROM a JOIN b ON a.id = b.id;", None);
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("ambiguous"));

    // Wildcard output qualifies the colliding names instead.
    let outcome = run(&db, "SELECT * FROM a JOIN b ON a.id = b.id;");
    assert_eq!(
        outcome.columns,
        Some(vec!["a.id".to_string(), "b.id".to_string()])
    );
}

#[test]
fn test_persistence_round_trip() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        seed_users_and_orders(&db);
    }

    // A fresh handle over the same directory sees identical data.
    let db = open(&dir);
    let outcome = run(&db, "SELECT * FROM users ORDER BY id ASC;");
    assert_eq!(
        rows_json(&outcome),
        json!([{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}])
    );
    let outcome = run(&db, "SELECT COUNT(*) AS n FROM o;");
    assert_eq!(rows_json(&outcome), json!([{"n": 3}]));

    // Constraints keep holding against the reloaded catalog.
    let outcome = db.execute("INSERT INTO o VALUES (9, 42);", None);
    assert!(!outcome.success);
}

#[test]
fn test_delete_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE t (id INT PRIMARY KEY, v INT); \
         INSERT INTO t VALUES (1, 5), (2, 6);",
    );

    let first = run(&db, "DELETE FROM t WHERE v = 5;");
    assert_eq!(first.affected_rows, Some(1));
    let second = run(&db, "DELETE FROM t WHERE v = 5;");
    assert_eq!(second.affected_rows, Some(0));
    assert_eq!(run(&db, "SELECT * FROM t;").result.unwrap().len(), 1);
}

#[test]
fn test_self_referential_foreign_key() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE emp (id INT PRIMARY KEY, boss INT REFERENCES emp(id)); \
         INSERT INTO emp VALUES (1, NULL); \
         INSERT INTO emp VALUES (2, 1);",
    );

    let outcome = db.execute("DELETE FROM emp WHERE id = 1;", None);
    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("ConstraintError:"));

    // Deleting the whole hierarchy in one statement is fine.
    let outcome = run(&db, "DELETE FROM emp;");
    assert_eq!(outcome.affected_rows, Some(2));
}

#[test]
fn test_case_insensitive_names_keep_canonical_spelling() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    run(
        &db,
        "CREATE TABLE Users (Id INT PRIMARY KEY, Name TEXT); \
         INSERT INTO users (ID, NAME) VALUES (1, 'Alice');",
    );

    let outcome = run(&db, "SELECT id FROM USERS WHERE NAME = 'Alice';");
    // Output labels use the declared spelling.
    assert_eq!(outcome.columns, Some(vec!["Id".to_string()]));
    assert_eq!(rows_json(&outcome), json!([{"Id": 1}]));
}
