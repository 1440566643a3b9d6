//! Integration tests for query building and dialect transcription.
//!
//! Tests the public API as users would interact with it.

#![allow(missing_docs)]

mod common;

use chrono::NaiveDate;
use common::{assert_sql_contains, sql};
use strata_orm::{
    DataType, Direction, Error, MYSQL, MySql, QueryBuilder, QueryKind, SQLITE, Transcribe, Value,
    and, delete_from, insert_into, or, raw, register_transcriber, select, table_field, update,
};

const LITERAL: &str = "mysql-literal";

fn literal() -> &'static str {
    register_transcriber(LITERAL, MySql::literal());
    LITERAL
}

// SELECT tests

#[test]
fn select_placeholders() {
    let stmt = sql(&select(["name"]).from("users").where_eq("age", 18), MYSQL);
    assert_eq!(stmt.sql, "SELECT name FROM users WHERE age = ?");
    assert_eq!(stmt.params, vec![DataType::Int64(Some(18))]);
}

#[test]
fn select_defaults_to_star() {
    let stmt = sql(&QueryBuilder::new().from("users"), MYSQL);
    assert_eq!(stmt.sql, "SELECT * FROM users");
    let stmt = sql(&QueryBuilder::new().from("users").field("id").field("name"), MYSQL);
    assert_eq!(stmt.sql, "SELECT id, name FROM users");
}

#[test]
fn select_without_table_omits_from() {
    let stmt = sql(&select([raw("NOW()")]), MYSQL);
    assert_eq!(stmt.sql, "SELECT NOW()");
}

#[test]
fn select_full_clause_order() {
    let query = select(["users.id", "COUNT(orders.id) AS orders"])
        .from("users")
        .left_join_eq("orders", "orders.user_id", "users.id")
        .inner_join("accounts", and().eq("accounts.user_id", table_field("users", "id")))
        .where_eq("users.status", "active")
        .group_by(["users.id"])
        .having_gt("orders", 2)
        .order_by("orders", Direction::Desc)
        .order_by("users.id", Direction::Asc)
        .limit(10, 20);

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT users.id, COUNT(orders.id) AS orders FROM users LEFT JOIN orders ON \
         orders.user_id = users.id INNER JOIN accounts ON accounts.user_id = users.id WHERE \
         users.status = 'active' GROUP BY users.id HAVING orders > 2 ORDER BY orders DESC, \
         users.id ASC LIMIT 10, 20"
    );
    assert!(stmt.params.is_empty());
}

#[test]
fn limit_windows() {
    let base = || select(["id"]).from("users");
    assert_eq!(sql(&base().limit(0, 5), MYSQL).sql, "SELECT id FROM users LIMIT 5");
    assert_eq!(sql(&base().limit(5, 10), MYSQL).sql, "SELECT id FROM users LIMIT 5, 10");
    assert_eq!(
        sql(&base().offset(5), MYSQL).sql,
        "SELECT id FROM users LIMIT 5, 18446744073709551615"
    );
    assert_eq!(sql(&base().offset(5), SQLITE).sql, "SELECT id FROM users LIMIT 5, -1");
    assert_eq!(sql(&base(), MYSQL).sql, "SELECT id FROM users");
}

#[test]
fn unions_follow_limit() {
    let query = select(["id"])
        .from("users")
        .limit(0, 1)
        .union(select(["id"]).from("admins"))
        .union_all(select(["id"]).from("guests").where_eq("id", 3));

    let stmt = sql(&query, MYSQL);
    assert_eq!(
        stmt.sql,
        "SELECT id FROM users LIMIT 1 UNION SELECT id FROM admins UNION ALL SELECT id FROM guests \
         WHERE id = ?"
    );
    assert_eq!(stmt.params, vec![DataType::Int64(Some(3))]);
}

// Condition tests

#[test]
fn nested_conditions() {
    let query = select(["id"])
        .from("users")
        .where_eq("active", true)
        .r#where(or().eq("role", "admin").condition(and().gt("age", 18).lt("age", 65)));

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT id FROM users WHERE active = TRUE AND (role = 'admin' OR (age > 18 AND age < 65))"
    );
}

#[test]
fn negation_flips_operators() {
    let query = select(["id"])
        .from("users")
        .where_not_eq("a", 1)
        .where_gt("b", 2)
        .r#where(and().not_like("name", "%x%").is_not_null("email").is_not_true("flag"))
        .where_not(and().gt_eq("c", 3).lt_eq("d", 4));

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT id FROM users WHERE a != 1 AND b > 2 AND (name NOT LIKE '%x%' AND email IS NOT \
         NULL AND flag IS NOT TRUE) AND NOT (c >= 3 AND d <= 4)"
    );
}

#[test]
fn empty_sets_are_identities() {
    let stmt = sql(&select(["id"]).from("users").r#where(and()).where_eq("id", 1), literal());
    assert_eq!(stmt.sql, "SELECT id FROM users WHERE (TRUE) AND id = 1");

    let stmt = sql(&select(["id"]).from("users").where_not(or()), literal());
    assert_eq!(stmt.sql, "SELECT id FROM users WHERE NOT (FALSE)");
}

#[test]
fn membership() {
    let query = select(["id"])
        .from("users")
        .where_in("id", vec![1, 2, 3])
        .where_not_in("role", ["guest"])
        .where_in("group_id", select(["id"]).from("groups").where_eq("public", true));

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT id FROM users WHERE id IN(1, 2, 3) AND role NOT IN('guest') AND group_id IN \
         (SELECT id FROM groups WHERE public = TRUE)"
    );

    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.params.len(), 5);
}

#[test]
fn empty_membership_is_constant() {
    let empty: Vec<i64> = Vec::new();
    let query = select(["id"]).from("users").where_in("id", empty.clone()).where_not_in("id", empty);
    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.sql, "SELECT id FROM users WHERE FALSE AND TRUE");
    assert!(stmt.params.is_empty());
}

#[test]
fn subqueries_are_normalized_and_aliased() {
    let inner = select(["MAX(score)"]).from("scores").where_eq("scores.user_id", raw("users.id"));
    let query = select(["users.name"]).field(inner.r#as("best")).from("users");

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT users.name, (SELECT MAX(score) FROM scores WHERE scores.user_id = users.id) AS \
         best FROM users"
    );
}

#[test]
fn literal_values() {
    let ts = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(8, 5, 1).unwrap();
    let query = select(["id"])
        .from("events")
        .where_eq("price", 1000.0)
        .where_eq("at", ts)
        .where_eq("note", "it's \"quoted\"")
        .where_eq("deleted", Value::Null)
        .where_eq("flag", false);

    let stmt = sql(&query, literal());
    assert_eq!(
        stmt.sql,
        "SELECT id FROM events WHERE price = 1000.000000 AND at = '2024-03-09 08:05:01' AND \
         note = 'it\\'s \\\"quoted\\\"' AND deleted = NULL AND flag = FALSE"
    );

    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.params.len(), 4);
    assert_eq!(stmt.params[1], DataType::Timestamp(Some("2024-03-09 08:05:01".to_string())));
}

#[test]
fn raw_fragments_bind_arguments() {
    let query = select(["id"]).from("users").r#where(and().eq("id", raw("COALESCE(?, 0)").arg(7)));
    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.sql, "SELECT id FROM users WHERE (id = COALESCE(?, 0))");
    assert_eq!(stmt.params, vec![DataType::Int64(Some(7))]);
}

#[test]
fn binary_values() {
    let bytes = vec![0xff_u8, 0xfe, 0x00, 0x41];
    let query = insert_into("files").set("data", bytes.clone());

    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.sql, "INSERT INTO files SET data = ?");
    assert_eq!(stmt.params, vec![DataType::Binary(Some(bytes.clone()))]);

    assert_eq!(sql(&query, literal()).sql, "INSERT INTO files SET data = X'FFFE0041'");

    let stmt = sql(&select(["id"]).from("files").where_eq("data", bytes.as_slice()), SQLITE);
    assert_eq!(stmt.params, vec![DataType::Binary(Some(bytes))]);
}

// INSERT tests

#[test]
fn insert_set_form() {
    let query = insert_into("users")
        .set_many([("field1", Value::from("value1")), ("field2", Value::from(2))]);
    assert_eq!(sql(&query, literal()).sql, "INSERT INTO users SET field1 = 'value1', field2 = 2");

    let stmt = sql(&query, MYSQL);
    assert_eq!(stmt.sql, "INSERT INTO users SET field1 = ?, field2 = ?");
    assert_eq!(
        stmt.params,
        vec![DataType::Str(Some("value1".to_string())), DataType::Int64(Some(2))]
    );
}

#[test]
fn insert_variants() {
    let ignore = QueryBuilder::new().insert_ignore_into("users").set("id", 1);
    assert_eq!(sql(&ignore, literal()).sql, "INSERT IGNORE INTO users SET id = 1");
    assert_eq!(sql(&ignore, SQLITE).sql, "INSERT OR IGNORE INTO users (id) VALUES (?)");

    let upsert = QueryBuilder::new().insert_update_into("users").set("id", 1).set("name", "a");
    assert_eq!(
        sql(&upsert, literal()).sql,
        "INSERT INTO users SET id = 1, name = 'a' ON DUPLICATE KEY UPDATE id = 1, name = 'a'"
    );
    assert_eq!(
        sql(&upsert, SQLITE).sql,
        "INSERT INTO users (id, name) VALUES (?, ?) ON CONFLICT DO UPDATE SET id = ?, name = ?"
    );
}

// UPDATE and DELETE tests

#[test]
fn update_with_join() {
    let query = update("users")
        .left_join_eq("accounts", "accounts.user_id", "users.id")
        .set("name", "x")
        .set("age", 3)
        .where_eq("accounts.id", 1)
        .order_by("users.id", Direction::Asc)
        .limit(0, 1);

    assert_eq!(
        sql(&query, literal()).sql,
        "UPDATE users LEFT JOIN accounts ON accounts.user_id = users.id SET age = 3, name = 'x' \
         WHERE accounts.id = 1 ORDER BY users.id ASC LIMIT 1"
    );

    let err = query.transcribe(SQLITE).unwrap_err();
    assert!(matches!(err, Error::Unsupported { dialect: "sqlite", .. }));
}

#[test]
fn delete_forms() {
    let query = delete_from("users").where_lt("age", 3);
    assert_eq!(sql(&query, literal()).sql, "DELETE FROM users WHERE age < 3");
    assert_eq!(sql(&query, SQLITE).sql, "DELETE FROM users WHERE age < ?");

    let multi = delete_from("users")
        .delete(["users"])
        .inner_join_eq("bans", "bans.user_id", "users.id")
        .where_is_true("bans.active");
    assert_eq!(
        sql(&multi, MYSQL).sql,
        "DELETE users FROM users INNER JOIN bans ON bans.user_id = users.id WHERE bans.active IS \
         TRUE"
    );
    assert!(multi.transcribe(SQLITE).is_err());
}

// Composition and errors

#[test]
fn compose_merges_fragments() {
    let a = select(["users.*"]).from("users").where_eq("active", true).order_by("id", Direction::Asc);
    let b = QueryBuilder::new()
        .field("accounts.balance")
        .left_join_eq("accounts", "accounts.user_id", "users.id")
        .where_gt("accounts.balance", 0)
        .limit(0, 5);

    let stmt = sql(&a.compose(b), MYSQL);
    assert_sql_contains(
        &stmt.sql,
        &[
            "SELECT users.*, accounts.balance",
            "FROM users",
            "LEFT JOIN accounts ON accounts.user_id = users.id",
            "WHERE active = ? AND accounts.balance > ?",
            "ORDER BY id ASC",
            "LIMIT 5",
        ],
    );
}

#[test]
fn compose_replaces_cleared_lists() {
    let a = select(["a", "b"]).from("t").order_by("a", Direction::Asc);
    let b = QueryBuilder::new().clear_fields().field("c").clear_order_by().order_by("c", Direction::Desc);
    assert_eq!(sql(&a.compose(b), MYSQL).sql, "SELECT c FROM t ORDER BY c DESC");
}

#[test]
fn transcription_is_deterministic() {
    let query = update("users").set("b", 2).set("a", 1).set("c", "x").where_in("id", vec![1, 2]);
    assert_eq!(sql(&query, MYSQL), sql(&query, MYSQL));
    assert_eq!(sql(&query, MYSQL).sql, "UPDATE users SET a = ?, b = ?, c = ? WHERE id IN(?, ?)");
}

#[test]
fn construction_errors() {
    let err = select([""]).from("users").transcribe(MYSQL).unwrap_err();
    assert!(matches!(err, Error::EmptyIdentifier));
    assert!(!err.is_fatal());

    let err = select(["id"]).from("users").where_eq("id", raw("  ")).transcribe(MYSQL).unwrap_err();
    assert!(matches!(err, Error::EmptyRaw));

    let err = select(["id"]).transcribe("oracle").unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn writes_require_a_table() {
    for kind in [QueryKind::Insert, QueryKind::Update] {
        let query = QueryBuilder {
            kind,
            ..QueryBuilder::new()
        }
        .set("name", "a");

        for dialect in [MYSQL, SQLITE] {
            let err = query.transcribe(dialect).unwrap_err();
            assert!(matches!(err, Error::MissingTable(k) if k == kind.as_str()));
            assert!(err.is_fatal());
        }
    }
}
