//! Integration tests for the embedded SQLite backend.

#![allow(missing_docs)]

use strata_sql::{Backend, Connection, DataType, SqlDefault, into_json};

#[tokio::test]
async fn connects_from_environment() {
    // SQL_DATABASE unset: shared in-memory database
    let conn = SqlDefault::connect().await.expect("connect");
    assert_eq!(conn.dialect(), "sqlite");

    conn.exec("CREATE TABLE IF NOT EXISTS env_items (id INTEGER PRIMARY KEY)".to_string(), vec![])
        .await
        .expect("create table");
}

#[tokio::test]
async fn empty_results_still_report_columns() {
    let conn = SqlDefault::connect().await.expect("connect");
    conn.exec(
        "CREATE TABLE IF NOT EXISTS described (id INTEGER PRIMARY KEY, label TEXT NOT NULL)"
            .to_string(),
        vec![],
    )
    .await
    .expect("create table");

    let mut rows = conn
        .query("SELECT * FROM described WHERE ? = ?".to_string(), vec![
            DataType::Int32(Some(1)),
            DataType::Int32(Some(0)),
        ])
        .await
        .expect("query");

    let names: Vec<_> = rows.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "label"]);
    assert_eq!(rows.columns()[1].decl_type.as_deref(), Some("TEXT"));
    assert!(!rows.advance());
    assert!(rows.is_closed());
}

#[tokio::test]
async fn rows_project_to_json() {
    let conn = SqlDefault::connect().await.expect("connect");
    conn.exec("CREATE TABLE IF NOT EXISTS tagged (id INTEGER PRIMARY KEY, tag TEXT)".to_string(), vec![])
        .await
        .expect("create table");
    conn.exec("DELETE FROM tagged".to_string(), vec![]).await.expect("reset");
    conn.exec(
        "INSERT INTO tagged (id, tag) VALUES (?, ?)".to_string(),
        vec![DataType::Int64(Some(1)), DataType::Str(None)],
    )
    .await
    .expect("insert");

    let mut rows = conn.query("SELECT id, tag FROM tagged".to_string(), vec![]).await.expect("query");
    let mut collected = Vec::new();
    while rows.advance() {
        collected.push(rows.current().cloned().expect("current row"));
    }

    let json = into_json(collected).expect("json");
    assert_eq!(json, serde_json::json!([{"id": 1, "tag": null}]));
}
