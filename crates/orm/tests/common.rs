//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use strata_orm::{Db, Json, Statement, Transcribe, entity, raw};
use strata_sql::{Backend, ConnectOptions, SqlDefault};

entity! {
    table = "parents",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Parent {
        #[column("parent_id", primary)]
        pub id: i64,
        #[column("parent_name")]
        pub name: Option<String>,
        #[column("parent_status")]
        pub status: String,
        #[column("parent_data")]
        pub data: Json<BTreeMap<String, String>>,
        pub no_field: String,
    }
}

entity! {
    table = "children",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Child {
        #[column("parent_id", foreign("parents"))]
        pub parent: Parent,
        #[column("child_id", primary)]
        pub id: i64,
        #[column("child_name")]
        pub name: String,
    }
}

entity! {
    table = "friends",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Friend {
        #[column("friend_id", primary)]
        pub id: i64,
        #[column("friend_name")]
        pub name: String,
    }
}

entity! {
    table = "blobs",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Blob {
        #[column("blob_id", primary)]
        pub id: i64,
        #[column("payload")]
        pub payload: Vec<u8>,
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE parents (
        parent_id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_name TEXT NULL,
        parent_status TEXT NOT NULL DEFAULT '',
        parent_data TEXT NULL
    )",
    "CREATE TABLE children (
        child_id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER NULL,
        child_name TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE friends (
        friend_id INTEGER PRIMARY KEY AUTOINCREMENT,
        friend_name TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE parents_friends (
        parent_id INTEGER NOT NULL,
        friend_id INTEGER NOT NULL,
        PRIMARY KEY (parent_id, friend_id)
    )",
    "CREATE TABLE blobs (
        blob_id INTEGER PRIMARY KEY AUTOINCREMENT,
        payload BLOB NULL
    )",
];

const SEED: &[&str] = &[
    r#"INSERT INTO parents (parent_name, parent_status, parent_data)
        VALUES ('Parent 1', 'active', '{"role":"owner"}')"#,
    "INSERT INTO parents (parent_name, parent_status) VALUES ('Parent 2', 'inactive')",
    "INSERT INTO children (child_name) VALUES ('Child 1')",
    "INSERT INTO children (child_name) VALUES ('Child 2')",
    "INSERT INTO friends (friend_name) VALUES ('Friend 1')",
    "INSERT INTO friends (friend_name) VALUES ('Friend 2')",
];

/// A fresh in-memory database with the test schema, seed rows and
/// relations declared.
#[allow(clippy::missing_panics_doc)]
pub async fn setup() -> Db {
    init_tracing();

    let conn = SqlDefault::connect_with(ConnectOptions {
        database: ":memory:".to_string(),
    })
    .await
    .expect("connect");
    let db = Db::new(conn);

    for sql in SCHEMA.iter().chain(SEED) {
        db.exec(&raw(*sql)).await.expect("prepare database");
    }

    db.many_to_one::<Child, Parent>().expect("children -> parents");
    db.one_to_many::<Parent, Child>().expect("parents -> children");
    db.many_to_many::<Parent, Friend>("parents_friends").expect("parents <-> friends");
    db
}

/// Install a `fmt` subscriber honouring `RUST_LOG`, once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transcribe `query` for `dialect`, panicking on failure.
#[allow(clippy::missing_panics_doc)]
pub fn sql(query: &impl Transcribe, dialect: &str) -> Statement {
    query.transcribe(dialect).expect("transcribe")
}

/// Assert that SQL contains all expected fragments in order.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual = strata_orm::normalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment = strata_orm::normalize_sql(fragment);
        if fragment.is_empty() {
            continue;
        }

        if let Some(pos) = actual[search_start..].find(&fragment) {
            search_start += pos + fragment.len();
        } else {
            panic!("expected SQL fragment `{fragment}` not found in `{actual}`");
        }
    }
}
