//! Default `SQLite` implementation for strata-sql
//!
//! This is a lightweight implementation for development use only.

#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(missing_docs)]

use std::sync::Arc;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use futures::FutureExt;
use rusqlite::types::ValueRef;
use rusqlite::{Connection as SqliteConnection, params_from_iter};
use tracing::instrument;

use crate::connection::Connection;
use crate::traits::{Backend, FutureResult};
use crate::types::{Column, DataType, ExecResult, Field, Row, Rows};

/// Options used to connect to the SQL database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,
}

impl crate::traits::FromEnv for ConnectOptions {
    fn from_env() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

/// Default [`Connection`] backed by an embedded `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqlDefault {
    // Mutex is necessary since rusqlite::Connection isn't `Sync`
    conn: Arc<parking_lot::Mutex<SqliteConnection>>,
}

impl Backend for SqlDefault {
    type ConnectOptions = ConnectOptions;

    #[instrument]
    async fn connect_with(options: Self::ConnectOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);

        let conn = Arc::new(parking_lot::Mutex::new(
            SqliteConnection::open(&options.database).context("failed to open SQLite database")?,
        ));

        Ok(Self { conn })
    }
}

impl Connection for SqlDefault {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn query(&self, query: String, params: Vec<DataType>) -> FutureResult<Rows> {
        tracing::debug!("executing query: {}", query);
        let conn = Arc::clone(&self.conn);

        async move {
            let conn = conn.lock();
            let mut stmt = conn.prepare(&query).context("failed to prepare statement")?;

            let sqlite_params: Vec<_> = params.iter().map(datatype_to_sqlite_value).collect();

            // capture descriptors before stepping; they are available even
            // when the result set is empty
            let columns: Vec<Column> = stmt
                .columns()
                .iter()
                .map(|column| Column {
                    name: column.name().to_string(),
                    decl_type: column.decl_type().map(ToString::to_string),
                })
                .collect();

            let mut rows =
                stmt.query(params_from_iter(sqlite_params.iter())).context("failed to execute query")?;

            let mut result_rows = Vec::new();
            while let Some(row) = rows.next().context("failed to fetch row")? {
                let mut fields = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    let value = row.get_ref(i).context("failed to get column value")?;
                    fields.push(Field {
                        name: column.name.clone(),
                        value: sqlite_value_to_datatype(value)?,
                    });
                }

                result_rows.push(Row {
                    index: result_rows.len(),
                    fields,
                });
            }

            Ok(Rows::new(columns, result_rows))
        }
        .boxed()
    }

    fn exec(&self, query: String, params: Vec<DataType>) -> FutureResult<ExecResult> {
        tracing::debug!("executing statement: {}", query);
        let conn = Arc::clone(&self.conn);

        async move {
            let conn = conn.lock();
            let rows_affected = {
                let mut stmt = conn.prepare(&query).context("failed to prepare statement")?;
                let sqlite_params: Vec<_> = params.iter().map(datatype_to_sqlite_value).collect();
                stmt.execute(params_from_iter(sqlite_params.iter()))
                    .context("failed to execute statement")?
            };

            Ok(ExecResult {
                rows_affected: rows_affected as u64,
                last_insert_id: Some(conn.last_insert_rowid()),
            })
        }
        .boxed()
    }
}

fn datatype_to_sqlite_value(dt: &DataType) -> rusqlite::types::Value {
    match dt {
        DataType::Boolean(Some(b)) => rusqlite::types::Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => rusqlite::types::Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => rusqlite::types::Value::Integer(*i),
        DataType::Uint32(Some(u)) => rusqlite::types::Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => rusqlite::types::Value::Integer(*u as i64),
        DataType::Float(Some(f)) => rusqlite::types::Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => rusqlite::types::Value::Real(*f),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => rusqlite::types::Value::Text(s.clone()),
        DataType::Binary(Some(b)) => rusqlite::types::Value::Blob(b.clone()),
        // All None variants map to NULL
        _ => rusqlite::types::Value::Null,
    }
}

fn sqlite_value_to_datatype(value: ValueRef) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::Str(None)),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_operations() {
        let conn = SqlDefault::connect_with(ConnectOptions {
            database: ":memory:".to_string(),
        })
        .await
        .expect("connect");
        assert_eq!(conn.dialect(), "sqlite");

        conn.exec(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)".to_string(),
            vec![],
        )
        .await
        .expect("create table");

        let result = conn
            .exec(
                "INSERT INTO users (name, age) VALUES (?, ?)".to_string(),
                vec![DataType::Str(Some("Alice".to_string())), DataType::Int32(Some(30))],
            )
            .await
            .expect("insert");
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(1));

        let result = conn
            .exec(
                "INSERT INTO users (name, age) VALUES (?, ?)".to_string(),
                vec![DataType::Str(Some("Bob".to_string())), DataType::Int32(Some(25))],
            )
            .await
            .expect("insert");
        assert_eq!(result.last_insert_id, Some(2));

        let mut rows = conn
            .query("SELECT id, name, age FROM users ORDER BY name".to_string(), vec![])
            .await
            .expect("query");

        assert_eq!(rows.columns().len(), 3);
        assert_eq!(rows.columns()[1].decl_type.as_deref(), Some("TEXT"));
        assert!(rows.advance());
        assert_eq!(
            rows.current().unwrap().get("name"),
            Some(&DataType::Str(Some("Alice".to_string())))
        );
        assert!(rows.advance());
        assert!(!rows.advance());
    }

    #[tokio::test]
    async fn empty_result_reports_columns() {
        let conn = SqlDefault::connect_with(ConnectOptions {
            database: ":memory:".to_string(),
        })
        .await
        .expect("connect");

        conn.exec("CREATE TABLE items (item_id INTEGER, label TEXT)".to_string(), vec![])
            .await
            .expect("create table");

        let mut rows = conn
            .query("SELECT * FROM items WHERE 1 = 0".to_string(), vec![])
            .await
            .expect("query");

        let names: Vec<_> = rows.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["item_id", "label"]);
        assert!(!rows.advance());
    }

    #[test]
    fn null_maps_to_sqlite_null() {
        assert_eq!(datatype_to_sqlite_value(&DataType::Int64(None)), rusqlite::types::Value::Null);
        assert_eq!(
            datatype_to_sqlite_value(&DataType::Timestamp(Some("2024-01-01 00:00:00".to_string()))),
            rusqlite::types::Value::Text("2024-01-01 00:00:00".to_string())
        );
    }
}
