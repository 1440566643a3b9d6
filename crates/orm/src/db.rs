//! # Database Handle
//!
//! [`Db`] pairs a [`Connection`] with the [`Schema`] its relations are
//! declared against. Queries are transcribed for the connection's dialect,
//! logged, and handed to the backend.

use std::marker::PhantomData;
use std::sync::Arc;

use strata_sql::{Column, Connection, ExecResult, Rows as SqlRows};

use crate::entity::{self, Entity};
use crate::error::{Error, Result};
use crate::field::FieldValue;
use crate::schema::Schema;
use crate::transcriber::{Statement, Transcribe};

/// A connection plus its relation catalog. Clones share both.
#[derive(Clone, Debug)]
pub struct Db {
    conn: Arc<dyn Connection>,
    schema: Arc<Schema>,
}

impl Db {
    /// Wrap `conn` with an empty schema.
    pub fn new(conn: impl Connection) -> Self {
        Self::from_arc(Arc::new(conn))
    }

    /// Wrap a shared connection with an empty schema.
    #[must_use]
    pub fn from_arc(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            schema: Arc::new(Schema::new()),
        }
    }

    /// Dialect identity of the underlying connection.
    #[must_use]
    pub fn dialect(&self) -> &'static str {
        self.conn.dialect()
    }

    /// The relation catalog.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Transcribe `query` for this handle's dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription fails.
    pub fn transcribe(&self, query: &impl Transcribe) -> Result<Statement> {
        query.transcribe(self.dialect())
    }

    /// Run `query` and return the raw row cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription or the backend fails.
    pub async fn query_rows(&self, query: &impl Transcribe) -> Result<SqlRows> {
        let statement = self.transcribe(query)?;
        self.fetch(&statement).await
    }

    /// Run `query` and return a cursor hydrating rows into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription or the backend fails.
    pub async fn query<T: Entity>(&self, query: &impl Transcribe) -> Result<Rows<T>> {
        let statement = self.transcribe(query)?;
        let inner = self.fetch(&statement).await?;
        Ok(Rows {
            inner,
            statement,
            _marker: PhantomData,
        })
    }

    /// Run a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if transcription or the backend fails.
    pub async fn exec(&self, query: &impl Transcribe) -> Result<ExecResult> {
        let Statement { sql, params } = self.transcribe(query)?;
        tracing::debug!(dialect = self.dialect(), sql = %sql, params = ?params, "executing statement");

        match self.conn.exec(sql.clone(), params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(dialect = self.dialect(), sql = %sql, "statement failed: {e:#}");
                Err(Error::Driver(e))
            }
        }
    }

    async fn fetch(&self, statement: &Statement) -> Result<SqlRows> {
        tracing::debug!(
            dialect = self.dialect(),
            sql = %statement.sql,
            params = ?statement.params,
            "executing query"
        );

        match self.conn.query(statement.sql.clone(), statement.params.clone()).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                tracing::error!(dialect = self.dialect(), sql = %statement.sql, "query failed: {e:#}");
                Err(Error::Driver(e))
            }
        }
    }
}

/// A row cursor that hydrates each row into `T`.
#[derive(Debug)]
pub struct Rows<T> {
    inner: SqlRows,
    statement: Statement,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Rows<T> {
    /// Move to the next row. Returns `false`, and closes the cursor, once the
    /// rows are exhausted.
    pub fn advance(&mut self) -> bool {
        self.inner.advance()
    }

    /// Hydrate the current row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when there is no current row, or a mapping
    /// error when hydration fails.
    pub fn current(&self) -> Result<T> {
        let row = self.inner.current().ok_or(Error::NotFound)?;
        entity::from_row(row, self.inner.columns())
    }

    /// Hydrate the first row and close the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the result is empty.
    pub fn row(mut self) -> Result<T> {
        if !self.advance() {
            return Err(Error::NotFound);
        }
        let entity = self.current();
        self.close();
        entity
    }

    /// Hydrate every remaining row. The cursor is released on the first
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the first mapping error encountered.
    pub fn all(self) -> Result<Vec<T>> {
        self.collect()
    }

    /// Read column `name` from every remaining row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if the result has no such column, or
    /// a conversion error.
    pub fn column<U: FieldValue + Default>(mut self, name: &str) -> Result<Vec<U>> {
        if !self.inner.columns().iter().any(|c| c.name == name) {
            self.close();
            return Err(Error::MissingColumn(name.to_string()));
        }

        let mut values = Vec::new();
        while self.advance() {
            let Some(cell) = self.inner.current().and_then(|row| row.get(name)) else {
                continue;
            };
            let mut value = U::default();
            if let Err(e) = value.scan(cell) {
                self.close();
                return Err(Error::convert(name, e));
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Column descriptors of the result.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.inner.columns()
    }

    /// The statement that produced these rows.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Release the cursor.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<T: Entity> Iterator for Rows<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.advance() {
            return None;
        }
        let entity = self.current();
        if entity.is_err() {
            self.close();
        }
        Some(entity)
    }
}
