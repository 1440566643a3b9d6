//! Dialect transcribers: lower a [`QueryBuilder`] into SQL text plus
//! positional arguments.
//!
//! A process-wide registry maps a dialect identity (as reported by
//! [`Connection::dialect`]) to its transcriber. `mysql` and `sqlite` are
//! registered on first use, both in placeholder mode. Register additional
//! dialects, or literal-mode variants, during startup with
//! [`register_transcriber`].
//!
//! [`Connection::dialect`]: strata_sql::Connection::dialect

mod mysql;
mod sqlite;
mod writer;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use strata_sql::DataType;

pub use self::mysql::MySql;
pub use self::sqlite::Sqlite;
use crate::error::{Error, Result};
use crate::query::QueryBuilder;
use crate::value::Raw;

/// Dialect identity of [`MySql`].
pub const MYSQL: &str = "mysql";

/// Dialect identity of [`Sqlite`].
pub const SQLITE: &str = "sqlite";

/// SQL text and the arguments bound to its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,

    /// Positional arguments, in placeholder order.
    pub params: Vec<DataType>,
}

/// Compiles query builders into SQL for one dialect.
pub trait Transcriber: Send + Sync {
    /// Transcribe `query` into SQL text and arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when the query holds an invalid value or a construct
    /// the dialect cannot express.
    fn transcribe(&self, query: &QueryBuilder) -> Result<Statement>;
}

/// Anything that can be turned into a statement for a given dialect.
pub trait Transcribe {
    /// Produce the statement for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns an error if no transcriber is registered for `dialect` or
    /// transcription fails.
    fn transcribe(&self, dialect: &str) -> Result<Statement>;
}

impl Transcribe for QueryBuilder {
    fn transcribe(&self, dialect: &str) -> Result<Statement> {
        transcriber(dialect)?.transcribe(self)
    }
}

impl Transcribe for Raw {
    fn transcribe(&self, _dialect: &str) -> Result<Statement> {
        if self.sql.trim().is_empty() {
            return Err(Error::EmptyRaw);
        }
        Ok(Statement {
            sql: self.sql.clone(),
            params: self.args.iter().map(writer::param).collect::<Result<_>>()?,
        })
    }
}

impl Transcribe for Statement {
    fn transcribe(&self, _dialect: &str) -> Result<Statement> {
        Ok(self.clone())
    }
}

type Registry = HashMap<String, Arc<dyn Transcriber>>;

static TRANSCRIBERS: LazyLock<RwLock<Registry>> = LazyLock::new(|| {
    let mut registry: Registry = HashMap::new();
    registry.insert(MYSQL.to_string(), Arc::new(MySql::new()));
    registry.insert(SQLITE.to_string(), Arc::new(Sqlite::new()));
    RwLock::new(registry)
});

/// Register (or replace) the transcriber for `dialect`.
pub fn register_transcriber(dialect: impl Into<String>, transcriber: impl Transcriber + 'static) {
    let dialect = dialect.into();
    tracing::debug!(dialect = %dialect, "registering transcriber");
    TRANSCRIBERS.write().insert(dialect, Arc::new(transcriber));
}

/// The transcriber registered for `dialect`.
///
/// # Errors
///
/// Returns [`Error::NoTranscriber`] if nothing is registered for `dialect`.
pub fn transcriber(dialect: &str) -> Result<Arc<dyn Transcriber>> {
    TRANSCRIBERS
        .read()
        .get(dialect)
        .map(Arc::clone)
        .ok_or_else(|| Error::NoTranscriber(dialect.to_string()))
}

/// Trim SQL and collapse runs of whitespace into single spaces.
#[must_use]
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
