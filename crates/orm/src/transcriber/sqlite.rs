//! SQLite dialect.

use crate::error::Result;
use crate::query::QueryBuilder;
use crate::transcriber::writer::{Dialect, InsertStyle, Writer};
use crate::transcriber::{SQLITE, Statement, Transcriber};

/// Transcribes queries for SQLite.
///
/// Inserts use `(columns) VALUES (...)`; `InsertIgnore` becomes
/// `INSERT OR IGNORE` and `InsertUpdate` appends `ON CONFLICT DO UPDATE SET`.
/// SQLite cannot join in `UPDATE`/`DELETE` or delete through target fields;
/// such queries are rejected.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite {
    placeholders: bool,
}

impl Sqlite {
    /// Placeholder mode.
    #[must_use]
    pub const fn new() -> Self {
        Self { placeholders: true }
    }

    /// Literal mode.
    #[must_use]
    pub const fn literal() -> Self {
        Self { placeholders: false }
    }
}

impl Default for Sqlite {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        SQLITE
    }

    fn placeholders(&self) -> bool {
        self.placeholders
    }

    /// Doubles single quotes. `SQLite` has no backslash escapes, so the
    /// `MySQL` form would leave the backslashes in the stored text.
    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn unlimited(&self) -> &'static str {
        "-1"
    }

    fn insert_style(&self) -> InsertStyle {
        InsertStyle::Values
    }

    fn multi_table_writes(&self) -> bool {
        false
    }
}

impl Transcriber for Sqlite {
    fn transcribe(&self, query: &QueryBuilder) -> Result<Statement> {
        Writer::new(self).statement(query)
    }
}
