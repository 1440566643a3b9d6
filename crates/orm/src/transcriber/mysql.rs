//! MySQL dialect.

use crate::error::Result;
use crate::query::QueryBuilder;
use crate::transcriber::writer::{Dialect, InsertStyle, Writer};
use crate::transcriber::{MYSQL, Statement, Transcriber};

/// Transcribes queries for MySQL.
///
/// Inserts use the `SET` form; `InsertIgnore` becomes `INSERT IGNORE` and
/// `InsertUpdate` repeats the assignments after `ON DUPLICATE KEY UPDATE`.
#[derive(Debug, Clone, Copy)]
pub struct MySql {
    placeholders: bool,
}

impl MySql {
    /// Placeholder mode: literals become `?` with collected arguments.
    #[must_use]
    pub const fn new() -> Self {
        Self { placeholders: true }
    }

    /// Literal mode: values are inlined and no arguments are produced.
    #[must_use]
    pub const fn literal() -> Self {
        Self { placeholders: false }
    }
}

impl Default for MySql {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        MYSQL
    }

    fn placeholders(&self) -> bool {
        self.placeholders
    }

    fn quote(&self, value: &str) -> String {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('\'');
        for c in value.chars() {
            match c {
                '\\' | '\'' | '"' => {
                    quoted.push('\\');
                    quoted.push(c);
                }
                '\0' => quoted.push_str("\\0"),
                _ => quoted.push(c),
            }
        }
        quoted.push('\'');
        quoted
    }

    fn unlimited(&self) -> &'static str {
        "18446744073709551615"
    }

    fn insert_style(&self) -> InsertStyle {
        InsertStyle::Set
    }

    fn multi_table_writes(&self) -> bool {
        true
    }
}

impl Transcriber for MySql {
    fn transcribe(&self, query: &QueryBuilder) -> Result<Statement> {
        Writer::new(self).statement(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_addslashes() {
        assert_eq!(MySql::new().quote(r#"O'Brien "x" \ y"#), r#"'O\'Brien \"x\" \\ y'"#);
    }

    #[test]
    fn offset_without_limit_uses_max_rows() {
        let stmt = MySql::literal().transcribe(&crate::select(["*"]).from("users").offset(5)).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users LIMIT 5, 18446744073709551615");
    }
}
