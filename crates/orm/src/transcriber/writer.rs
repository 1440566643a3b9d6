//! Clause emission shared by the built-in dialects.

use strata_sql::DataType;

use crate::condition::{Binary, Condition, ConditionSet, Unary};
use crate::error::{Error, Result};
use crate::query::{QueryBuilder, QueryKind, UnionKind};
use crate::transcriber::{Statement, normalize_sql};
use crate::value::{TIMESTAMP_FORMAT, Value};

/// How a dialect spells inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertStyle {
    /// `INSERT INTO t SET a = ?` with `INSERT IGNORE` and
    /// `ON DUPLICATE KEY UPDATE`.
    Set,
    /// `INSERT INTO t (a) VALUES (?)` with `INSERT OR IGNORE` and
    /// `ON CONFLICT DO UPDATE SET`.
    Values,
}

/// Per-dialect hooks consulted by the [`Writer`].
pub(crate) trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Emit `?` and collect arguments instead of inlining literals.
    fn placeholders(&self) -> bool;

    /// Quote and escape a string literal.
    fn quote(&self, value: &str) -> String;

    /// Row count standing in for "no limit" when only an offset is set.
    fn unlimited(&self) -> &'static str;

    fn insert_style(&self) -> InsertStyle;

    /// Whether `UPDATE`/`DELETE` may join other tables.
    fn multi_table_writes(&self) -> bool;
}

/// Convert a raw-fragment argument into a driver value.
pub(crate) fn param(value: &Value) -> Result<DataType> {
    Ok(match value {
        Value::String(s) => DataType::Str(Some(s.clone())),
        Value::Int(i) => DataType::Int64(Some(*i)),
        Value::UInt(u) => DataType::Uint64(Some(*u)),
        Value::Float(f) => DataType::Double(Some(*f)),
        Value::Bool(b) => DataType::Boolean(Some(*b)),
        Value::Timestamp(ts) => DataType::Timestamp(Some(ts.format(TIMESTAMP_FORMAT).to_string())),
        Value::Bytes(bytes) => DataType::Binary(Some(bytes.clone())),
        Value::Null => DataType::Str(None),
        other => {
            return Err(Error::InvalidValue {
                context: "raw argument",
                value: format!("{other:?}"),
            });
        }
    })
}

/// `X'..'` blob literal, understood by both `MySQL` and `SQLite`.
fn hex_literal(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
    format!("X'{hex}'")
}

/// Walks a query, emitting clauses in dialect order and collecting
/// arguments in placeholder order.
pub(crate) struct Writer<'a> {
    dialect: &'a dyn Dialect,
    params: Vec<DataType>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    pub(crate) fn statement(mut self, query: &QueryBuilder) -> Result<Statement> {
        let sql = self.clauses(query)?.join(" ");
        tracing::debug!(
            dialect = self.dialect.name(),
            kind = %query.kind,
            sql = %sql,
            params = self.params.len(),
            "transcribed query"
        );
        Ok(Statement {
            sql,
            params: self.params,
        })
    }

    fn clauses(&mut self, query: &QueryBuilder) -> Result<Vec<String>> {
        let mut out = Vec::new();
        match query.kind {
            QueryKind::Select => self.select(query, &mut out)?,
            QueryKind::Insert | QueryKind::InsertIgnore | QueryKind::InsertUpdate => {
                self.insert(query, &mut out)?;
            }
            QueryKind::Update => self.update(query, &mut out)?,
            QueryKind::Delete => self.delete(query, &mut out)?,
        }
        Ok(out)
    }

    fn select(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        let fields =
            if query.fields.is_empty() { "*".to_string() } else { self.list(&query.fields)? };
        out.push(format!("SELECT {fields}"));
        if let Some(table) = &query.table {
            out.push(format!("FROM {}", self.value(table)?));
        }
        self.joins(query, out)?;
        self.filters(query, out)?;
        self.unions(query, out)
    }

    fn update(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        let table = self.table(query)?;
        out.push(format!("UPDATE {table}"));
        self.write_joins(query, out)?;
        if !query.values.is_empty() {
            out.push(format!("SET {}", self.assignments(query)?));
        }
        self.filters(query, out)
    }

    fn delete(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        if query.fields.is_empty() {
            let table = self.table(query)?;
            out.push(format!("DELETE FROM {table}"));
        } else {
            if !self.dialect.multi_table_writes() {
                return Err(self.unsupported("DELETE with target fields"));
            }
            let fields = self.list(&query.fields)?;
            let table = self.table(query)?;
            out.push(format!("DELETE {fields} FROM {table}"));
        }
        self.write_joins(query, out)?;
        self.filters(query, out)
    }

    fn insert(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        let ignore = query.kind == QueryKind::InsertIgnore;
        let upsert = query.kind == QueryKind::InsertUpdate;
        let table = self.table(query)?;

        match self.dialect.insert_style() {
            InsertStyle::Set => {
                let head = if ignore { "INSERT IGNORE INTO" } else { "INSERT INTO" };
                out.push(format!("{head} {table}"));
                self.joins(query, out)?;
                if !query.values.is_empty() {
                    out.push(format!("SET {}", self.assignments(query)?));
                }
                if upsert {
                    out.push(format!("ON DUPLICATE KEY UPDATE {}", self.assignments(query)?));
                }
            }
            InsertStyle::Values => {
                if !query.joins.is_empty() {
                    return Err(self.unsupported("joins in INSERT"));
                }
                let head = if ignore { "INSERT OR IGNORE INTO" } else { "INSERT INTO" };
                out.push(format!("{head} {table}"));
                if query.values.is_empty() {
                    out.push("DEFAULT VALUES".to_string());
                } else {
                    let columns = query.values.keys().map(String::as_str).collect::<Vec<_>>();
                    let mut values = Vec::with_capacity(columns.len());
                    for value in query.values.values() {
                        values.push(self.value(value)?);
                    }
                    out.push(format!("({}) VALUES ({})", columns.join(", "), values.join(", ")));
                }
                if upsert {
                    if query.values.is_empty() {
                        out.push("ON CONFLICT DO NOTHING".to_string());
                    } else {
                        out.push(format!("ON CONFLICT DO UPDATE SET {}", self.assignments(query)?));
                    }
                }
            }
        }
        Ok(())
    }

    /// `WHERE`, `GROUP BY`, `HAVING`, `ORDER BY` and `LIMIT`, in that order.
    fn filters(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        if !query.where_set.is_empty() {
            out.push(format!("WHERE {}", self.condition_set(&query.where_set)?));
        }
        if !query.group_by.is_empty() {
            out.push(format!("GROUP BY {}", self.list(&query.group_by)?));
        }
        if !query.having_set.is_empty() {
            out.push(format!("HAVING {}", self.condition_set(&query.having_set)?));
        }
        if !query.order_by.is_empty() {
            let mut terms = Vec::with_capacity(query.order_by.len());
            for order in &query.order_by {
                terms.push(format!("{} {}", self.value(&order.field)?, order.direction.as_sql()));
            }
            out.push(format!("ORDER BY {}", terms.join(", ")));
        }
        let window = match (query.offset.start, query.offset.limit) {
            (0, None) => None,
            (0, Some(limit)) => Some(limit.to_string()),
            (start, Some(limit)) => Some(format!("{start}, {limit}")),
            (start, None) => Some(format!("{start}, {}", self.dialect.unlimited())),
        };
        if let Some(window) = window {
            out.push(format!("LIMIT {window}"));
        }
        Ok(())
    }

    fn write_joins(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        if !query.joins.is_empty() && !self.dialect.multi_table_writes() {
            return Err(self.unsupported(format!("joins in {}", query.kind.as_str().to_uppercase())));
        }
        self.joins(query, out)
    }

    fn joins(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        for join in &query.joins {
            let table = self.value(&join.table)?;
            let on = self.condition_set(&join.on)?;
            out.push(format!("{} {table} ON {on}", join.kind.as_sql()));
        }
        Ok(())
    }

    fn unions(&mut self, query: &QueryBuilder, out: &mut Vec<String>) -> Result<()> {
        for union in &query.unions {
            let keyword = match union.kind {
                UnionKind::Distinct => "UNION",
                UnionKind::All => "UNION ALL",
            };
            let sql = self.clauses(&union.query)?.join(" ");
            out.push(format!("{keyword} {sql}"));
        }
        Ok(())
    }

    /// `a = ?, b = ?` in column order.
    fn assignments(&mut self, query: &QueryBuilder) -> Result<String> {
        let mut parts = Vec::with_capacity(query.values.len());
        for (column, value) in &query.values {
            if column.is_empty() {
                return Err(Error::EmptyIdentifier);
            }
            parts.push(format!("{column} = {}", self.value(value)?));
        }
        Ok(parts.join(", "))
    }

    fn table(&mut self, query: &QueryBuilder) -> Result<String> {
        let table = query.table.as_ref().ok_or(Error::MissingTable(query.kind.as_str()))?;
        self.value(table)
    }

    fn condition_set(&mut self, set: &ConditionSet) -> Result<String> {
        if set.is_empty() {
            return Ok(if set.not { "FALSE" } else { "TRUE" }.to_string());
        }
        let mut parts = Vec::with_capacity(set.conditions.len());
        for condition in &set.conditions {
            parts.push(self.condition(condition)?);
        }
        Ok(parts.join(&format!(" {} ", set.conj.as_sql())))
    }

    fn condition(&mut self, condition: &Condition) -> Result<String> {
        match condition {
            Condition::Eq(b) => self.binary(b, "=", "!="),
            Condition::Gt(b) => self.binary(b, ">", "<="),
            Condition::GtEq(b) => self.binary(b, ">=", "<"),
            Condition::Lt(b) => self.binary(b, "<", ">="),
            Condition::LtEq(b) => self.binary(b, "<=", ">"),
            Condition::Like(b) => self.binary(b, "LIKE", "NOT LIKE"),
            Condition::In(b) => self.within(b),
            Condition::IsNull(u) => self.unary(u, "IS NULL", "IS NOT NULL"),
            Condition::IsTrue(u) => self.unary(u, "IS TRUE", "IS NOT TRUE"),
            Condition::IsFalse(u) => self.unary(u, "IS FALSE", "IS NOT FALSE"),
            Condition::Set(set) => {
                let inner = self.condition_set(set)?;
                Ok(if set.not { format!("NOT ({inner})") } else { format!("({inner})") })
            }
        }
    }

    fn binary(&mut self, b: &Binary, op: &str, negated: &str) -> Result<String> {
        let left = self.value(&b.left)?;
        let right = self.value(&b.right)?;
        Ok(format!("{left} {} {right}", if b.not { negated } else { op }))
    }

    fn unary(&mut self, u: &Unary, op: &str, negated: &str) -> Result<String> {
        let value = self.value(&u.value)?;
        Ok(format!("{value} {}", if u.not { negated } else { op }))
    }

    fn within(&mut self, b: &Binary) -> Result<String> {
        let keyword = if b.not { "NOT IN" } else { "IN" };
        match &b.right {
            // an empty list matches nothing, so no operand is emitted
            Value::List(items) if items.is_empty() => {
                Ok(if b.not { "TRUE" } else { "FALSE" }.to_string())
            }
            Value::Subquery(_) => {
                let left = self.value(&b.left)?;
                let right = self.value(&b.right)?;
                Ok(format!("{left} {keyword} {right}"))
            }
            right => {
                let left = self.value(&b.left)?;
                let right = self.value(right)?;
                Ok(format!("{left} {keyword}({right})"))
            }
        }
    }

    fn list(&mut self, values: &[Value]) -> Result<String> {
        let mut parts = Vec::with_capacity(values.len());
        for value in values {
            parts.push(self.value(value)?);
        }
        Ok(parts.join(", "))
    }

    fn value(&mut self, value: &Value) -> Result<String> {
        let dialect = self.dialect;
        match value {
            Value::Ident(name) => {
                if name.is_empty() {
                    return Err(Error::EmptyIdentifier);
                }
                Ok(name.clone())
            }
            Value::Raw(raw) => {
                if raw.sql.trim().is_empty() {
                    return Err(Error::EmptyRaw);
                }
                for arg in &raw.args {
                    self.params.push(param(arg)?);
                }
                Ok(raw.sql.clone())
            }
            Value::String(s) => Ok(self.scalar(DataType::Str(Some(s.clone())), || dialect.quote(s))),
            Value::Int(i) => Ok(self.scalar(DataType::Int64(Some(*i)), || i.to_string())),
            Value::UInt(u) => Ok(self.scalar(DataType::Uint64(Some(*u)), || u.to_string())),
            Value::Float(f) => Ok(self.scalar(DataType::Double(Some(*f)), || format!("{f:.6}"))),
            Value::Bool(b) => Ok(self.scalar(DataType::Boolean(Some(*b)), || {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            })),
            Value::Timestamp(ts) => {
                let text = ts.format(TIMESTAMP_FORMAT).to_string();
                let literal = dialect.quote(&text);
                Ok(self.scalar(DataType::Timestamp(Some(text)), || literal))
            }
            Value::Bytes(bytes) => {
                Ok(self.scalar(DataType::Binary(Some(bytes.clone())), || hex_literal(bytes)))
            }
            Value::Null => Ok("NULL".to_string()),
            Value::List(items) => self.list(items),
            Value::Subquery(query) => {
                let sql = normalize_sql(&self.clauses(query)?.join(" "));
                Ok(query.alias.as_ref().map_or_else(
                    || format!("({sql})"),
                    |alias| format!("({sql}) AS {alias}"),
                ))
            }
        }
    }

    fn scalar(&mut self, param: DataType, literal: impl FnOnce() -> String) -> String {
        if self.dialect.placeholders() {
            self.params.push(param);
            "?".to_string()
        } else {
            literal()
        }
    }

    fn unsupported(&self, what: impl Into<String>) -> Error {
        Error::Unsupported {
            dialect: self.dialect.name(),
            what: what.into(),
        }
    }
}
