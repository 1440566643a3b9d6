//! The composable query representation.

use std::collections::BTreeMap;
use std::fmt;

use crate::condition::{ConditionSet, and};
use crate::value::{IntoList, Operand, Value};

/// Shape of the statement a [`QueryBuilder`] produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryKind {
    /// `SELECT`
    #[default]
    Select,
    /// `INSERT`
    Insert,
    /// `INSERT` that skips conflicting rows.
    InsertIgnore,
    /// `INSERT` that updates conflicting rows with the same assignments.
    InsertUpdate,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
}

impl QueryKind {
    /// Lower-case name, used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::InsertIgnore => "insert ignore",
            Self::InsertUpdate => "insert update",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `INNER JOIN`
    Inner,
}

impl JoinKind {
    /// SQL keyword for the join.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Inner => "INNER JOIN",
        }
    }
}

/// A join onto another table or subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinKind,
    /// Joined table.
    pub table: Value,
    /// `ON` condition.
    pub on: ConditionSet,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// SQL keyword for the direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Sorted expression.
    pub field: Value,
    /// Sort direction.
    pub direction: Direction,
}

/// `LIMIT` window. `None` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offset {
    /// Rows to skip.
    pub start: u64,
    /// Maximum rows to return.
    pub limit: Option<u64>,
}

impl Offset {
    /// Whether the window differs from "all rows".
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.start != 0 || self.limit.is_some()
    }
}

/// Union type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    /// `UNION`
    Distinct,
    /// `UNION ALL`
    All,
}

/// A query appended with `UNION`.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    /// Union type.
    pub kind: UnionKind,
    /// Appended query.
    pub query: Box<QueryBuilder>,
}

/// A mutable, composable description of one SQL statement.
///
/// Builders are assembled with fluent methods, merged with [`compose`], and
/// handed to a transcriber once complete.
///
/// [`compose`]: QueryBuilder::compose
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    /// Statement kind.
    pub kind: QueryKind,
    /// Selected (or deleted) fields.
    pub fields: Vec<Value>,
    /// The field list was explicitly reset; composing replaces instead of
    /// appending.
    pub fields_cleared: bool,
    /// Column assignments for inserts and updates, sorted by column.
    pub values: BTreeMap<String, Value>,
    /// Primary table.
    pub table: Option<Value>,
    /// Alias used when the builder is nested as a subquery.
    pub alias: Option<String>,
    /// Joins in order.
    pub joins: Vec<Join>,
    /// `WHERE` conditions.
    pub where_set: ConditionSet,
    /// `GROUP BY` terms.
    pub group_by: Vec<Value>,
    /// `HAVING` conditions.
    pub having_set: ConditionSet,
    /// `ORDER BY` terms.
    pub order_by: Vec<Order>,
    /// The order list was explicitly reset; composing replaces instead of
    /// appending.
    pub order_by_cleared: bool,
    /// `LIMIT` window.
    pub offset: Offset,
    /// Appended unions.
    pub unions: Vec<Union>,
}

/// Start a `SELECT` of the given fields.
#[must_use]
pub fn select<F: Operand>(fields: impl IntoIterator<Item = F>) -> QueryBuilder {
    QueryBuilder::new().select(fields)
}

/// Start an `INSERT INTO table`.
#[must_use]
pub fn insert_into(table: impl Operand) -> QueryBuilder {
    QueryBuilder::new().insert_into(table)
}

/// Start an `UPDATE table`.
#[must_use]
pub fn update(table: impl Operand) -> QueryBuilder {
    QueryBuilder::new().update(table)
}

/// Start a `DELETE FROM table`.
#[must_use]
pub fn delete_from(table: impl Operand) -> QueryBuilder {
    QueryBuilder::new().delete_from(table)
}

impl QueryBuilder {
    /// An empty `SELECT` builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` into this builder.
    ///
    /// Fields append unless `other` cleared them, in which case they replace.
    /// Assignments merge with `other` winning. Table and alias are taken from
    /// `other` only when it set them. Joins, conditions, group-bys and unions
    /// append. Order-bys follow the same rule as fields. The limit window is
    /// taken from `other` only when it set one.
    #[must_use]
    pub fn compose(mut self, other: Self) -> Self {
        if other.fields_cleared {
            self.fields = other.fields;
            self.fields_cleared = true;
        } else {
            self.fields.extend(other.fields);
        }
        self.values.extend(other.values);
        if other.table.is_some() {
            self.table = other.table;
        }
        if other.alias.is_some() {
            self.alias = other.alias;
        }
        self.joins.extend(other.joins);
        self.where_set.append(other.where_set);
        self.group_by.extend(other.group_by);
        self.having_set.append(other.having_set);
        if other.order_by_cleared {
            self.order_by = other.order_by;
            self.order_by_cleared = true;
        } else {
            self.order_by.extend(other.order_by);
        }
        if other.offset.is_set() {
            self.offset = other.offset;
        }
        self.unions.extend(other.unions);
        self
    }

    /// Compose each builder in turn.
    #[must_use]
    pub fn compose_all(self, others: impl IntoIterator<Item = Self>) -> Self {
        others.into_iter().fold(self, Self::compose)
    }

    // ---- statement kinds ----

    /// Make this a `SELECT` of `fields`.
    #[must_use]
    pub fn select<F: Operand>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.kind = QueryKind::Select;
        self.fields.extend(fields.into_iter().map(Operand::into_left));
        self
    }

    /// Make this an `INSERT INTO table`.
    #[must_use]
    pub fn insert_into(mut self, table: impl Operand) -> Self {
        self.kind = QueryKind::Insert;
        self.table = Some(table.into_left());
        self
    }

    /// Make this an insert that skips rows conflicting with a unique key.
    #[must_use]
    pub fn insert_ignore_into(mut self, table: impl Operand) -> Self {
        self.kind = QueryKind::InsertIgnore;
        self.table = Some(table.into_left());
        self
    }

    /// Make this an insert that updates rows conflicting with a unique key.
    #[must_use]
    pub fn insert_update_into(mut self, table: impl Operand) -> Self {
        self.kind = QueryKind::InsertUpdate;
        self.table = Some(table.into_left());
        self
    }

    /// Make this an `UPDATE table`.
    #[must_use]
    pub fn update(mut self, table: impl Operand) -> Self {
        self.kind = QueryKind::Update;
        self.table = Some(table.into_left());
        self
    }

    /// Make this a `DELETE FROM table`.
    #[must_use]
    pub fn delete_from(mut self, table: impl Operand) -> Self {
        self.kind = QueryKind::Delete;
        self.table = Some(table.into_left());
        self
    }

    /// Make this a `DELETE fields FROM ...` (multi-table delete).
    #[must_use]
    pub fn delete<F: Operand>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.kind = QueryKind::Delete;
        self.fields.extend(fields.into_iter().map(Operand::into_left));
        self
    }

    // ---- fields and source ----

    /// Set the primary table.
    #[must_use]
    pub fn from(mut self, table: impl Operand) -> Self {
        self.table = Some(table.into_left());
        self
    }

    /// Set the alias used when nested as a subquery.
    #[must_use]
    pub fn r#as(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: impl Operand) -> Self {
        self.fields.push(field.into_left());
        self
    }

    /// Empty the field list and mark it as reset.
    #[must_use]
    pub fn clear_fields(mut self) -> Self {
        self.fields.clear();
        self.fields_cleared = true;
        self
    }

    /// Assign `value` to `column`.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Assign every `(column, value)` pair.
    #[must_use]
    pub fn set_many<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    // ---- joins ----

    fn join(mut self, kind: JoinKind, table: impl Operand, on: ConditionSet) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into_left(),
            on,
        });
        self
    }

    /// `LEFT JOIN table ON on`
    #[must_use]
    pub fn left_join(self, table: impl Operand, on: ConditionSet) -> Self {
        self.join(JoinKind::Left, table, on)
    }

    /// `LEFT JOIN table ON left = right`, both sides as identifiers.
    #[must_use]
    pub fn left_join_eq(self, table: impl Operand, left: impl Operand, right: impl Operand) -> Self {
        self.join(JoinKind::Left, table, and().eq(left, right.into_left()))
    }

    /// `RIGHT JOIN table ON on`
    #[must_use]
    pub fn right_join(self, table: impl Operand, on: ConditionSet) -> Self {
        self.join(JoinKind::Right, table, on)
    }

    /// `RIGHT JOIN table ON left = right`, both sides as identifiers.
    #[must_use]
    pub fn right_join_eq(
        self, table: impl Operand, left: impl Operand, right: impl Operand,
    ) -> Self {
        self.join(JoinKind::Right, table, and().eq(left, right.into_left()))
    }

    /// `INNER JOIN table ON on`
    #[must_use]
    pub fn inner_join(self, table: impl Operand, on: ConditionSet) -> Self {
        self.join(JoinKind::Inner, table, on)
    }

    /// `INNER JOIN table ON left = right`, both sides as identifiers.
    #[must_use]
    pub fn inner_join_eq(
        self, table: impl Operand, left: impl Operand, right: impl Operand,
    ) -> Self {
        self.join(JoinKind::Inner, table, and().eq(left, right.into_left()))
    }

    // ---- where ----

    /// Append `condition` to the `WHERE` set as one parenthesized element.
    #[must_use]
    pub fn r#where(mut self, condition: ConditionSet) -> Self {
        self.where_set = self.where_set.condition(condition);
        self
    }

    /// Append `condition` to the `WHERE` set with its negation flipped.
    #[must_use]
    pub fn where_not(self, condition: ConditionSet) -> Self {
        self.r#where(condition.not())
    }

    fn where_with(mut self, f: impl FnOnce(ConditionSet) -> ConditionSet) -> Self {
        self.where_set = f(std::mem::take(&mut self.where_set));
        self
    }

    /// `WHERE left = right`
    #[must_use]
    pub fn where_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.eq(left, right))
    }

    /// `WHERE left != right`
    #[must_use]
    pub fn where_not_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.not_eq(left, right))
    }

    /// `WHERE left > right`
    #[must_use]
    pub fn where_gt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.gt(left, right))
    }

    /// `WHERE left >= right`
    #[must_use]
    pub fn where_gt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.gt_eq(left, right))
    }

    /// `WHERE left < right`
    #[must_use]
    pub fn where_lt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.lt(left, right))
    }

    /// `WHERE left <= right`
    #[must_use]
    pub fn where_lt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.lt_eq(left, right))
    }

    /// `WHERE left IN (right)`
    #[must_use]
    pub fn where_in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.where_with(|c| c.r#in(left, right))
    }

    /// `WHERE left NOT IN (right)`
    #[must_use]
    pub fn where_not_in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.where_with(|c| c.not_in(left, right))
    }

    /// `WHERE value IS NULL`
    #[must_use]
    pub fn where_is_null(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_null(value))
    }

    /// `WHERE value IS NOT NULL`
    #[must_use]
    pub fn where_is_not_null(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_not_null(value))
    }

    /// `WHERE value IS TRUE`
    #[must_use]
    pub fn where_is_true(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_true(value))
    }

    /// `WHERE value IS NOT TRUE`
    #[must_use]
    pub fn where_is_not_true(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_not_true(value))
    }

    /// `WHERE value IS FALSE`
    #[must_use]
    pub fn where_is_false(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_false(value))
    }

    /// `WHERE value IS NOT FALSE`
    #[must_use]
    pub fn where_is_not_false(self, value: impl Operand) -> Self {
        self.where_with(|c| c.is_not_false(value))
    }

    /// `WHERE left LIKE right`
    #[must_use]
    pub fn where_like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.like(left, right))
    }

    /// `WHERE left NOT LIKE right`
    #[must_use]
    pub fn where_not_like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.where_with(|c| c.not_like(left, right))
    }

    // ---- group and having ----

    /// Append `GROUP BY` terms.
    #[must_use]
    pub fn group_by<F: Operand>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.group_by.extend(fields.into_iter().map(Operand::into_left));
        self
    }

    /// Append `condition` to the `HAVING` set.
    #[must_use]
    pub fn having(mut self, condition: ConditionSet) -> Self {
        self.having_set = self.having_set.condition(condition);
        self
    }

    /// Append `condition` to the `HAVING` set with its negation flipped.
    #[must_use]
    pub fn having_not(self, condition: ConditionSet) -> Self {
        self.having(condition.not())
    }

    fn having_with(mut self, f: impl FnOnce(ConditionSet) -> ConditionSet) -> Self {
        self.having_set = f(std::mem::take(&mut self.having_set));
        self
    }

    /// `HAVING left = right`
    #[must_use]
    pub fn having_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.eq(left, right))
    }

    /// `HAVING left != right`
    #[must_use]
    pub fn having_not_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.not_eq(left, right))
    }

    /// `HAVING left > right`
    #[must_use]
    pub fn having_gt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.gt(left, right))
    }

    /// `HAVING left >= right`
    #[must_use]
    pub fn having_gt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.gt_eq(left, right))
    }

    /// `HAVING left < right`
    #[must_use]
    pub fn having_lt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.lt(left, right))
    }

    /// `HAVING left <= right`
    #[must_use]
    pub fn having_lt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.lt_eq(left, right))
    }

    /// `HAVING left IN (right)`
    #[must_use]
    pub fn having_in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.having_with(|c| c.r#in(left, right))
    }

    /// `HAVING left NOT IN (right)`
    #[must_use]
    pub fn having_not_in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.having_with(|c| c.not_in(left, right))
    }

    /// `HAVING value IS NULL`
    #[must_use]
    pub fn having_is_null(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_null(value))
    }

    /// `HAVING value IS NOT NULL`
    #[must_use]
    pub fn having_is_not_null(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_not_null(value))
    }

    /// `HAVING value IS TRUE`
    #[must_use]
    pub fn having_is_true(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_true(value))
    }

    /// `HAVING value IS NOT TRUE`
    #[must_use]
    pub fn having_is_not_true(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_not_true(value))
    }

    /// `HAVING value IS FALSE`
    #[must_use]
    pub fn having_is_false(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_false(value))
    }

    /// `HAVING value IS NOT FALSE`
    #[must_use]
    pub fn having_is_not_false(self, value: impl Operand) -> Self {
        self.having_with(|c| c.is_not_false(value))
    }

    /// `HAVING left LIKE right`
    #[must_use]
    pub fn having_like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.like(left, right))
    }

    /// `HAVING left NOT LIKE right`
    #[must_use]
    pub fn having_not_like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.having_with(|c| c.not_like(left, right))
    }

    // ---- order, limit, union ----

    /// Append an `ORDER BY` term.
    #[must_use]
    pub fn order_by(mut self, field: impl Operand, direction: Direction) -> Self {
        self.order_by.push(Order {
            field: field.into_left(),
            direction,
        });
        self
    }

    /// Empty the order list and mark it as reset.
    #[must_use]
    pub fn clear_order_by(mut self) -> Self {
        self.order_by.clear();
        self.order_by_cleared = true;
        self
    }

    /// Skip `start` rows and return at most `limit`.
    #[must_use]
    pub const fn limit(mut self, start: u64, limit: u64) -> Self {
        self.offset = Offset {
            start,
            limit: Some(limit),
        };
        self
    }

    /// Skip `start` rows with no upper bound.
    #[must_use]
    pub const fn offset(mut self, start: u64) -> Self {
        self.offset.start = start;
        self
    }

    /// Append `UNION query`.
    #[must_use]
    pub fn union(mut self, query: Self) -> Self {
        self.unions.push(Union {
            kind: UnionKind::Distinct,
            query: Box::new(query),
        });
        self
    }

    /// Append `UNION ALL query`.
    #[must_use]
    pub fn union_all(mut self, query: Self) -> Self {
        self.unions.push(Union {
            kind: UnionKind::All,
            query: Box::new(query),
        });
        self
    }
}
