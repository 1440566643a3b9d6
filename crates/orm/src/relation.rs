//! # Relations
//!
//! A [`Relation`] records how two tables are linked and knows how to build
//! the queries that walk the link, and how to reconcile a parent's set of
//! children against a desired set.
//!
//! Reconciliation never joins inside a write, so the statements it issues are
//! valid on every registered dialect.

use std::collections::HashSet;

use strata_sql::DataType;

use crate::db::Db;
use crate::entity::Record;
use crate::error::{Error, Result};
use crate::field;
use crate::query::{QueryBuilder, delete_from, insert_into, select, update};
use crate::value::{Value, table_field};

/// A declared link between two tables.
///
/// Column names are stored unqualified; queries qualify them with their
/// table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Each child row points at one parent through `child_key`.
    ManyToOne {
        /// Table holding the foreign key.
        child_table: String,
        /// Foreign key column on the child.
        child_key: String,
        /// Referenced table.
        parent_table: String,
        /// Primary key column on the parent.
        parent_key: String,
    },

    /// The inverse of [`Relation::ManyToOne`], walked from the parent.
    OneToMany {
        /// Referenced table.
        parent_table: String,
        /// Primary key column on the parent.
        parent_key: String,
        /// Table holding the foreign key.
        child_table: String,
        /// Foreign key column on the child.
        child_key: String,
    },

    /// Parent and child linked through a join table.
    ManyToMany {
        /// Table on the "from" side.
        parent_table: String,
        /// Primary key column on the parent.
        parent_key: String,
        /// Table on the "to" side.
        child_table: String,
        /// Primary key column on the child.
        child_key: String,
        /// Join table.
        through_table: String,
        /// Join table column referencing the parent.
        through_parent_key: String,
        /// Join table column referencing the child.
        through_child_key: String,
    },
}

impl Relation {
    /// Human-readable relation kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ManyToOne { .. } => "many-to-one",
            Self::OneToMany { .. } => "one-to-many",
            Self::ManyToMany { .. } => "many-to-many",
        }
    }

    /// The table the relation is walked from.
    #[must_use]
    pub fn from(&self) -> &str {
        match self {
            Self::ManyToOne { child_table, .. } => child_table,
            Self::OneToMany { parent_table, .. } | Self::ManyToMany { parent_table, .. } => {
                parent_table
            }
        }
    }

    /// The table the relation leads to.
    #[must_use]
    pub fn to(&self) -> &str {
        match self {
            Self::ManyToOne { parent_table, .. } => parent_table,
            Self::OneToMany { child_table, .. } | Self::ManyToMany { child_table, .. } => {
                child_table
            }
        }
    }

    /// Query fragment selecting the children of the parent identified by
    /// `id`.
    ///
    /// The fragment carries no primary table; compose it into a query that
    /// selects from the child table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Direction`] for many-to-one relations.
    pub fn children_query(&self, id: impl Into<Value>) -> Result<QueryBuilder> {
        match self {
            Self::OneToMany {
                parent_table,
                parent_key,
                child_table,
                child_key,
            } => Ok(QueryBuilder::new()
                .field(table_field(parent_table, "*"))
                .left_join_eq(
                    parent_table,
                    table_field(parent_table, parent_key),
                    table_field(child_table, child_key),
                )
                .where_eq(table_field(child_table, child_key), id)),
            Self::ManyToMany {
                parent_table,
                parent_key,
                child_table,
                child_key,
                through_table,
                through_parent_key,
                through_child_key,
            } => Ok(QueryBuilder::new()
                .field(table_field(through_table, "*"))
                .field(table_field(parent_table, "*"))
                .left_join_eq(
                    through_table,
                    table_field(through_table, through_child_key),
                    table_field(child_table, child_key),
                )
                .left_join_eq(
                    parent_table,
                    table_field(through_table, through_parent_key),
                    table_field(parent_table, parent_key),
                )
                .where_eq(table_field(through_table, through_parent_key), id)),
            Self::ManyToOne { .. } => Err(self.direction("children query")),
        }
    }

    /// Query fragment joining the parent row onto each child row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Direction`] unless the relation is many-to-one.
    pub fn join_parents_query(&self) -> Result<QueryBuilder> {
        match self {
            Self::ManyToOne {
                child_table,
                child_key,
                parent_table,
                parent_key,
            } => Ok(QueryBuilder::new().field(table_field(parent_table, "*")).left_join_eq(
                parent_table,
                table_field(parent_table, parent_key),
                table_field(child_table, child_key),
            )),
            _ => Err(self.direction("parent join")),
        }
    }

    /// Link existing children, by id, to `parent_id`.
    ///
    /// With `subtractive`, children currently linked but absent from
    /// `child_ids` are unlinked.
    pub(crate) async fn assign_children(
        &self, db: &Db, parent_id: &str, child_pk: &str, child_ids: &[String], subtractive: bool,
    ) -> Result<()> {
        match self {
            Self::OneToMany { .. } => {
                let existing = self.existing_ids(db, parent_id, child_pk).await?;
                self.link_owned(db, parent_id, child_pk, &id_diff(child_ids, &existing)).await?;
                if subtractive {
                    self.unlink(db, parent_id, child_pk, &existing, child_ids).await?;
                }
                Ok(())
            }
            Self::ManyToMany { .. } => {
                self.reconcile_through(db, parent_id, child_ids, subtractive).await
            }
            Self::ManyToOne { .. } => Err(self.direction("assign children")),
        }
    }

    /// Upsert child records and link them to `parent_id`.
    ///
    /// Records whose primary key matches an existing row are updated, the
    /// rest inserted. With `subtractive`, children currently linked but not
    /// part of `records` are unlinked.
    pub(crate) async fn set_children(
        &self, db: &Db, parent_id: &str, child_pk: &str, records: Vec<Record>, subtractive: bool,
    ) -> Result<()> {
        match self {
            Self::OneToMany {
                child_table,
                child_key,
                ..
            } => {
                let existing = self.existing_ids(db, parent_id, child_pk).await?;
                let mut child_ids = Vec::with_capacity(records.len());
                for mut record in records {
                    record.insert(child_key.clone(), Value::String(parent_id.to_string()));
                    child_ids.push(upsert(db, child_table, child_pk, record).await?);
                }
                if subtractive {
                    self.unlink(db, parent_id, child_pk, &existing, &child_ids).await?;
                }
                Ok(())
            }
            Self::ManyToMany { child_table, .. } => {
                let mut child_ids = Vec::with_capacity(records.len());
                for record in records {
                    child_ids.push(upsert(db, child_table, child_pk, record).await?);
                }
                self.reconcile_through(db, parent_id, &child_ids, subtractive).await
            }
            Self::ManyToOne { .. } => Err(self.direction("set children")),
        }
    }

    fn direction(&self, op: &'static str) -> Error {
        Error::Direction {
            kind: self.kind(),
            from: self.from().to_string(),
            to: self.to().to_string(),
            op,
        }
    }

    // ids of the children currently linked to `parent_id`
    async fn existing_ids(&self, db: &Db, parent_id: &str, child_pk: &str) -> Result<Vec<String>> {
        let query = match self {
            Self::OneToMany {
                child_table,
                child_key,
                ..
            } => select([table_field(child_table, child_pk)])
                .from(child_table)
                .where_eq(table_field(child_table, child_key), parent_id),
            Self::ManyToMany {
                through_table,
                through_parent_key,
                through_child_key,
                ..
            } => select([table_field(through_table, through_child_key)])
                .from(through_table)
                .where_eq(table_field(through_table, through_parent_key), parent_id),
            Self::ManyToOne { .. } => return Err(self.direction("list children")),
        };

        let mut rows = db.query_rows(&query).await?;
        let mut ids = Vec::new();
        while rows.advance() {
            let first = rows.current().and_then(|row| row.fields.first());
            if let Some(id) = first.and_then(|field| id_text(&field.value)) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    // point the foreign key of each listed child at the parent
    async fn link_owned(&self, db: &Db, parent_id: &str, child_pk: &str, ids: &[String]) -> Result<()> {
        let Self::OneToMany {
            child_table,
            child_key,
            ..
        } = self
        else {
            return Err(self.direction("link children"));
        };
        if ids.is_empty() {
            return Ok(());
        }

        let query = update(child_table).set(child_key.as_str(), parent_id).where_in(child_pk, ids);
        let result = db.exec(&query).await?;
        expect_rows("link children", ids.len(), result.rows_affected)
    }

    // clear the link for children in `existing` that are not `desired`
    async fn unlink(
        &self, db: &Db, parent_id: &str, child_pk: &str, existing: &[String], desired: &[String],
    ) -> Result<()> {
        let removed = id_diff(existing, desired);
        if removed.is_empty() {
            return Ok(());
        }

        let query = match self {
            Self::OneToMany {
                child_table,
                child_key,
                ..
            } => update(child_table)
                .set(child_key.as_str(), Value::Null)
                .where_eq(child_key, parent_id)
                .where_not_in(child_pk, desired),
            Self::ManyToMany {
                through_table,
                through_parent_key,
                through_child_key,
                ..
            } => delete_from(through_table)
                .where_eq(through_parent_key, parent_id)
                .where_not_in(through_child_key, desired),
            Self::ManyToOne { .. } => return Err(self.direction("unlink children")),
        };

        tracing::warn!(
            from = self.from(),
            to = self.to(),
            parent = parent_id,
            removed = ?removed,
            "unlinking children"
        );
        let result = db.exec(&query).await?;
        expect_rows("unlink children", removed.len(), result.rows_affected)
    }

    // bring the join table in line with `child_ids`
    async fn reconcile_through(
        &self, db: &Db, parent_id: &str, child_ids: &[String], subtractive: bool,
    ) -> Result<()> {
        let Self::ManyToMany {
            through_table,
            through_parent_key,
            through_child_key,
            ..
        } = self
        else {
            return Err(self.direction("link children"));
        };

        let existing = self.existing_ids(db, parent_id, through_child_key).await?;
        for id in id_diff(child_ids, &existing) {
            let query = insert_into(through_table)
                .set(through_parent_key.as_str(), parent_id)
                .set(through_child_key.as_str(), id);
            let result = db.exec(&query).await?;
            expect_rows("link children", 1, result.rows_affected)?;
        }
        if subtractive {
            self.unlink(db, parent_id, through_child_key, &existing, child_ids).await?;
        }
        Ok(())
    }
}

/// Update `record` in place when its primary key already exists, insert it
/// otherwise. Returns the canonical id of the stored row.
async fn upsert(db: &Db, table: &str, pk: &str, record: Record) -> Result<String> {
    let id = record.get(pk).filter(|id| !is_zero_id(id)).cloned();

    if let Some(id) = id.clone() {
        let query = select([pk]).from(table).where_eq(pk, id.clone()).limit(0, 1);
        let mut found = db.query_rows(&query).await?;
        if found.advance() {
            let query = update(table).set_many(record).where_eq(pk, id.clone());
            db.exec(&query).await?;
            return id_string(&id);
        }
    }

    let result = db.exec(&insert_into(table).set_many(record)).await?;
    expect_rows("store child", 1, result.rows_affected)?;
    match id {
        Some(id) => id_string(&id),
        None => result.last_insert_id.map(|id| id.to_string()).ok_or_else(|| {
            Error::Driver(anyhow::anyhow!("backend reported no generated id for {table}"))
        }),
    }
}

/// Ids in `desired` that are absent from `existing`, in `desired` order.
fn id_diff(desired: &[String], existing: &[String]) -> Vec<String> {
    let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();
    desired.iter().filter(|id| !existing.contains(id.as_str())).cloned().collect()
}

fn expect_rows(context: &str, expected: usize, actual: u64) -> Result<()> {
    let expected = u64::try_from(expected).unwrap_or(u64::MAX);
    if expected == actual {
        return Ok(());
    }
    Err(Error::RowCount {
        context: context.to_string(),
        expected,
        actual,
    })
}

/// Whether `value` counts as an unset id.
pub(crate) fn is_zero_id(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Int(i) => *i == 0,
        Value::UInt(u) => *u == 0,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Canonical text form of an id, used to compare ids across types.
pub(crate) fn id_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        other => Err(Error::InvalidValue {
            context: "relation id",
            value: format!("{other:?}"),
        }),
    }
}

fn id_text(value: &DataType) -> Option<String> {
    match value {
        DataType::Binary(_) => None,
        value => field::text(value),
    }
}
