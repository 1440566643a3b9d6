//! Relation catalog and table-column cache shared by every clone of a
//! [`Db`](crate::Db).

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::relation::Relation;

/// Declared relations plus the cached column list of each table.
#[derive(Debug, Default)]
pub struct Schema {
    relations: RwLock<Vec<Relation>>,
    columns: DashMap<String, Arc<[String]>>,
}

impl Schema {
    /// An empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `relation`. Earlier definitions between the same tables take
    /// precedence on lookup.
    pub fn define(&self, relation: Relation) {
        tracing::debug!(
            kind = relation.kind(),
            from = relation.from(),
            to = relation.to(),
            "defining relation"
        );
        self.relations.write().push(relation);
    }

    /// The relation walked from `from` to `to`, if declared.
    #[must_use]
    pub fn relation(&self, from: &str, to: &str) -> Option<Relation> {
        self.relations.read().iter().find(|r| r.from() == from && r.to() == to).cloned()
    }

    /// Every many-to-one relation leaving `table`.
    #[must_use]
    pub fn parents_of(&self, table: &str) -> Vec<Relation> {
        self.relations
            .read()
            .iter()
            .filter(|r| matches!(r, Relation::ManyToOne { .. }) && r.from() == table)
            .cloned()
            .collect()
    }

    /// All declared relations, in definition order.
    #[must_use]
    pub fn relations(&self) -> Vec<Relation> {
        self.relations.read().clone()
    }

    /// Cached columns of `table`.
    #[must_use]
    pub fn columns(&self, table: &str) -> Option<Arc<[String]>> {
        self.columns.get(table).map(|entry| Arc::clone(entry.value()))
    }

    /// Cache the columns of `table`, returning the shared list.
    pub fn cache_columns(&self, table: &str, columns: Vec<String>) -> Arc<[String]> {
        let columns: Arc<[String]> = columns.into();
        self.columns.insert(table.to_string(), Arc::clone(&columns));
        columns
    }

    /// Drop the cached columns of `table`, e.g. after a migration.
    pub fn forget_columns(&self, table: &str) {
        self.columns.remove(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn many_to_one(child: &str, parent: &str) -> Relation {
        Relation::ManyToOne {
            child_table: child.to_string(),
            child_key: format!("{parent}_id"),
            parent_table: parent.to_string(),
            parent_key: format!("{parent}_id"),
        }
    }

    #[test]
    fn lookup() {
        let schema = Schema::new();
        schema.define(many_to_one("children", "parents"));
        schema.define(many_to_one("children", "schools"));

        assert!(schema.relation("children", "parents").is_some());
        assert!(schema.relation("parents", "children").is_none());
        assert_eq!(schema.parents_of("children").len(), 2);
        assert!(schema.parents_of("parents").is_empty());
        assert_eq!(schema.relations().len(), 2);
    }

    #[test]
    fn first_definition_wins() {
        let schema = Schema::new();
        schema.define(many_to_one("children", "parents"));
        schema.define(Relation::ManyToOne {
            child_table: "children".to_string(),
            child_key: "guardian_id".to_string(),
            parent_table: "parents".to_string(),
            parent_key: "parent_id".to_string(),
        });

        let Some(Relation::ManyToOne { child_key, .. }) = schema.relation("children", "parents") else {
            panic!("relation missing");
        };
        assert_eq!(child_key, "parents_id");
    }

    #[test]
    fn column_cache() {
        let schema = Schema::new();
        assert!(schema.columns("users").is_none());
        schema.cache_columns("users", vec!["id".to_string(), "name".to_string()]);
        assert_eq!(schema.columns("users").unwrap().len(), 2);
        schema.forget_columns("users");
        assert!(schema.columns("users").is_none());
    }
}
