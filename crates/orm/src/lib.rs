//! Database-agnostic query builder and ORM layer for SQL databases.
//!
//! Queries are built as a composable in-memory representation, transcribed
//! into SQL text plus positional arguments for the connection's dialect, and
//! executed through a [`strata_sql::Connection`]. Entities declared with
//! [`entity!`] hydrate from result rows and flatten back into column maps,
//! and declared relations reconcile a parent's children against a desired
//! set.
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! use strata_orm::{Json, entity};
//!
//! entity! {
//!     table = "posts",
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Post {
//!         #[column("post_id", primary)]
//!         pub id: i64,
//!         #[column("title")]
//!         pub title: String,
//!         #[column("published")]
//!         pub published: bool,
//!         #[column("tags")]
//!         pub tags: Json<Vec<String>>,
//!     }
//! }
//! ```
//!
//! ## Build and Run Queries
//!
//! ```ignore
//! use strata_orm::{Db, Direction, QueryBuilder, Transcribe, or, select};
//! use strata_sql::{Backend, SqlDefault};
//!
//! let db = Db::new(SqlDefault::connect().await?);
//!
//! // fetch entities, composing caller fragments into the base query
//! let posts: Vec<Post> = db
//!     .get_rows([QueryBuilder::new()
//!         .where_eq("published", true)
//!         .r#where(or().like("title", "%rust%").gt("views", 1000))
//!         .order_by("post_id", Direction::Desc)
//!         .limit(0, 10)])
//!     .await?;
//!
//! // write entities
//! db.insert_row(&post).await?;
//! db.update_row(&post).await?;
//! db.delete_row(&post).await?;
//!
//! // or issue any query directly
//! let stmt = select(["title"]).from("posts").where_eq("post_id", 7).transcribe("mysql")?;
//! // SELECT title FROM posts WHERE post_id = ?
//! ```
//!
//! ## Relations
//!
//! ```ignore
//! db.one_to_many::<Author, Post>()?;
//! db.many_to_many::<Post, Tag>("posts_tags")?;
//!
//! let posts: Vec<Post> = db.get_children::<Author, Post>(1, []).await?;
//! db.assign_children::<Post, Tag, _>(7, [1, 2, 3], true).await?;
//! ```
//!
//! ## Dialects
//!
//! `mysql` and `sqlite` transcribers are registered by default. Register
//! another dialect, or a literal-mode variant, at startup:
//!
//! ```ignore
//! strata_orm::register_transcriber("mysql-literal", strata_orm::MySql::literal());
//! ```

#![forbid(unsafe_code)]

mod condition;
mod db;
mod entity;
mod error;
mod field;
mod query;
mod relation;
mod schema;
mod table;
mod transcriber;
mod value;

pub use crate::condition::{Binary, Condition, ConditionSet, Conj, Unary, and, or};
pub use crate::db::{Db, Rows};
#[doc(hidden)]
pub use crate::entity::__private;
pub use crate::entity::{
    Attribute, Attributes, ColumnDef, Entity, Fields, Hooks, Record, Write, flatten, from_map,
    from_row, inflate, is_zero, map_field, primary_key, primary_value, to_map, to_record,
};
pub use crate::error::{Error, Result};
pub use crate::field::{FieldValue, Json};
pub use crate::query::{
    Direction, Join, JoinKind, Offset, Order, QueryBuilder, QueryKind, Union, UnionKind,
    delete_from, insert_into, select, update,
};
pub use crate::relation::Relation;
pub use crate::schema::Schema;
pub use crate::transcriber::{
    MYSQL, MySql, SQLITE, Sqlite, Statement, Transcribe, Transcriber, normalize_sql,
    register_transcriber, transcriber,
};
pub use crate::value::{IntoList, Operand, Raw, TIMESTAMP_FORMAT, Value, ident, raw, table_field};
// Re-export driver types used in custom field conversions.
pub use strata_sql::{Column, DataType, ExecResult, Field, Row};
