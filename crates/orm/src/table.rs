//! Entity-level table operations and relation registration on [`Db`].

use std::sync::Arc;

use strata_sql::ExecResult;

use crate::db::Db;
use crate::entity::{self, Entity, Record, Write};
use crate::error::{Error, Result};
use crate::field::FieldValue;
use crate::query::{QueryBuilder, delete_from, insert_into, select, update};
use crate::relation::{self, Relation};
use crate::value::{Value, raw, table_field};

impl Db {
    /// Fetch every `T` matching the composed `queries`.
    ///
    /// The base query selects `t.*` and left-joins each many-to-one parent
    /// declared for `t`, so related entity fields hydrate in one pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be mapped.
    pub async fn get_rows<T: Entity>(
        &self, queries: impl IntoIterator<Item = QueryBuilder>,
    ) -> Result<Vec<T>> {
        let query = self.base_query::<T>(None)?.compose_all(queries);
        self.query::<T>(&query).await?.all()
    }

    /// Count the `T` rows matching the composed `queries`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_count<T: Entity>(
        &self, queries: impl IntoIterator<Item = QueryBuilder>,
    ) -> Result<i64> {
        let query = select([raw("COUNT(*) AS count")]).from(T::TABLE).compose_all(queries);
        let mut rows = self.query_rows(&query).await?;
        if !rows.advance() {
            return Err(Error::NotFound);
        }
        let cell = rows.current().and_then(|row| row.get("count")).ok_or_else(|| {
            Error::MissingColumn("count".to_string())
        })?;
        let mut count = 0_i64;
        count.scan(cell).map_err(|e| Error::convert("count", e))?;
        rows.close();
        Ok(count)
    }

    /// Fetch the `T` whose primary key is `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no row matches.
    pub async fn get_row_by_id<T: Entity>(
        &self, id: impl Into<Value>, queries: impl IntoIterator<Item = QueryBuilder>,
    ) -> Result<T> {
        let pk = entity::primary_key::<T>()?;
        let query = self
            .base_query::<T>(None)?
            .where_eq(table_field(T::TABLE, pk.name), id)
            .compose_all(queries);
        self.query::<T>(&query).await?.row()
    }

    /// Insert `entity`, writing only its non-zero columns.
    ///
    /// # Errors
    ///
    /// Fails on a zero entity, a missing primary-key declaration, a rejected
    /// validation, an empty column set, or a backend failure.
    pub async fn insert_row<T: Entity>(&self, entity: &T) -> Result<ExecResult> {
        if entity::is_zero(entity) {
            return Err(Error::ZeroEntity {
                op: "insert",
                table: T::TABLE,
            });
        }
        entity::primary_key::<T>()?;
        validate(entity, Write::Insert)?;

        let record = self.write_record(entity, Write::Insert, None).await?;
        if record.is_empty() {
            return Err(Error::NoFields {
                op: "insert",
                table: T::TABLE,
            });
        }
        self.exec(&insert_into(T::TABLE).set_many(record)).await
    }

    /// Update the row holding `entity`'s primary key with its non-zero
    /// columns.
    ///
    /// # Errors
    ///
    /// Fails on a zero entity, a missing primary key, a rejected validation,
    /// an empty column set, or a backend failure.
    pub async fn update_row<T: Entity>(&self, entity: &T) -> Result<ExecResult> {
        if entity::is_zero(entity) {
            return Err(Error::ZeroEntity {
                op: "update",
                table: T::TABLE,
            });
        }
        let pk = entity::primary_key::<T>()?;
        let id = entity::primary_value(entity)?.ok_or(Error::MissingPrimaryKey(T::TABLE))?;
        validate(entity, Write::Update)?;

        let record = self.write_record(entity, Write::Update, Some(pk.name)).await?;
        if record.is_empty() {
            return Err(Error::NoFields {
                op: "update",
                table: T::TABLE,
            });
        }
        self.exec(&update(T::TABLE).set_many(record).where_eq(pk.name, id)).await
    }

    /// Delete the row holding `entity`'s primary key.
    ///
    /// # Errors
    ///
    /// Fails on a zero entity, a missing primary key, or a backend failure.
    pub async fn delete_row<T: Entity>(&self, entity: &T) -> Result<ExecResult> {
        if entity::is_zero(entity) {
            return Err(Error::ZeroEntity {
                op: "delete",
                table: T::TABLE,
            });
        }
        let pk = entity::primary_key::<T>()?;
        let id = entity::primary_value(entity)?.ok_or(Error::MissingPrimaryKey(T::TABLE))?;
        self.exec(&delete_from(T::TABLE).where_eq(pk.name, id)).await
    }

    /// Fetch the `C` children of the `P` identified by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedRelation`] if no relation leads from `P` to
    /// `C`, or an error from the query.
    pub async fn get_children<P: Entity, C: Entity>(
        &self, id: impl Into<Value>, queries: impl IntoIterator<Item = QueryBuilder>,
    ) -> Result<Vec<C>> {
        let relation = self.relation::<P, C>()?;
        let query = self
            .base_query::<C>(Some(P::TABLE))?
            .compose(relation.children_query(id)?)
            .compose_all(queries);
        self.query::<C>(&query).await?.all()
    }

    /// Link existing `C` rows, by id, to the `P` identified by `parent_id`.
    ///
    /// With `subtractive`, children linked to the parent but missing from
    /// `child_ids` are unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedRelation`], [`Error::Direction`] for a
    /// many-to-one relation, or [`Error::RowCount`] if a statement touched an
    /// unexpected number of rows.
    pub async fn assign_children<P: Entity, C: Entity, I>(
        &self, parent_id: impl Into<Value>, child_ids: I, subtractive: bool,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let relation = self.relation::<P, C>()?;
        let parent_id = relation::id_string(&parent_id.into())?;
        let child_ids = child_ids
            .into_iter()
            .map(|id| relation::id_string(&id.into()))
            .collect::<Result<Vec<_>>>()?;
        let child_pk = entity::primary_key::<C>()?;

        relation.assign_children(self, &parent_id, child_pk.name, &child_ids, subtractive).await
    }

    /// Upsert `children` and link them to the `P` identified by `parent_id`.
    ///
    /// Each child is validated and filtered as a [`Write::Children`] write
    /// and stripped to the columns its table has.
    ///
    /// # Errors
    ///
    /// As [`Db::assign_children`], plus validation failures.
    pub async fn set_children<P: Entity, C: Entity>(
        &self, parent_id: impl Into<Value>, children: &[C], subtractive: bool,
    ) -> Result<()> {
        let mut records = Vec::with_capacity(children.len());
        for child in children {
            validate(child, Write::Children)?;
            records.push(self.write_record(child, Write::Children, None).await?);
        }
        self.set_children_records::<P, C>(parent_id, records, subtractive).await
    }

    /// [`Db::set_children`] for raw column maps.
    ///
    /// # Errors
    ///
    /// As [`Db::assign_children`].
    pub async fn set_children_records<P: Entity, C: Entity>(
        &self, parent_id: impl Into<Value>, records: Vec<Record>, subtractive: bool,
    ) -> Result<()> {
        let relation = self.relation::<P, C>()?;
        let parent_id = relation::id_string(&parent_id.into())?;
        let child_pk = entity::primary_key::<C>()?;

        relation.set_children(self, &parent_id, child_pk.name, records, subtractive).await
    }

    /// Columns of `table`, discovered once and cached on the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the discovery query fails.
    pub async fn table_fields(&self, table: &str) -> Result<Arc<[String]>> {
        if let Some(columns) = self.schema().columns(table) {
            return Ok(columns);
        }

        let query = select(["*"]).from(table).where_eq(1_i32, 0_i32);
        let mut rows = self.query_rows(&query).await?;
        let columns = rows.columns().iter().map(|c| c.name.clone()).collect();
        rows.close();
        Ok(self.schema().cache_columns(table, columns))
    }

    /// Keep only the entries of `record` that are columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table's columns cannot be discovered.
    pub async fn filter_table_fields(&self, table: &str, mut record: Record) -> Result<Record> {
        let columns = self.table_fields(table).await?;
        record.retain(|name, _| columns.iter().any(|c| c == name));
        Ok(record)
    }

    /// Declare that each `C` belongs to one `P`.
    ///
    /// The foreign key is the `C` column marked `foreign` to `P`'s table, or
    /// else a column named like `P`'s primary key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPrimaryKey`] if `P` declares no primary key.
    pub fn many_to_one<C: Entity, P: Entity>(&self) -> Result<()> {
        let parent_key = entity::primary_key::<P>()?.name;
        self.define(Relation::ManyToOne {
            child_table: C::TABLE.to_string(),
            child_key: foreign_key::<C>(P::TABLE, parent_key).to_string(),
            parent_table: P::TABLE.to_string(),
            parent_key: parent_key.to_string(),
        });
        Ok(())
    }

    /// Declare that each `P` owns many `C`. The inverse of
    /// [`Db::many_to_one`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPrimaryKey`] if `P` declares no primary key.
    pub fn one_to_many<P: Entity, C: Entity>(&self) -> Result<()> {
        let parent_key = entity::primary_key::<P>()?.name;
        self.define(Relation::OneToMany {
            parent_table: P::TABLE.to_string(),
            parent_key: parent_key.to_string(),
            child_table: C::TABLE.to_string(),
            child_key: foreign_key::<C>(P::TABLE, parent_key).to_string(),
        });
        Ok(())
    }

    /// Declare that `P` and `C` are linked through `through`, in both
    /// directions. The join table's columns are named like the two primary
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPrimaryKey`] if either side declares no primary
    /// key.
    pub fn many_to_many<P: Entity, C: Entity>(&self, through: &str) -> Result<()> {
        let parent_key = entity::primary_key::<P>()?.name;
        let child_key = entity::primary_key::<C>()?.name;
        self.define(Relation::ManyToMany {
            parent_table: P::TABLE.to_string(),
            parent_key: parent_key.to_string(),
            child_table: C::TABLE.to_string(),
            child_key: child_key.to_string(),
            through_table: through.to_string(),
            through_parent_key: parent_key.to_string(),
            through_child_key: child_key.to_string(),
        });
        self.define(Relation::ManyToMany {
            parent_table: C::TABLE.to_string(),
            parent_key: child_key.to_string(),
            child_table: P::TABLE.to_string(),
            child_key: parent_key.to_string(),
            through_table: through.to_string(),
            through_parent_key: child_key.to_string(),
            through_child_key: parent_key.to_string(),
        });
        Ok(())
    }

    /// Record an explicit relation.
    pub fn define(&self, relation: Relation) {
        self.schema().define(relation);
    }

    /// The relation leading from `P` to `C`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedRelation`] if none is declared.
    pub fn relation<P: Entity, C: Entity>(&self) -> Result<Relation> {
        self.schema().relation(P::TABLE, C::TABLE).ok_or_else(|| Error::UndefinedRelation {
            from: P::TABLE.to_string(),
            to: C::TABLE.to_string(),
        })
    }

    // `SELECT t.*` joined with every many-to-one parent except `skip`
    fn base_query<T: Entity>(&self, skip: Option<&str>) -> Result<QueryBuilder> {
        let mut query = select([table_field(T::TABLE, "*")]).from(T::TABLE);
        for parent in self.schema().parents_of(T::TABLE) {
            if skip == Some(parent.to()) {
                continue;
            }
            query = query.compose(parent.join_parents_query()?);
        }
        Ok(query)
    }

    // flattened, hook-filtered columns of `entity` that its table can store
    async fn write_record<T: Entity>(
        &self, entity: &T, write: Write, skip: Option<&str>,
    ) -> Result<Record> {
        let mut record = entity::to_record(entity, true);
        entity.filter(write, &mut record);
        if let Some(skip) = skip {
            record.remove(skip);
        }
        self.filter_table_fields(T::TABLE, record).await
    }
}

fn validate<T: Entity>(entity: &T, write: Write) -> Result<()> {
    entity.validate(write).map_err(|source| Error::Validation {
        table: T::TABLE,
        source,
    })
}

fn foreign_key<T: Entity>(table: &str, fallback: &'static str) -> &'static str {
    T::columns().iter().find(|def| def.foreign == Some(table)).map_or(fallback, |def| def.name)
}
