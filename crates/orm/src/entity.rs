//! Entity metadata, hydration and flattening.
//!
//! Entities are declared with [`entity!`](crate::entity), which records the
//! column metadata of each mapped field once per type. The functions in this
//! module use that metadata to hydrate entities from result rows or JSON
//! maps and to flatten them back into column maps for writes and
//! introspection.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use strata_sql::{Column, DataType, Row};

use crate::error::{Error, Result};
use crate::field::{FieldValue, json_to_data};
use crate::value::Value;

/// A column map produced for writes.
pub type Record = BTreeMap<String, Value>;

/// A column map in JSON form, used for hydration hooks and introspection.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Mapping metadata for one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Rust field name.
    pub field: &'static str,
    /// Column name.
    pub name: &'static str,
    /// Whether this is the primary key of the entity's table.
    pub primary: bool,
    /// Table the column refers to, when the field holds a related entity.
    pub foreign: Option<&'static str>,
    /// Read-only column, never written.
    pub computed: bool,
}

impl ColumnDef {
    /// A plain column.
    #[must_use]
    pub const fn new(field: &'static str, name: &'static str) -> Self {
        Self {
            field,
            name,
            primary: false,
            foreign: None,
            computed: false,
        }
    }

    /// Mark as the primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Mark as a reference to `table`.
    #[must_use]
    pub const fn foreign(mut self, table: &'static str) -> Self {
        self.foreign = Some(table);
        self
    }

    /// Mark as computed.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

/// The kind of write a hook is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    /// [`Db::insert_row`](crate::Db::insert_row).
    Insert,
    /// [`Db::update_row`](crate::Db::update_row).
    Update,
    /// Children persisted through [`Db::set_children`](crate::Db::set_children).
    Children,
}

/// Optional behaviour around hydration and writes.
///
/// `entity!` provides an empty implementation unless `hooks = custom` is
/// given, in which case the entity implements this trait itself.
pub trait Hooks: Sized {
    /// Transform a freshly hydrated entity. `fields` holds every column of
    /// the source row or map.
    ///
    /// # Errors
    ///
    /// Returns an error to reject the hydrated entity.
    fn hydrate(self, _fields: &Fields) -> anyhow::Result<Self> {
        Ok(self)
    }

    /// Check the entity before it is written.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the write.
    fn validate(&self, _write: Write) -> anyhow::Result<()> {
        Ok(())
    }

    /// Adjust the flattened column map before it is written.
    fn filter(&self, _write: Write, _record: &mut Record) {}
}

/// A table-backed entity. Implemented by [`entity!`](crate::entity).
pub trait Entity: Hooks + Default + Send + Sync + 'static {
    /// Table holding the entity.
    const TABLE: &'static str;

    /// Metadata of the mapped fields, in declaration order.
    fn columns() -> &'static [ColumnDef];

    #[doc(hidden)]
    fn __fields(&self) -> Vec<&dyn FieldValue>;

    #[doc(hidden)]
    fn __fields_mut(&mut self) -> Vec<&mut dyn FieldValue>;

    /// The entity's field bag, when it declares one.
    fn attributes(&self) -> Option<&Attributes> {
        None
    }

    /// Mutable access to the field bag.
    fn attributes_mut(&mut self) -> Option<&mut Attributes> {
        None
    }
}

/// One entry of the field bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Source column.
    pub column: Column,
    /// Scanned value.
    pub value: DataType,
}

/// Sparse map of every column an entity was hydrated from, including
/// joined and computed columns without a declared field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, Attribute>);

impl Attributes {
    /// Record a column value.
    pub fn insert(&mut self, column: Column, value: DataType) {
        self.0.insert(column.name.clone(), Attribute { column, value });
    }

    /// Entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    /// Value for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&DataType> {
        self.0.get(name).map(|attr| &attr.value)
    }

    /// Whether `name` was present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Entries by column name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.0.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Primary-key metadata of `T`.
///
/// # Errors
///
/// Returns [`Error::NoPrimaryKey`] if `T` declares none.
pub fn primary_key<T: Entity>() -> Result<&'static ColumnDef> {
    T::columns().iter().find(|def| def.primary).ok_or(Error::NoPrimaryKey(T::TABLE))
}

/// The entity's primary-key value, or `None` when it is zero.
///
/// # Errors
///
/// Returns [`Error::NoPrimaryKey`] if `T` declares none.
pub fn primary_value<T: Entity>(entity: &T) -> Result<Option<Value>> {
    let index = T::columns().iter().position(|def| def.primary).ok_or(Error::NoPrimaryKey(T::TABLE))?;
    let fields = entity.__fields();
    Ok(fields.get(index).filter(|field| !field.is_zero()).map(|field| field.to_value()))
}

/// Whether every mapped field is zero and nothing was hydrated into the bag.
#[must_use]
pub fn is_zero<T: Entity>(entity: &T) -> bool {
    entity.__fields().iter().all(|field| field.is_zero())
        && entity.attributes().is_none_or(Attributes::is_empty)
}

/// Hydrate an entity from one result row.
///
/// Each column is scanned into the declared field with the same column
/// name, or failing that into a matching field of a nested entity. All
/// columns are kept in the field bag. When a joined table repeats a column
/// name, the first occurrence is used. The entity's hydrate hook runs last.
///
/// # Errors
///
/// Returns [`Error::Convert`] if a value cannot be scanned, or
/// [`Error::Hydrate`] if the hook rejects the entity.
pub fn from_row<T: Entity>(row: &Row, columns: &[Column]) -> Result<T> {
    let mut entity = T::default();
    let mut fields = Fields::new();

    // the first occurrence of a repeated column name wins
    for field in &row.fields {
        if fields.contains_key(&field.name) {
            continue;
        }
        fields.insert(field.name.clone(), field.value.to_json());

        assign(&mut entity, &field.name, &field.value)
            .map_err(|source| Error::convert(&field.name, source))?;
        if let Some(bag) = entity.attributes_mut() {
            let column = columns
                .iter()
                .find(|column| column.name == field.name)
                .cloned()
                .unwrap_or_else(|| Column::new(field.name.clone()));
            bag.insert(column, field.value.clone());
        }
    }

    entity.hydrate(&fields).map_err(|source| Error::Hydrate {
        table: T::TABLE,
        source,
    })
}

/// Hydrate an entity from a column map.
///
/// Null values are skipped. A sequence value assigned to a field that does
/// not hold an encoded document contributes only its first element. An
/// object value assigned to a related-entity field hydrates that entity.
///
/// # Errors
///
/// Returns [`Error::Convert`] if a value cannot be converted, or
/// [`Error::Hydrate`] if the hook rejects the entity.
pub fn from_map<T: Entity>(map: &Fields) -> Result<T> {
    let mut entity = T::default();
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        assign_json(&mut entity, key, value).map_err(|source| Error::convert(key, source))?;
    }

    if let Some(bag) = entity.attributes_mut() {
        for (key, value) in map {
            bag.insert(Column::new(key.clone()), json_to_data(value));
        }
    }

    entity.hydrate(map).map_err(|source| Error::Hydrate {
        table: T::TABLE,
        source,
    })
}

/// Flatten an entity into a JSON map for introspection.
///
/// Field bag entries come first and declared fields take precedence. Zero
/// fields are left out unless the bag already holds the column. Related
/// entities are inlined as nested maps and encoded fields are unserialized.
#[must_use]
pub fn to_map<T: Entity>(entity: &T) -> Fields {
    let mut map = Fields::new();
    if let Some(bag) = entity.attributes() {
        for (name, attr) in bag.iter() {
            map.insert(name.to_string(), attr.value.to_json());
        }
    }
    for (def, field) in T::columns().iter().zip(entity.__fields()) {
        if field.is_zero() {
            if field.is_null() && map.contains_key(def.name) {
                map.insert(def.name.to_string(), serde_json::Value::Null);
            }
            continue;
        }
        map.insert(def.name.to_string(), field.to_json());
    }
    map
}

/// Flatten an entity into a column map for writes.
///
/// Computed columns are never written and related entities collapse to
/// their primary-key value. With `only_updated`, zero fields are left out
/// (keeping any value the field bag holds) and a cleared nullable field is
/// written as `NULL` only if it was hydrated; otherwise zero fields are
/// written as-is.
#[must_use]
pub fn to_record<T: Entity>(entity: &T, only_updated: bool) -> Record {
    let mut record = Record::new();
    if let Some(bag) = entity.attributes() {
        for (name, attr) in bag.iter() {
            record.insert(name.to_string(), Value::from(attr.value.clone()));
        }
    }
    for (def, field) in T::columns().iter().zip(entity.__fields()) {
        if def.computed {
            record.remove(def.name);
            continue;
        }
        if field.is_zero() {
            if field.is_null() {
                if !only_updated || record.contains_key(def.name) {
                    record.insert(def.name.to_string(), Value::Null);
                }
            } else if !only_updated && def.foreign.is_none() {
                record.insert(def.name.to_string(), field.to_value());
            }
            continue;
        }
        record.insert(def.name.to_string(), field.to_value());
    }
    record
}

/// [`to_map`] over a slice.
#[must_use]
pub fn flatten<T: Entity>(entities: &[T]) -> Vec<Fields> {
    entities.iter().map(to_map).collect()
}

/// [`from_map`] over a slice.
///
/// # Errors
///
/// Returns the first mapping failure.
pub fn inflate<T: Entity>(maps: &[Fields]) -> Result<Vec<T>> {
    maps.iter().map(from_map).collect()
}

/// Read `key` from a hook map as `U`, if present and convertible.
#[must_use]
pub fn map_field<U: DeserializeOwned>(fields: &Fields, key: &str) -> Option<U> {
    fields.get(key).and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// Scan `column` into the declared field that maps it, or into a nested
/// entity. Returns whether a field took the value.
#[doc(hidden)]
pub fn assign<T: Entity>(entity: &mut T, column: &str, value: &DataType) -> anyhow::Result<bool> {
    let columns = T::columns();
    let mut fields = entity.__fields_mut();
    if let Some(index) = columns.iter().position(|def| def.name == column && def.foreign.is_none()) {
        fields[index].scan(value)?;
        return Ok(true);
    }
    for field in &mut fields {
        if field.assign_nested(column, value)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// JSON counterpart of [`assign`].
#[doc(hidden)]
pub fn assign_json<T: Entity>(
    entity: &mut T, column: &str, value: &serde_json::Value,
) -> anyhow::Result<bool> {
    let columns = T::columns();
    let mut fields = entity.__fields_mut();
    let direct = columns
        .iter()
        .position(|def| def.name == column && (def.foreign.is_none() || value.is_object()));
    if let Some(index) = direct {
        let field = &mut fields[index];
        let value = match value {
            serde_json::Value::Array(items) if !field.is_encoded() => match items.first() {
                Some(first) => first,
                None => return Ok(true),
            },
            other => other,
        };
        field.scan_json(value)?;
        return Ok(true);
    }
    for field in &mut fields {
        if field.assign_nested_json(column, value)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Declares a table-backed entity.
///
/// Fields annotated with `#[column("name")]` are mapped; the annotation
/// accepts the flags `primary`, `foreign("table")` and `computed`. Fields
/// without it are transient. A field of type [`Attributes`] named by
/// `attributes = ...` receives every hydrated column.
///
/// Unless `hooks = custom` is given, an empty [`Hooks`] implementation is
/// generated. The struct must implement `Default`.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "pets",
///     attributes = extra,
///     #[derive(Debug, Clone, Default)]
///     pub struct Pet {
///         #[column("pet_id", primary)]
///         pub id: i64,
///         #[column("pet_name")]
///         pub name: String,
///         #[column("parent_id", foreign("parents"))]
///         pub parent: Parent,
///         pub extra: Attributes,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Full form: explicit hook selection (single code-generation arm)
    (
        @hooks $hooks:ident;
        table = $table:literal;
        $(attributes = $bag:ident,)?
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[doc = $doc:expr])*
                $(#[column($col:literal $(, $flag:ident $(($arg:literal))?)*)])?
                pub $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $(
                $(#[doc = $doc])*
                pub $field: $ty,
            )*
        }

        impl $crate::Entity for $name {
            const TABLE: &'static str = $table;

            fn columns() -> &'static [$crate::ColumnDef] {
                const COLUMNS: &[$crate::ColumnDef] = &[
                    $($(
                        $crate::ColumnDef::new(stringify!($field), $col) $(.$flag($($arg)?))*,
                    )?)*
                ];
                COLUMNS
            }

            fn __fields(&self) -> Vec<&dyn $crate::FieldValue> {
                vec![
                    $($(
                        $crate::__private::field(&self.$field, $col),
                    )?)*
                ]
            }

            fn __fields_mut(&mut self) -> Vec<&mut dyn $crate::FieldValue> {
                vec![
                    $($(
                        $crate::__private::field_mut(&mut self.$field, $col),
                    )?)*
                ]
            }

            $(
                fn attributes(&self) -> Option<&$crate::Attributes> {
                    Some(&self.$bag)
                }

                fn attributes_mut(&mut self) -> Option<&mut $crate::Attributes> {
                    Some(&mut self.$bag)
                }
            )?
        }

        impl $crate::FieldValue for $name {
            fn scan(
                &mut self, value: &$crate::__private::DataType,
            ) -> $crate::__private::anyhow::Result<()> {
                $crate::__private::scan_primary(self, value)
            }

            fn scan_json(
                &mut self, value: &$crate::__private::serde_json::Value,
            ) -> $crate::__private::anyhow::Result<()> {
                $crate::__private::scan_entity_json(self, value)
            }

            fn assign_nested(
                &mut self, column: &str, value: &$crate::__private::DataType,
            ) -> $crate::__private::anyhow::Result<bool> {
                $crate::__private::assign(self, column, value)
            }

            fn assign_nested_json(
                &mut self, column: &str, value: &$crate::__private::serde_json::Value,
            ) -> $crate::__private::anyhow::Result<bool> {
                $crate::__private::assign_json(self, column, value)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::__private::primary_or_null(self)
            }

            fn to_json(&self) -> $crate::__private::serde_json::Value {
                $crate::__private::serde_json::Value::Object($crate::to_map(self))
            }

            fn is_zero(&self) -> bool {
                $crate::__private::is_zero(self)
            }
        }

        $crate::entity!(@default_hooks $hooks $name);
    };

    (@default_hooks custom $name:ident) => {};

    (@default_hooks default $name:ident) => {
        impl $crate::Hooks for $name {}
    };

    // Custom hooks → forward without generating `Hooks`
    (
        table = $table:literal,
        hooks = custom,
        $($rest:tt)*
    ) => {
        $crate::entity! {
            @hooks custom;
            table = $table;
            $($rest)*
        }
    };

    // Bare table → forward with default hooks
    (
        table = $table:literal,
        $($rest:tt)*
    ) => {
        $crate::entity! {
            @hooks default;
            table = $table;
            $($rest)*
        }
    };
}

#[doc(hidden)]
pub mod __private {
    pub use anyhow;
    pub use serde_json;
    pub use strata_sql::DataType;

    pub use super::{assign, assign_json, is_zero};
    use super::{Entity, FieldValue, from_map, primary_value};
    use crate::value::Value;

    pub fn field<'a>(value: &'a dyn FieldValue, _column: &str) -> &'a dyn FieldValue {
        value
    }

    pub fn field_mut<'a>(value: &'a mut dyn FieldValue, _column: &str) -> &'a mut dyn FieldValue {
        value
    }

    /// A related entity referenced by key: scan the key into its primary
    /// field.
    pub fn scan_primary<T: Entity>(entity: &mut T, value: &DataType) -> anyhow::Result<()> {
        let index = T::columns()
            .iter()
            .position(|def| def.primary)
            .ok_or_else(|| anyhow::anyhow!("{} has no primary key column", T::TABLE))?;
        entity.__fields_mut()[index].scan(value)
    }

    pub fn scan_entity_json<T: Entity>(
        entity: &mut T, value: &serde_json::Value,
    ) -> anyhow::Result<()> {
        if let serde_json::Value::Object(map) = value {
            *entity = from_map(map)?;
            return Ok(());
        }
        scan_primary(entity, &super::json_to_data(value))
    }

    pub fn primary_or_null<T: Entity>(entity: &T) -> Value {
        primary_value(entity).ok().flatten().unwrap_or(Value::Null)
    }
}
