//! Error types for query construction, transcription, mapping and relation
//! reconciliation.

use thiserror::Error;

/// Result type used throughout the ORM.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the ORM.
///
/// Variants fall into two classes. Data-dependent failures (bad input,
/// conversion, not found, driver errors) are ordinary errors the caller is
/// expected to handle. Misuse failures signal a defect in calling code or
/// schema setup and are reported by [`Error::is_fatal`]; they should abort
/// the surrounding operation rather than be retried.
#[derive(Debug, Error)]
pub enum Error {
    /// An identifier value was empty.
    #[error("empty SQL identifiers are not allowed")]
    EmptyIdentifier,

    /// A raw SQL fragment was empty.
    #[error("empty raw SQL fragments are not allowed")]
    EmptyRaw,

    /// A conjunction other than `AND`/`OR` was supplied.
    #[error("invalid conjunction: {0}")]
    Conjunction(String),

    /// No transcriber has been registered for the dialect.
    #[error("no transcriber registered for dialect '{0}'")]
    NoTranscriber(String),

    /// The dialect cannot express part of the query.
    #[error("{dialect} cannot transcribe {what}")]
    Unsupported {
        /// Dialect identity.
        dialect: &'static str,
        /// The construct that was rejected.
        what: String,
    },

    /// A value variant appeared where it cannot be transcribed.
    #[error("invalid value in {context}: {value}")]
    InvalidValue {
        /// Where the value appeared.
        context: &'static str,
        /// Debug rendering of the value.
        value: String,
    },

    /// A write query was transcribed without a primary table.
    #[error("{0} query has no primary table")]
    MissingTable(&'static str),

    /// A driver value could not be converted into a field.
    #[error("cannot map column '{column}': {source}")]
    Convert {
        /// Column being mapped.
        column: String,
        /// Underlying conversion failure.
        #[source]
        source: anyhow::Error,
    },

    /// A requested column was not part of the result set.
    #[error("result has no column '{0}'")]
    MissingColumn(String),

    /// The post-hydrate hook rejected the entity.
    #[error("hydrate hook failed for {table}: {source}")]
    Hydrate {
        /// Entity table.
        table: &'static str,
        /// Hook failure.
        #[source]
        source: anyhow::Error,
    },

    /// The entity failed validation.
    #[error("validation failed for {table}: {source}")]
    Validation {
        /// Entity table.
        table: &'static str,
        /// Validation failure.
        #[source]
        source: anyhow::Error,
    },

    /// A single-row fetch found no row.
    #[error("no such entity")]
    NotFound,

    /// The entity type declares no primary key.
    #[error("{0} has no primary key column")]
    NoPrimaryKey(&'static str),

    /// The entity has no primary-key value set.
    #[error("{0} has no primary key value")]
    MissingPrimaryKey(&'static str),

    /// A zero-valued entity was passed to a write.
    #[error("cannot {op} a zero-valued {table} entity")]
    ZeroEntity {
        /// The write being attempted.
        op: &'static str,
        /// Entity table.
        table: &'static str,
    },

    /// Nothing remained to write after filtering.
    #[error("no fields to {op} for {table}")]
    NoFields {
        /// The write being attempted.
        op: &'static str,
        /// Entity table.
        table: &'static str,
    },

    /// No relation is declared between the two tables.
    #[error("no relation defined from '{from}' to '{to}'")]
    UndefinedRelation {
        /// Table on the "from" side.
        from: String,
        /// Table on the "to" side.
        to: String,
    },

    /// The operation is not valid for the relation's direction.
    #[error("{kind} relation {from} -> {to} does not support {op}")]
    Direction {
        /// Relation kind.
        kind: &'static str,
        /// Table on the "from" side.
        from: String,
        /// Table on the "to" side.
        to: String,
        /// Operation attempted.
        op: &'static str,
    },

    /// A reconciliation statement touched an unexpected number of rows.
    #[error("{context}: expected {expected} affected rows, got {actual}")]
    RowCount {
        /// Statement description.
        context: String,
        /// Rows the statement should have touched.
        expected: u64,
        /// Rows actually touched.
        actual: u64,
    },

    /// The statement backend failed.
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl Error {
    /// Whether the error signals programmer misuse or broken configuration
    /// rather than bad data.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoTranscriber(_)
                | Self::InvalidValue { .. }
                | Self::MissingTable(_)
                | Self::NoPrimaryKey(_)
                | Self::MissingPrimaryKey(_)
                | Self::ZeroEntity { .. }
                | Self::NoFields { .. }
                | Self::UndefinedRelation { .. }
                | Self::Direction { .. }
                | Self::RowCount { .. }
        )
    }

    pub(crate) fn convert(column: &str, source: anyhow::Error) -> Self {
        Self::Convert {
            column: column.to_string(),
            source,
        }
    }
}
