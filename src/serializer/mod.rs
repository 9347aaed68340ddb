// 🔁 Serializer - Entity contract + Reader/Writer protocols
//
// Entities never talk to the store. They pull their fields from a Reader and
// push them to a Writer; nested references and collections go back through
// the same Reader/Writer so identity tracking stays in one place.

pub mod reader;
pub mod writer;

pub use reader::{DatabaseReader, Hydrated, ResultSet};
pub use writer::DatabaseWriter;

use crate::error::{PersistError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// COLUMN VALUES
// ============================================================================

/// A single column value as the engine sees it.
///
/// Blobs are not part of the row shape; hitting one is a hydration error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Short label used in type mismatch reports
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "string",
        }
    }

    pub(crate) fn from_sql(column: &str, value: ValueRef<'_>) -> Result<Value> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(f) => Ok(Value::Real(f)),
            ValueRef::Text(t) => Ok(Value::Text(String::from_utf8_lossy(t).into_owned())),
            ValueRef::Blob(_) => Err(PersistError::TypeMismatch {
                field: column.to_string(),
                expected: "string, number or null",
                found: "blob",
            }),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<Option<&str>> for Value {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Value::Null, |s| Value::Text(s.to_string()))
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Integer)
    }
}

/// One row fetched from the store: column name → value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a column
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.columns.insert(column.into(), value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// The numeric identity column, if the row carries one
    pub fn id(&self) -> Option<i64> {
        match self.columns.get("id") {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        }
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Identity-cache key: compared by value, never by reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub type_name: String,
    pub id: i64,
}

impl EntityKey {
    pub fn new(type_name: &str, id: i64) -> Self {
        EntityKey {
            type_name: type_name.to_string(),
            id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

// ============================================================================
// ENTITY CONTRACT
// ============================================================================

/// Object-safe plumbing every serializable gets for free from `Clone`.
pub trait AsEntity {
    fn clone_box(&self) -> Box<dyn Serializable>;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Serializable + Clone> AsEntity for T {
    fn clone_box(&self) -> Box<dyn Serializable> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// The capability every persistable entity implements.
///
/// `read_from` must be idempotent for the same reader state. `write_to` must
/// not do any I/O itself. Entities push their scalars before their
/// collections so the owning row is written in a single statement.
pub trait Serializable: AsEntity + fmt::Debug + 'static {
    /// Registry key of this entity's type
    fn type_name(&self) -> &'static str;

    /// Store-assigned identity, `None` until first written
    fn id(&self) -> Option<i64>;

    fn assign_id(&mut self, id: i64);

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()>;

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()>;
}

impl Clone for Box<dyn Serializable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Static description of a concrete entity type, used to register it.
pub trait Entity: Serializable + Clone {
    const TYPE_NAME: &'static str;
    const TABLE: &'static str;
    /// Column children of this type are sorted by when read as a collection
    const ORDER_BY: &'static str = "id";

    /// Blank instance carrying only its identity
    fn with_id(id: i64) -> Self;
}

/// Recover the concrete type from a registry-built instance.
pub fn downcast<T: Entity>(entity: Box<dyn Serializable>) -> Result<T> {
    let found = entity.type_name();
    entity
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| PersistError::UnexpectedType {
            expected: T::TYPE_NAME,
            found,
        })
}

// ============================================================================
// READER / WRITER PROTOCOLS
// ============================================================================

/// Pulls attributes of the row currently being hydrated.
pub trait Reader {
    fn read_string(&self, field: &str) -> Result<Option<String>>;

    fn read_number(&self, field: &str) -> Result<Option<i64>>;

    /// Epoch seconds → UTC date-time. Sub-second precision is not stored.
    fn read_date_time(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        match self.read_number(field)? {
            None => Ok(None),
            Some(secs) => DateTime::from_timestamp(secs, 0).map(Some).ok_or_else(|| {
                PersistError::TypeMismatch {
                    field: field.to_string(),
                    expected: "epoch seconds",
                    found: "out of range integer",
                }
            }),
        }
    }

    /// Treat `field` as a foreign key into the table of `type_name`.
    fn read_reference(
        &mut self,
        field: &str,
        type_name: &str,
    ) -> Result<Option<Box<dyn Serializable>>>;

    /// Load all `type_name` rows whose `foreign_key` equals the current id.
    fn read_collection(
        &mut self,
        foreign_key: &str,
        type_name: &str,
    ) -> Result<Vec<Box<dyn Serializable>>>;
}

/// Pushes attributes of the row currently being written.
pub trait Writer {
    /// `None` clears the column.
    fn write_string(&mut self, field: &str, value: Option<&str>) -> Result<()>;

    fn write_number(&mut self, field: &str, value: Option<i64>) -> Result<()>;

    fn write_date_time(&mut self, field: &str, value: Option<DateTime<Utc>>) -> Result<()> {
        self.write_number(field, value.map(|dt| dt.timestamp()))
    }

    /// Store the referenced entity's id in `field`, writing the entity first
    /// unless it was already written during this call.
    fn write_reference(
        &mut self,
        field: &str,
        entity: Option<&mut dyn Serializable>,
    ) -> Result<()>;

    /// Write every child with `foreign_key` set to the current entity's id.
    fn write_collection(
        &mut self,
        foreign_key: &str,
        entities: &mut [&mut dyn Serializable],
    ) -> Result<()>;
}

/// Typed helpers over `Reader` for concrete entity types.
pub trait ReaderExt: Reader {
    fn read_entity<T: Entity>(&mut self, field: &str) -> Result<Option<T>> {
        self.read_reference(field, T::TYPE_NAME)?
            .map(downcast::<T>)
            .transpose()
    }

    fn read_children<T: Entity>(&mut self, foreign_key: &str) -> Result<Vec<T>> {
        self.read_collection(foreign_key, T::TYPE_NAME)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }
}

impl<R: Reader + ?Sized> ReaderExt for R {}

/// Typed helpers over `Writer` for concrete entity types.
pub trait WriterExt: Writer {
    fn write_entity<T: Entity>(&mut self, field: &str, entity: Option<&mut T>) -> Result<()> {
        self.write_reference(field, entity.map(|e| e as &mut dyn Serializable))
    }

    fn write_children<T: Entity>(&mut self, foreign_key: &str, children: &mut [T]) -> Result<()> {
        let mut refs: Vec<&mut dyn Serializable> = children
            .iter_mut()
            .map(|child| child as &mut dyn Serializable)
            .collect();
        self.write_collection(foreign_key, &mut refs)
    }
}

impl<W: Writer + ?Sized> WriterExt for W {}

/// Quote an SQL identifier (table or column name).
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
