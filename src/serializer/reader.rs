// 📖 DatabaseReader - rows → entity graph
//
// One `read_root` call = one identity cache. Nested references and
// collections are resolved through the registry and hydrated with the same
// reader, so a (type, id) pair is loaded at most once per call.

use super::{downcast, quote_ident, Entity, EntityKey, Reader, Row, Serializable, Value};
use crate::db::fetch_rows;
use crate::error::{PersistError, Result};
use crate::registry::Registry;
use rusqlite::{Connection, Params};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

/// What a root read starts from: one located row or a whole result set.
#[derive(Debug, Clone)]
pub enum ResultSet {
    One(Row),
    Many(Vec<Row>),
}

impl From<Row> for ResultSet {
    fn from(row: Row) -> Self {
        ResultSet::One(row)
    }
}

impl From<Vec<Row>> for ResultSet {
    fn from(rows: Vec<Row>) -> Self {
        ResultSet::Many(rows)
    }
}

/// Result of a root read, shaped like its input.
#[derive(Debug)]
pub enum Hydrated {
    One(Box<dyn Serializable>),
    Many(Vec<Box<dyn Serializable>>),
}

impl Hydrated {
    /// The single entity, or the first of a set
    pub fn into_one(self) -> Option<Box<dyn Serializable>> {
        match self {
            Hydrated::One(entity) => Some(entity),
            Hydrated::Many(entities) => entities.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<Box<dyn Serializable>> {
        match self {
            Hydrated::One(entity) => vec![entity],
            Hydrated::Many(entities) => entities,
        }
    }
}

// ============================================================================
// READER
// ============================================================================

enum Slot {
    /// Hydration started further up the stack
    Pending,
    Ready(Box<dyn Serializable>),
}

pub struct DatabaseReader<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
    /// Rows being hydrated, innermost last
    rows: Vec<Row>,
    seen: HashMap<EntityKey, Slot>,
}

impl<'a> DatabaseReader<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        DatabaseReader {
            conn,
            registry,
            rows: Vec::new(),
            seen: HashMap::new(),
        }
    }

    /// Construct each row's entity through the registry and hydrate it.
    ///
    /// The identity cache lives exactly as long as this call.
    pub fn read_root(&mut self, result: impl Into<ResultSet>, type_name: &str) -> Result<Hydrated> {
        self.reset();

        let hydrated = match result.into() {
            ResultSet::One(row) => self.hydrate(row, type_name).map(Hydrated::One),
            ResultSet::Many(rows) => rows
                .into_iter()
                .map(|row| self.hydrate(row, type_name))
                .collect::<Result<Vec<_>>>()
                .map(Hydrated::Many),
        };

        self.reset();
        hydrated
    }

    pub fn read_one<T: Entity>(&mut self, row: Row) -> Result<T> {
        let entity = self
            .read_root(row, T::TYPE_NAME)?
            .into_one()
            .ok_or_else(|| PersistError::OutsideEntity(T::TYPE_NAME.to_string()))?;
        downcast(entity)
    }

    pub fn read_all<T: Entity>(&mut self, rows: Vec<Row>) -> Result<Vec<T>> {
        self.read_root(rows, T::TYPE_NAME)?
            .into_vec()
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    /// Run a query and hydrate every returned row as `T`.
    pub fn query<T: Entity, P: Params>(&mut self, sql: &str, params: P) -> Result<Vec<T>> {
        let rows = fetch_rows(self.conn, sql, params)?;
        self.read_all(rows)
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.seen.clear();
    }

    fn column(&self, field: &str) -> Option<&Value> {
        self.rows.last().and_then(|row| row.get(field))
    }

    /// Cache hit: a copy of the finished instance, or an id-only stub when
    /// the entity is still being hydrated (cyclic reference).
    fn cached(&self, type_name: &str, id: i64) -> Result<Option<Box<dyn Serializable>>> {
        match self.seen.get(&EntityKey::new(type_name, id)) {
            None => Ok(None),
            Some(Slot::Ready(entity)) => {
                debug!("Found {}#{} in identity cache", type_name, id);
                Ok(Some(entity.clone_box()))
            }
            Some(Slot::Pending) => {
                debug!("Cyclic reference to {}#{}, returning stub", type_name, id);
                self.registry.construct(type_name, id).map(Some)
            }
        }
    }

    fn hydrate(&mut self, row: Row, type_name: &str) -> Result<Box<dyn Serializable>> {
        let id = row.id().ok_or_else(|| PersistError::MalformedRow {
            type_name: type_name.to_string(),
            reason: "row has no numeric id column".to_string(),
        })?;

        if let Some(entity) = self.cached(type_name, id)? {
            return Ok(entity);
        }

        let key = EntityKey::new(type_name, id);
        let mut entity = self.registry.construct(type_name, id)?;
        self.seen.insert(key.clone(), Slot::Pending);

        self.rows.push(row);
        let outcome = entity.read_from(self);
        self.rows.pop();
        outcome?;

        self.seen.insert(key, Slot::Ready(entity.clone_box()));
        Ok(entity)
    }
}

impl Reader for DatabaseReader<'_> {
    fn read_string(&self, field: &str) -> Result<Option<String>> {
        match self.column(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(PersistError::TypeMismatch {
                field: field.to_string(),
                expected: "string",
                found: other.type_label(),
            }),
        }
    }

    fn read_number(&self, field: &str) -> Result<Option<i64>> {
        match self.column(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(PersistError::TypeMismatch {
                field: field.to_string(),
                expected: "integer",
                found: other.type_label(),
            }),
        }
    }

    fn read_reference(
        &mut self,
        field: &str,
        type_name: &str,
    ) -> Result<Option<Box<dyn Serializable>>> {
        let id = match self.column(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Integer(id)) => *id,
            Some(other) => {
                return Err(PersistError::TypeMismatch {
                    field: field.to_string(),
                    expected: "integer foreign key",
                    found: other.type_label(),
                })
            }
        };

        if let Some(entity) = self.cached(type_name, id)? {
            return Ok(Some(entity));
        }

        match self.registry.fetch_row(self.conn, type_name, id)? {
            None => Ok(None),
            Some(row) => self.hydrate(row, type_name).map(Some),
        }
    }

    fn read_collection(
        &mut self,
        foreign_key: &str,
        type_name: &str,
    ) -> Result<Vec<Box<dyn Serializable>>> {
        let parent_id = self
            .rows
            .last()
            .and_then(Row::id)
            .ok_or_else(|| PersistError::OutsideEntity(format!("collection {}", foreign_key)))?;

        let registry = self.registry;
        let entry = registry.entry(type_name)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}, id",
            quote_ident(entry.table),
            quote_ident(foreign_key),
            quote_ident(entry.order_by),
        );

        fetch_rows(self.conn, &sql, [parent_id])?
            .into_iter()
            .map(|row| self.hydrate(row, type_name))
            .collect()
    }
}
