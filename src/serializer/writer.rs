// ✍️ DatabaseWriter - entity graph → rows
//
// `write_root` persists an entity and everything its `write_to` pushes.
// Each entity's own row is one UPSERT statement; children are written as
// independent statements after their parent row exists. A constraint
// failure anywhere ends the call, already written rows stay written.

use super::{quote_ident, Entity, EntityKey, Serializable, Value, Writer};
use crate::error::{PersistError, Result};
use crate::registry::{Registry, TypeEntry};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Pending columns of the row currently being written.
struct Frame {
    type_name: &'static str,
    table: &'static str,
    id: Option<i64>,
    columns: Vec<(String, Value)>,
    /// Foreign key set by the owning collection; the child cannot override it
    pinned: Option<String>,
    flushed: bool,
}

impl Frame {
    fn new(entry: &TypeEntry, id: Option<i64>) -> Self {
        Frame {
            type_name: entry.type_name,
            table: entry.table,
            id,
            columns: Vec::new(),
            pinned: None,
            flushed: false,
        }
    }

    fn set(&mut self, column: &str, value: Value) {
        if self.pinned.as_deref() == Some(column) {
            return;
        }
        self.put(column, value);
    }

    fn put(&mut self, column: &str, value: Value) {
        match self.columns.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }
}

/// Write everything collected so far as a single statement.
///
/// Rows with an id are upserted, rows without one are inserted and get the
/// store's rowid.
fn flush(conn: &Connection, frame: &mut Frame) -> Result<i64> {
    if frame.flushed && frame.columns.is_empty() {
        if let Some(id) = frame.id {
            return Ok(id);
        }
    }

    let table = quote_ident(frame.table);
    let names: Vec<String> = frame.columns.iter().map(|(name, _)| quote_ident(name)).collect();

    let id = match frame.id {
        Some(id) => {
            let mut values: Vec<&dyn ToSql> = Vec::with_capacity(names.len() + 1);
            values.push(&id);
            values.extend(frame.columns.iter().map(|(_, value)| value as &dyn ToSql));

            let sql = if names.is_empty() {
                format!("INSERT INTO {table} (id) VALUES (?1) ON CONFLICT(id) DO NOTHING")
            } else {
                let placeholders: Vec<String> =
                    (2..=names.len() + 1).map(|i| format!("?{i}")).collect();
                let updates: Vec<String> = names
                    .iter()
                    .map(|name| format!("{name} = excluded.{name}"))
                    .collect();
                format!(
                    "INSERT INTO {table} (id, {}) VALUES (?1, {}) ON CONFLICT(id) DO UPDATE SET {}",
                    names.join(", "),
                    placeholders.join(", "),
                    updates.join(", "),
                )
            };
            conn.execute(&sql, values.as_slice())?;
            id
        }
        None => {
            let values: Vec<&dyn ToSql> =
                frame.columns.iter().map(|(_, value)| value as &dyn ToSql).collect();

            let sql = if names.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                let placeholders: Vec<String> =
                    (1..=names.len()).map(|i| format!("?{i}")).collect();
                format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    names.join(", "),
                    placeholders.join(", "),
                )
            };
            conn.execute(&sql, values.as_slice())?;
            conn.last_insert_rowid()
        }
    };

    debug!("Flushed {}#{} ({} columns)", frame.type_name, id, frame.columns.len());
    frame.id = Some(id);
    frame.columns.clear();
    frame.flushed = true;
    Ok(id)
}

// ============================================================================
// WRITER
// ============================================================================

pub struct DatabaseWriter<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
    /// Rows being written, innermost last
    frames: Vec<Frame>,
    /// Entities already written during the current `write_root`
    written: HashSet<EntityKey>,
}

impl<'a> DatabaseWriter<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        DatabaseWriter {
            conn,
            registry,
            frames: Vec::new(),
            written: HashSet::new(),
        }
    }

    /// Persist `entity` and, transitively, everything it pushes.
    pub fn write_root(&mut self, entity: &mut dyn Serializable) -> Result<()> {
        self.reset();
        let outcome = self.persist(entity, None);
        self.reset();

        if let Err(err) = &outcome {
            if err.is_constraint_violation() {
                warn!("Write of {} rejected by store: {}", entity.type_name(), err);
            }
        }
        outcome
    }

    /// Delete rows of `type_name` owned by `parent_id` through `foreign_key`
    /// whose id is not in `keep`. Returns the number of rows removed.
    ///
    /// `write_collection` never deletes; this is the explicit diff step.
    pub fn prune_collection(
        &mut self,
        type_name: &str,
        foreign_key: &str,
        parent_id: i64,
        keep: &[i64],
    ) -> Result<usize> {
        let entry = self.registry.entry(type_name)?;
        let mut sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(entry.table),
            quote_ident(foreign_key)
        );
        if !keep.is_empty() {
            let ids: Vec<String> = keep.iter().map(|id| id.to_string()).collect();
            sql.push_str(&format!(" AND id NOT IN ({})", ids.join(", ")));
        }

        let deleted = self.conn.execute(&sql, [parent_id])?;
        if deleted > 0 {
            debug!("Pruned {} orphaned {} rows of parent {}", deleted, type_name, parent_id);
        }
        Ok(deleted)
    }

    /// `prune_collection` keyed by the in-memory children
    pub fn prune_children<T: Entity>(
        &mut self,
        foreign_key: &str,
        parent_id: i64,
        children: &[T],
    ) -> Result<usize> {
        let keep: Vec<i64> = children.iter().filter_map(|child| child.id()).collect();
        self.prune_collection(T::TYPE_NAME, foreign_key, parent_id, &keep)
    }

    fn reset(&mut self) {
        self.frames.clear();
        self.written.clear();
    }

    fn top(&mut self, column: &str) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| PersistError::OutsideEntity(format!("column {}", column)))
    }

    fn persist(
        &mut self,
        entity: &mut dyn Serializable,
        owner: Option<(&str, i64)>,
    ) -> Result<()> {
        let entry = *self.registry.entry(entity.type_name())?;

        if let Some(id) = entity.id() {
            if !self.written.insert(EntityKey::new(entry.type_name, id)) {
                debug!("{}#{} already written in this call", entry.type_name, id);
                return Ok(());
            }
        }

        let mut frame = Frame::new(&entry, entity.id());
        if let Some((foreign_key, owner_id)) = owner {
            frame.put(foreign_key, Value::Integer(owner_id));
            frame.pinned = Some(foreign_key.to_string());
        }

        let depth = self.frames.len();
        self.frames.push(frame);
        let outcome = entity.write_to(self);
        let frame = self.frames.drain(depth..).next();

        if let Err(err) = outcome {
            // a collection flush may already have stored the owner row
            if let (None, Some(id)) = (entity.id(), frame.and_then(|f| f.id)) {
                entity.assign_id(id);
            }
            return Err(err);
        }

        let mut frame =
            frame.ok_or_else(|| PersistError::OutsideEntity(entry.type_name.to_string()))?;
        let id = flush(self.conn, &mut frame)?;

        if entity.id() != Some(id) {
            entity.assign_id(id);
            self.written.insert(EntityKey::new(entry.type_name, id));
        }
        Ok(())
    }
}

impl Writer for DatabaseWriter<'_> {
    fn write_string(&mut self, field: &str, value: Option<&str>) -> Result<()> {
        self.top(field)?.set(field, Value::from(value));
        Ok(())
    }

    fn write_number(&mut self, field: &str, value: Option<i64>) -> Result<()> {
        self.top(field)?.set(field, Value::from(value));
        Ok(())
    }

    fn write_reference(
        &mut self,
        field: &str,
        entity: Option<&mut dyn Serializable>,
    ) -> Result<()> {
        let value = match entity {
            None => Value::Null,
            Some(entity) => {
                self.persist(&mut *entity, None)?;
                Value::from(entity.id())
            }
        };
        self.top(field)?.set(field, value);
        Ok(())
    }

    fn write_collection(
        &mut self,
        foreign_key: &str,
        entities: &mut [&mut dyn Serializable],
    ) -> Result<()> {
        // the owner row must exist before its children reference it
        let conn = self.conn;
        let owner_id = flush(conn, self.top(foreign_key)?)?;

        for child in entities.iter_mut() {
            self.persist(&mut **child, Some((foreign_key, owner_id)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{Course, CourseProject};
    use crate::serializer::testing::{node_store, Node};
    use crate::semester::Semester;

    #[test]
    fn test_reference_is_written_before_its_owner() {
        let (conn, registry) = node_store();
        let mut head = Node::new("head");
        head.next = Some(Box::new(Node::new("tail")));

        DatabaseWriter::new(&conn, &registry).write_root(&mut head).unwrap();

        let tail_id = head.next.as_ref().and_then(|n| n.id).unwrap();
        let stored: Option<i64> = conn
            .query_row("SELECT nextId FROM nodes WHERE label = 'head'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, Some(tail_id));
    }

    #[test]
    fn test_collection_children_get_owner_id() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let registry = Registry::builtin();

        let mut course = Course::new("Compilers", Semester::parse("ws24").unwrap());
        course.add_project(CourseProject::new("Lexer"));

        DatabaseWriter::new(&conn, &registry).write_root(&mut course).unwrap();

        let course_id: i64 = conn
            .query_row("SELECT courseId FROM projects WHERE projectName = 'Lexer'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(Some(course_id), course.id());
    }

    #[test]
    fn test_pinned_foreign_key_ignores_child_value() {
        let registry = Registry::builtin();
        let mut frame = Frame::new(registry.entry("CourseProject").unwrap(), None);
        frame.put("courseId", Value::Integer(1));
        frame.pinned = Some("courseId".to_string());

        frame.set("courseId", Value::Integer(99));
        frame.set("projectName", Value::Text("Lexer".into()));

        assert_eq!(
            frame.columns,
            vec![
                ("courseId".to_string(), Value::Integer(1)),
                ("projectName".to_string(), Value::Text("Lexer".into())),
            ]
        );
    }

    #[test]
    fn test_scalar_outside_entity_fails() {
        let (conn, registry) = node_store();
        let mut writer = DatabaseWriter::new(&conn, &registry);

        let err = writer.write_string("label", Some("loose")).unwrap_err();
        assert!(matches!(err, PersistError::OutsideEntity(_)));
    }

    #[test]
    fn test_constraint_violation_propagates() {
        let (conn, registry) = node_store();
        let mut writer = DatabaseWriter::new(&conn, &registry);
        writer.write_root(&mut Node::new("taken")).unwrap();

        let err = writer.write_root(&mut Node::new("taken")).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_prune_collection_keeps_listed_ids() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let registry = Registry::builtin();

        let mut course = Course::new("Databases", Semester::parse("ss24").unwrap());
        course.add_project(CourseProject::new("Parser"));
        course.add_project(CourseProject::new("Optimizer"));
        course.add_project(CourseProject::new("Executor"));
        let mut writer = DatabaseWriter::new(&conn, &registry);
        writer.write_root(&mut course).unwrap();

        let course_id = course.id().unwrap();
        let keep = course.projects()[1].id().unwrap();
        let deleted = writer
            .prune_collection("CourseProject", "courseId", course_id, &[keep])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(registry.count(&conn, "CourseProject").unwrap(), 1);

        let err = writer.prune_collection("Sprint", "courseId", course_id, &[]).unwrap_err();
        assert!(matches!(err, PersistError::UnknownType(_)));
    }
}
