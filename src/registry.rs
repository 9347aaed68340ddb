// 🗂️ Type Registry - string-keyed dispatch without reflection
//
// Every persistable type is registered exactly once:
//   type name → { table, collection ordering, construct(id) }
// The Reader and Writer only ever see `dyn Serializable` and resolve nested
// types through this table, never through the concrete structs.

use crate::db::{count_rows, fetch_rows};
use crate::entities::{Course, CourseProject, CourseSchedule, DeliveryDate, User};
use crate::error::{PersistError, Result};
use crate::serializer::{downcast, quote_ident, DatabaseReader, Entity, Row, Serializable};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

// ============================================================================
// TYPE ENTRY
// ============================================================================

/// What the engine knows about one entity type.
#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    pub type_name: &'static str,
    pub table: &'static str,
    pub order_by: &'static str,
    construct: fn(i64) -> Box<dyn Serializable>,
}

fn construct_boxed<T: Entity>(id: i64) -> Box<dyn Serializable> {
    Box::new(T::with_id(id))
}

impl TypeEntry {
    pub fn of<T: Entity>() -> Self {
        TypeEntry {
            type_name: T::TYPE_NAME,
            table: T::TABLE,
            order_by: T::ORDER_BY,
            construct: construct_boxed::<T>,
        }
    }

    /// Blank instance with the given identity
    pub fn construct(&self, id: i64) -> Box<dyn Serializable> {
        (self.construct)(id)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<&'static str, TypeEntry>,
}

impl Registry {
    /// Empty registry, for callers that bring their own entity types
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the course domain types
    pub fn builtin() -> Self {
        let entries = [
            TypeEntry::of::<Course>(),
            TypeEntry::of::<CourseProject>(),
            TypeEntry::of::<CourseSchedule>(),
            TypeEntry::of::<DeliveryDate>(),
            TypeEntry::of::<User>(),
        ]
        .into_iter()
        .map(|entry| (entry.type_name, entry))
        .collect();

        Registry { entries }
    }

    /// Process-wide registry, built on first use and read-only afterwards
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::builtin)
    }

    /// Register a type. Registering the same type name twice is an error.
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        if self.entries.contains_key(T::TYPE_NAME) {
            return Err(PersistError::DuplicateType(T::TYPE_NAME.to_string()));
        }
        self.entries.insert(T::TYPE_NAME, TypeEntry::of::<T>());
        Ok(())
    }

    pub fn entry(&self, type_name: &str) -> Result<&TypeEntry> {
        self.entries
            .get(type_name)
            .ok_or_else(|| PersistError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// All registered type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn construct(&self, type_name: &str, id: i64) -> Result<Box<dyn Serializable>> {
        Ok(self.entry(type_name)?.construct(id))
    }

    // ========================================================================
    // FACTORY
    // ========================================================================

    /// Insert a blank row for the type and return it hydrated with defaults.
    ///
    /// The identity is assigned by the store before any field is set.
    pub fn create_dyn(&self, conn: &Connection, type_name: &str) -> Result<Box<dyn Serializable>> {
        let entry = self.entry(type_name)?;
        conn.execute(
            &format!("INSERT INTO {} DEFAULT VALUES", quote_ident(entry.table)),
            [],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created blank {} with id {}", type_name, id);

        self.lookup_dyn(conn, type_name, id)?
            .ok_or_else(|| PersistError::MalformedRow {
                type_name: type_name.to_string(),
                reason: format!("row {} missing right after insert", id),
            })
    }

    pub fn create<T: Entity>(&self, conn: &Connection) -> Result<T> {
        downcast(self.create_dyn(conn, T::TYPE_NAME)?)
    }

    /// The stored row of `type_name` with this id, unhydrated.
    pub fn fetch_row(&self, conn: &Connection, type_name: &str, id: i64) -> Result<Option<Row>> {
        let entry = self.entry(type_name)?;
        let sql = format!("SELECT * FROM {} WHERE id = ?1", quote_ident(entry.table));
        Ok(fetch_rows(conn, &sql, [id])?.into_iter().next())
    }

    /// Load and fully hydrate one entity. A missing row is `Ok(None)`.
    pub fn lookup_dyn(
        &self,
        conn: &Connection,
        type_name: &str,
        id: i64,
    ) -> Result<Option<Box<dyn Serializable>>> {
        match self.fetch_row(conn, type_name, id)? {
            None => Ok(None),
            Some(row) => Ok(DatabaseReader::new(conn, self)
                .read_root(row, type_name)?
                .into_one()),
        }
    }

    pub fn lookup<T: Entity>(&self, conn: &Connection, id: i64) -> Result<Option<T>> {
        self.lookup_dyn(conn, T::TYPE_NAME, id)?
            .map(downcast::<T>)
            .transpose()
    }

    /// Every row of the type's table, ordered by id
    pub fn lookup_all<T: Entity>(&self, conn: &Connection) -> Result<Vec<T>> {
        let sql = format!("SELECT * FROM {} ORDER BY id", quote_ident(T::TABLE));
        let rows = fetch_rows(conn, &sql, [])?;
        DatabaseReader::new(conn, self).read_all::<T>(rows)
    }

    /// Explicit deletion. Returns false if there was no such row.
    pub fn delete(&self, conn: &Connection, type_name: &str, id: i64) -> Result<bool> {
        let entry = self.entry(type_name)?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", quote_ident(entry.table)),
            [id],
        )?;
        Ok(deleted > 0)
    }

    pub fn count(&self, conn: &Connection, type_name: &str) -> Result<i64> {
        count_rows(conn, self.entry(type_name)?.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::serializer::Value;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_builtin_registers_domain_types() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.type_names(),
            vec!["Course", "CourseProject", "CourseSchedule", "DeliveryDate", "User"]
        );
        assert_eq!(registry.entry("DeliveryDate").unwrap().order_by, "deliveryDate");
    }

    #[test]
    fn test_register_twice_fails() {
        let mut registry = Registry::new();
        registry.register::<Course>().unwrap();

        let err = registry.register::<Course>().unwrap_err();
        assert!(matches!(err, PersistError::DuplicateType(name) if name == "Course"));
    }

    #[test]
    fn test_unknown_type() {
        let registry = Registry::new();
        assert!(matches!(
            registry.construct("Course", 1),
            Err(PersistError::UnknownType(_))
        ));
    }

    #[test]
    fn test_create_assigns_fresh_ids() {
        let conn = test_db();
        let registry = Registry::builtin();

        let first: Course = registry.create(&conn).unwrap();
        let second: Course = registry.create(&conn).unwrap();

        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        assert_eq!(first.name(), None);
        assert_eq!(registry.count(&conn, "Course").unwrap(), 2);
    }

    #[test]
    fn test_fetch_row_returns_raw_columns() {
        let conn = test_db();
        let registry = Registry::builtin();
        conn.execute("INSERT INTO projects (projectName) VALUES ('Linker')", [])
            .unwrap();

        let row = registry.fetch_row(&conn, "CourseProject", 1).unwrap().unwrap();
        assert_eq!(row.id(), Some(1));
        assert_eq!(row.get("projectName"), Some(&Value::Text("Linker".into())));
        assert!(registry.fetch_row(&conn, "CourseProject", 2).unwrap().is_none());
        assert!(matches!(
            registry.fetch_row(&conn, "Sprint", 1),
            Err(PersistError::UnknownType(_))
        ));
    }

    #[test]
    fn test_lookup_missing_row_is_none() {
        let conn = test_db();
        let registry = Registry::builtin();

        assert!(registry.lookup::<CourseSchedule>(&conn, 0).unwrap().is_none());
        assert!(registry.lookup_dyn(&conn, "User", 42).unwrap().is_none());
    }

    #[test]
    fn test_lookup_with_wrong_type_is_rejected() {
        let conn = test_db();
        let registry = Registry::builtin();
        let course: Course = registry.create(&conn).unwrap();

        let entity = registry.lookup_dyn(&conn, "Course", course.id().unwrap()).unwrap().unwrap();
        let err = downcast::<User>(entity).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnexpectedType { expected: "User", found: "Course" }
        ));
    }

    #[test]
    fn test_delete() {
        let conn = test_db();
        let registry = Registry::builtin();
        let user: User = registry.create(&conn).unwrap();
        let id = user.id().unwrap();

        assert!(registry.delete(&conn, "User", id).unwrap());
        assert!(!registry.delete(&conn, "User", id).unwrap());
        assert!(registry.lookup::<User>(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_global_is_shared() {
        let a = Registry::global() as *const Registry;
        let b = Registry::global() as *const Registry;
        assert_eq!(a, b);
        assert!(Registry::global().contains("Course"));
    }
}
