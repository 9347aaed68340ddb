// Course Store - Core Library
// Object-relational persistence for the course tracker: entities, the
// registry, the SQLite-backed Reader/Writer and the Semester parser.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod manager;
pub mod registry;
pub mod semester;
pub mod serializer;

// Re-export commonly used types
pub use config::{StoreConfig, StoreConfigBuilder, IN_MEMORY};
pub use db::{count_rows, ensure_admin, fetch_rows, setup_database};
pub use entities::{Course, CourseProject, CourseSchedule, DeliveryDate, User};
pub use error::{PersistError, Result, SemesterError};
pub use import::{import_courses, ImportSummary};
pub use manager::CourseManager;
pub use registry::{Registry, TypeEntry};
pub use semester::{Semester, SemesterType};
pub use serializer::{
    DatabaseReader, DatabaseWriter, Entity, Hydrated, Reader, ReaderExt, ResultSet, Row,
    Serializable, Value, Writer, WriterExt,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
