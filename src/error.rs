// ⚠️ Error taxonomy for the persistence engine
//
// Parse failures are local (caller input was malformed), hydration failures
// are fatal to the current read, constraint violations come from the store.

use thiserror::Error;

/// Failures from the Semester value-object parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemesterError {
    /// Input did not match `<ws|winter|ss|summer> <yy|yyyy>[/yy]`.
    #[error("Invalid semester format: {0:?}")]
    InvalidFormat(String),

    /// Input matched the pattern but the year cannot be turned into an academic year.
    #[error("Cannot parse academic year {year} for {kind} semester")]
    UnparsableAcademicYear { year: u32, kind: &'static str },
}

/// Errors from reading or writing entities.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Semester(#[from] SemesterError),

    /// A row handed to the reader has no numeric `id` column.
    #[error("Malformed {type_name} row: {reason}")]
    MalformedRow { type_name: String, reason: String },

    /// A stored column value disagrees with the requested type.
    #[error("Type mismatch on column {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The store rejected a write (UNIQUE key, schedule range trigger, ...).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A course name is already taken by another semester.
    #[error("Course {name:?} already exists for {existing}, cannot create it for {requested}")]
    CourseConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// A column was read or written while no entity row was active.
    #[error("{0} used outside of an entity being read or written")]
    OutsideEntity(String),

    /// The type name has no registry entry.
    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    /// The type name was registered twice.
    #[error("Entity type registered twice: {0}")]
    DuplicateType(String),

    /// Registry handed back an instance of another type than requested.
    #[error("Expected entity {expected}, got {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Store error: {0}")]
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for PersistError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                PersistError::ConstraintViolation(
                    message.unwrap_or_else(|| code.to_string()),
                )
            }
            other => PersistError::Store(other),
        }
    }
}

impl PersistError {
    /// True when the store refused the write because of a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, PersistError::ConstraintViolation(_))
    }
}

pub type Result<T, E = PersistError> = std::result::Result<T, E>;
