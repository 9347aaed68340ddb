use crate::entities::User;
use crate::error::{PersistError, Result};
use crate::registry::Registry;
use crate::serializer::{quote_ident, DatabaseWriter, Row, Value};
use rusqlite::{Connection, Params};
use tracing::info;

/// Fixed record created when the user table is empty
pub const DEFAULT_ADMIN_NAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "sys@admin.org";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Users (seeded with one admin on first start)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT UNIQUE,
            status TEXT DEFAULT 'unconfirmed' NOT NULL,
            role TEXT DEFAULT 'USER' NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Schedules + delivery dates
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            startDate INTEGER,
            endDate INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS delivery_dates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scheduleId INTEGER,
            deliveryDate INTEGER,
            FOREIGN KEY (scheduleId) REFERENCES schedules(id) ON DELETE CASCADE,
            UNIQUE (scheduleId, deliveryDate)
        )",
        [],
    )?;

    // Delivery dates must lie inside [startDate, endDate] and be distinct per
    // calendar day (UTC) within their schedule.
    for event in ["INSERT", "UPDATE"] {
        conn.execute(
            &format!(
                "CREATE TRIGGER IF NOT EXISTS delivery_dates_{}_trigger
                BEFORE {} ON delivery_dates
                FOR EACH ROW
                BEGIN
                    SELECT RAISE(ABORT, 'deliveryDate must be between startDate and endDate')
                    WHERE NEW.deliveryDate < (SELECT startDate FROM schedules WHERE id = NEW.scheduleId)
                       OR NEW.deliveryDate > (SELECT endDate FROM schedules WHERE id = NEW.scheduleId);
                    SELECT RAISE(ABORT, 'deliveryDate already used on this day for this schedule')
                    WHERE EXISTS (
                        SELECT 1 FROM delivery_dates
                        WHERE scheduleId = NEW.scheduleId
                          AND id IS NOT NEW.id
                          AND date(deliveryDate, 'unixepoch') = date(NEW.deliveryDate, 'unixepoch')
                    );
                END",
                event.to_lowercase(),
                event
            ),
            [],
        )?;
    }

    // ==========================================================================
    // Courses + projects
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            courseName TEXT UNIQUE,
            semester TEXT,
            scheduleId INTEGER,
            FOREIGN KEY (scheduleId) REFERENCES schedules(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            projectName TEXT UNIQUE,
            courseId INTEGER,
            FOREIGN KEY (courseId) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_projects_course ON projects(courseId)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_delivery_dates_schedule ON delivery_dates(scheduleId)",
        [],
    )?;

    info!("Database schema ready");
    Ok(())
}

/// Run a query and return every row as column name → value.
///
/// Blob columns are rejected; the engine only understands text, numbers and null.
pub fn fetch_rows<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, name) in names.iter().enumerate() {
            record.insert(name.as_str(), Value::from_sql(name, row.get_ref(index)?)?);
        }
        out.push(record);
    }

    Ok(out)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Create the default admin if no user exists yet.
///
/// Idempotent: returns `None` when any user is already present.
pub fn ensure_admin(conn: &Connection, registry: &Registry) -> Result<Option<User>> {
    if count_rows(conn, "users")? > 0 {
        return Ok(None);
    }

    let mut admin: User = registry.create(conn)?;
    admin.set_name(Some(DEFAULT_ADMIN_NAME));
    admin.set_email(Some(DEFAULT_ADMIN_EMAIL));
    admin.set_status("confirmed");
    admin.set_role("ADMIN");

    DatabaseWriter::new(conn, registry).write_root(&mut admin)?;
    info!("Default admin user created ({})", DEFAULT_ADMIN_EMAIL);

    Ok(Some(admin))
}

/// Fail with `MalformedRow` unless the table exists.
pub fn require_table(conn: &Connection, table: &str) -> Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;

    if exists == 0 {
        return Err(PersistError::MalformedRow {
            type_name: table.to_string(),
            reason: "table does not exist".to_string(),
        });
    }
    Ok(())
}
