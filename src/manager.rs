// 🧭 CourseManager - course-level operations over the engine
//
// Course names are UNIQUE in the store. Creating a course whose name is
// taken either reuses the existing row (same or no semester) or fails with
// `CourseConflict`.

use crate::db::fetch_rows;
use crate::entities::{Course, CourseProject, CourseSchedule};
use crate::error::{PersistError, Result};
use crate::registry::Registry;
use crate::semester::Semester;
use crate::serializer::{DatabaseReader, DatabaseWriter, Serializable};
use rusqlite::Connection;
use tracing::{debug, info};

pub struct CourseManager<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> CourseManager<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        CourseManager { conn, registry }
    }

    /// Manager over the process-wide registry
    pub fn with_global_registry(conn: &'a Connection) -> Self {
        Self::new(conn, Registry::global())
    }

    pub fn create_course(&self, name: &str, semester: &str) -> Result<Course> {
        let semester = Semester::parse(semester)?;

        let existing = fetch_rows(
            self.conn,
            "SELECT * FROM courses WHERE courseName = ?1",
            [name],
        )?
        .into_iter()
        .next();

        let mut course = match existing {
            Some(row) => {
                let course: Course = DatabaseReader::new(self.conn, self.registry).read_one(row)?;
                if let Some(current) = course.semester() {
                    if current != &semester {
                        return Err(PersistError::CourseConflict {
                            name: name.to_string(),
                            existing: current.to_string(),
                            requested: semester.to_string(),
                        });
                    }
                }
                debug!("Reusing existing course {:?}", course.id());
                course
            }
            None => {
                let mut course: Course = self.registry.create(self.conn)?;
                course.set_name(Some(name));
                course
            }
        };

        course.set_parsed_semester(semester);
        DatabaseWriter::new(self.conn, self.registry).write_root(&mut course)?;

        info!(
            "Course {:?} saved as #{} ({})",
            name,
            course.id().unwrap_or_default(),
            course.semester().map(ToString::to_string).unwrap_or_default()
        );
        Ok(course)
    }

    pub fn all_courses(&self) -> Result<Vec<Course>> {
        self.registry.lookup_all(self.conn)
    }

    pub fn find_course(&self, id: i64) -> Result<Option<Course>> {
        self.registry.lookup(self.conn, id)
    }

    /// Load the projects of a course on their own, re-attached to `course`.
    pub fn projects_for_course(&self, course: &Course) -> Result<Vec<CourseProject>> {
        let Some(course_id) = course.id() else {
            return Ok(Vec::new());
        };

        let mut projects: Vec<CourseProject> = DatabaseReader::new(self.conn, self.registry)
            .query("SELECT * FROM projects WHERE courseId = ?1 ORDER BY id", [course_id])?;
        for project in &mut projects {
            project.set_course(course);
        }
        Ok(projects)
    }

    /// Add a project to an existing course. `None` if there is no such course.
    pub fn add_project(&self, course_id: i64, name: &str) -> Result<Option<CourseProject>> {
        let Some(course) = self.find_course(course_id)? else {
            return Ok(None);
        };

        let mut project = CourseProject::new(name);
        project.set_course(&course);
        DatabaseWriter::new(self.conn, self.registry).write_root(&mut project)?;

        info!("Project {:?} added to course #{}", name, course_id);
        Ok(Some(project))
    }

    /// Write a schedule and delete stored delivery dates it no longer holds.
    ///
    /// Removed dates are deleted before the write so a date can be moved onto
    /// a day that a removed one used to occupy. Returns the number deleted.
    pub fn save_schedule(&self, schedule: &mut CourseSchedule) -> Result<usize> {
        let mut writer = DatabaseWriter::new(self.conn, self.registry);

        let pruned = match schedule.id() {
            Some(id) => writer.prune_children("scheduleId", id, schedule.delivery_dates())?,
            None => 0,
        };
        writer.write_root(schedule)?;

        Ok(pruned)
    }

    /// Write a course and drop stored projects and delivery dates it no
    /// longer holds. Returns the number of rows deleted.
    pub fn save_course(&self, course: &mut Course) -> Result<usize> {
        let mut writer = DatabaseWriter::new(self.conn, self.registry);
        let mut pruned = 0;

        if let Some(id) = course.id() {
            pruned += writer.prune_children("courseId", id, course.projects())?;
        }
        if let Some(schedule) = course.schedule() {
            if let Some(id) = schedule.id() {
                pruned += writer.prune_children("scheduleId", id, schedule.delivery_dates())?;
            }
        }
        writer.write_root(course)?;

        Ok(pruned)
    }

    /// Delete a course; its projects go with it.
    pub fn delete_course(&self, id: i64) -> Result<bool> {
        self.registry.delete(self.conn, "Course", id)
    }
}
