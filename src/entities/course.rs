// 🎓 Course - name + semester, owns its projects and an optional schedule
//
// Columns: courseName (UNIQUE), semester (canonical string), scheduleId.
// Projects are a composition keyed by projects.courseId.

use super::{CourseProject, CourseSchedule};
use crate::error::{Result, SemesterError};
use crate::semester::Semester;
use crate::serializer::{Entity, Reader, ReaderExt, Serializable, Writer, WriterExt};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Course {
    id: Option<i64>,
    course_name: Option<String>,
    semester: Option<Semester>,
    projects: Vec<CourseProject>,
    schedule: Option<CourseSchedule>,
}

impl Course {
    pub fn new(name: impl Into<String>, semester: Semester) -> Self {
        Course {
            course_name: Some(name.into()),
            semester: Some(semester),
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.course_name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.course_name = name.map(String::from);
    }

    pub fn semester(&self) -> Option<&Semester> {
        self.semester.as_ref()
    }

    /// Parse and store a semester. The old value is kept if parsing fails.
    pub fn set_semester(&mut self, input: &str) -> Result<(), SemesterError> {
        self.semester = Some(Semester::parse(input)?);
        Ok(())
    }

    pub fn set_parsed_semester(&mut self, semester: Semester) {
        self.semester = Some(semester);
    }

    pub fn clear_semester(&mut self) {
        self.semester = None;
    }

    pub fn schedule(&self) -> Option<&CourseSchedule> {
        self.schedule.as_ref()
    }

    pub fn schedule_mut(&mut self) -> Option<&mut CourseSchedule> {
        self.schedule.as_mut()
    }

    pub fn set_schedule(&mut self, schedule: Option<CourseSchedule>) {
        self.schedule = schedule;
    }

    // ========================================================================
    // PROJECTS
    // ========================================================================

    pub fn projects(&self) -> &[CourseProject] {
        &self.projects
    }

    /// Take ownership of a project and point it at this course.
    pub fn add_project(&mut self, mut project: CourseProject) {
        project.set_course_id(self.id);
        self.projects.push(project);
    }

    /// Detach the project with this id. The stored row stays until the
    /// course's project collection is pruned.
    pub fn remove_project(&mut self, id: i64) -> Option<CourseProject> {
        let index = self.projects.iter().position(|p| p.id() == Some(id))?;
        let mut project = self.projects.remove(index);
        project.set_course_id(None);
        Some(project)
    }

    pub fn find_project(&self, name: &str) -> Option<&CourseProject> {
        self.projects.iter().find(|p| p.name() == Some(name))
    }
}

impl Serializable for Course {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
        for project in &mut self.projects {
            project.set_course_id(Some(id));
        }
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.course_name = reader.read_string("courseName")?;
        self.semester = reader
            .read_string("semester")?
            .map(|s| Semester::parse(&s))
            .transpose()?;
        self.schedule = reader.read_entity("scheduleId")?;
        self.projects = reader.read_children("courseId")?;
        Ok(())
    }

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()> {
        let semester = self.semester.as_ref().map(Semester::to_string);
        writer.write_string("courseName", self.course_name.as_deref())?;
        writer.write_string("semester", semester.as_deref())?;
        writer.write_entity("scheduleId", self.schedule.as_mut())?;

        if self.id.is_some() {
            for project in &mut self.projects {
                project.set_course_id(self.id);
            }
        }
        writer.write_children("courseId", &mut self.projects)
    }
}

impl Entity for Course {
    const TYPE_NAME: &'static str = "Course";
    const TABLE: &'static str = "courses";

    fn with_id(id: i64) -> Self {
        Course {
            id: Some(id),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::error::PersistError;
    use crate::registry::Registry;
    use crate::serializer::DatabaseWriter;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rusqlite::Connection;

    fn setup() -> (Connection, Registry) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        (conn, Registry::builtin())
    }

    fn sample_course() -> Course {
        let mut course = Course::new("Software Engineering", Semester::parse("ws24/25").unwrap());
        course.add_project(CourseProject::new("Build pipeline"));
        course.add_project(CourseProject::new("Issue tracker"));

        let start = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap();
        let mut schedule = CourseSchedule::new(start, end);
        schedule.add_delivery_date(Utc.with_ymd_and_hms(2024, 11, 15, 12, 0, 0).unwrap());
        schedule.add_delivery_date(Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap());
        course.set_schedule(Some(schedule));
        course
    }

    #[test]
    fn test_graph_round_trip() {
        let (conn, registry) = setup();
        let mut course = sample_course();

        DatabaseWriter::new(&conn, &registry).write_root(&mut course).unwrap();
        let id = course.id().unwrap();
        assert!(course.projects().iter().all(|p| p.course_id() == Some(id)));

        let loaded: Course = registry.lookup(&conn, id).unwrap().unwrap();
        assert_eq!(loaded, course);

        println!("✅ Course graph round-trip test PASSED");
    }

    #[test]
    fn test_read_from_is_idempotent() {
        let (conn, registry) = setup();
        let mut course = sample_course();
        DatabaseWriter::new(&conn, &registry).write_root(&mut course).unwrap();

        let first: Course = registry.lookup(&conn, course.id().unwrap()).unwrap().unwrap();
        let second: Course = registry.lookup(&conn, course.id().unwrap()).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_semester_persisted_as_canonical_string() {
        let (conn, registry) = setup();
        let mut course = Course::new("Algorithms", Semester::parse("SS 25").unwrap());
        DatabaseWriter::new(&conn, &registry).write_root(&mut course).unwrap();

        let stored: String = conn
            .query_row("SELECT semester FROM courses WHERE id = ?1", [course.id().unwrap()], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(stored, "Summer 2025");
    }

    #[test]
    fn test_null_clears_column() {
        let (conn, registry) = setup();
        let mut course = Course::new("Networks", Semester::parse("ws2023").unwrap());
        let mut writer = DatabaseWriter::new(&conn, &registry);
        writer.write_root(&mut course).unwrap();

        course.clear_semester();
        writer.write_root(&mut course).unwrap();

        let loaded: Course = registry.lookup(&conn, course.id().unwrap()).unwrap().unwrap();
        assert_eq!(loaded.semester(), None);
        assert_eq!(loaded.name(), Some("Networks"));
    }

    #[test]
    fn test_corrupt_semester_fails_the_read() {
        let (conn, registry) = setup();
        conn.execute(
            "INSERT INTO courses (courseName, semester) VALUES ('Legacy', 'Fall 2020')",
            [],
        )
        .unwrap();

        let err = registry.lookup::<Course>(&conn, 1).unwrap_err();
        assert!(matches!(err, PersistError::Semester(SemesterError::InvalidFormat(_))));
    }

    #[test]
    fn test_set_semester_keeps_old_value_on_error() {
        let mut course = Course::new("Security", Semester::parse("ss24").unwrap());
        assert!(course.set_semester("autumn 24").is_err());
        assert_eq!(course.semester().map(ToString::to_string).as_deref(), Some("Summer 2024"));
    }

    #[test]
    fn test_remove_and_find_project() {
        let mut course = Course::with_id(3);
        let mut project = CourseProject::new("Chat bot");
        project.assign_id(11);
        course.add_project(project);

        assert_eq!(course.find_project("Chat bot").and_then(|p| p.course_id()), Some(3));
        let removed = course.remove_project(11).unwrap();
        assert_eq!(removed.course_id(), None);
        assert!(course.find_project("Chat bot").is_none());
        assert!(course.remove_project(11).is_none());
    }

    #[test]
    fn test_duplicate_course_name_is_rejected() {
        let (conn, registry) = setup();
        let mut writer = DatabaseWriter::new(&conn, &registry);
        let semester = Semester::parse("ws24").unwrap();

        writer.write_root(&mut Course::new("Databases", semester.clone())).unwrap();
        let err = writer.write_root(&mut Course::new("Databases", semester)).unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
