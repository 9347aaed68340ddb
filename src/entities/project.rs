// 📁 CourseProject - a project run inside one course
//
// The owning course is stored as `courseId`. Loading a project on its own
// only restores that id; callers re-attach the course with `set_course`.

use super::Course;
use crate::error::Result;
use crate::serializer::{Entity, Reader, Serializable, Writer};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseProject {
    id: Option<i64>,
    project_name: Option<String>,
    course_id: Option<i64>,
}

impl CourseProject {
    /// Unsaved project with a name
    pub fn new(name: impl Into<String>) -> Self {
        CourseProject {
            project_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.project_name = name.map(String::from);
    }

    pub fn course_id(&self) -> Option<i64> {
        self.course_id
    }

    /// Point this project at its owning course.
    pub fn set_course(&mut self, course: &Course) {
        self.course_id = course.id();
    }

    pub(crate) fn set_course_id(&mut self, course_id: Option<i64>) {
        self.course_id = course_id;
    }
}

impl Serializable for CourseProject {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.project_name = reader.read_string("projectName")?;
        self.course_id = reader.read_number("courseId")?;
        Ok(())
    }

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("projectName", self.project_name.as_deref())?;
        writer.write_number("courseId", self.course_id)?;
        Ok(())
    }
}

impl Entity for CourseProject {
    const TYPE_NAME: &'static str = "CourseProject";
    const TABLE: &'static str = "projects";

    fn with_id(id: i64) -> Self {
        CourseProject {
            id: Some(id),
            ..Default::default()
        }
    }
}
