// File-backed store: graph round-trip, reopening, admin bootstrap

use chrono::{DateTime, TimeZone, Utc};
use course_store::{
    count_rows, Course, CourseManager, CourseProject, CourseSchedule, PersistError, Registry,
    Serializable, StoreConfig,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::builder()
        .database_path(dir.path().join("courses.db"))
        .build()
}

#[test]
fn test_graph_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::builtin();

    let mut course = {
        let conn = config(&dir).open().unwrap();
        let manager = CourseManager::new(&conn, &registry);
        let mut course = manager.create_course("Software Architecture", "ws23/24").unwrap();

        course.add_project(CourseProject::new("Event store"));
        course.add_project(CourseProject::new("Plugin host"));
        let mut schedule = CourseSchedule::new(day(2023, 10, 1), day(2024, 3, 31));
        schedule.add_delivery_date(day(2024, 2, 1));
        schedule.add_delivery_date(day(2023, 12, 1));
        course.set_schedule(Some(schedule));

        manager.save_course(&mut course).unwrap();
        course
    };

    let conn = config(&dir).open().unwrap();
    let manager = CourseManager::new(&conn, &registry);
    let loaded = manager.find_course(course.id().unwrap()).unwrap().unwrap();

    // stored dates come back ascending
    if let Some(schedule) = course.schedule_mut() {
        schedule.sort_delivery_dates();
    }
    assert_eq!(loaded, course);

    // reopening does not seed a second admin
    assert_eq!(count_rows(&conn, "users").unwrap(), 1);
}

#[test]
fn test_out_of_range_delivery_date_keeps_course_row() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::builtin();
    let conn = config(&dir).open().unwrap();
    let manager = CourseManager::new(&conn, &registry);

    let mut course = manager.create_course("Distributed Systems", "ss24").unwrap();
    let mut schedule = CourseSchedule::new(day(2022, 1, 2), day(2022, 1, 3));
    schedule.add_delivery_date(day(2022, 1, 1));
    course.set_schedule(Some(schedule));

    let err = manager.save_course(&mut course).unwrap_err();
    assert!(matches!(err, PersistError::ConstraintViolation(_)));

    // rows written before the rejection stay written
    assert_eq!(count_rows(&conn, "schedules").unwrap(), 1);
    assert_eq!(count_rows(&conn, "delivery_dates").unwrap(), 0);
}

#[test]
fn test_standalone_project_needs_reattaching() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::builtin();
    let conn = config(&dir).open().unwrap();
    let manager = CourseManager::new(&conn, &registry);

    let course = manager.create_course("Compilers", "ws24").unwrap();
    let project = manager
        .add_project(course.id().unwrap(), "Register allocator")
        .unwrap()
        .unwrap();

    let alone: CourseProject = registry.lookup(&conn, project.id().unwrap()).unwrap().unwrap();
    assert_eq!(alone.course_id(), course.id());

    let reloaded: Course = registry.lookup(&conn, course.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.find_project("Register allocator"), Some(&alone));
}
