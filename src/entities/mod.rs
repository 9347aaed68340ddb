// Entity Models
//
// Each entity owns its scalar columns and its composed children by value.
// Back-edges (project → course) are kept as plain ids, never as pointers,
// so an entity graph is always a tree in memory even when the rows form a
// cycle.

pub mod course;
pub mod project;
pub mod schedule;
pub mod user;

pub use course::Course;
pub use project::CourseProject;
pub use schedule::{CourseSchedule, DeliveryDate};
pub use user::User;
