//! Domain types for course-authoring resources.

pub mod course;
pub mod course_app;
pub mod user;

pub use course::CourseDetail;
pub use course_app::{AllowedOperations, CourseApp};
pub use user::AuthenticatedUser;
