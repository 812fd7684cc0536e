//! Data models for coursedesk entities.
//!
//! - `UserProfile`: the cached snapshot of the signed-in user
//! - `Course`, `CourseDraft`, `CourseFilter`, `CoursePage`: catalog types
//! - `CourseCategory`, `CourseLevel`: the values offered by the admin forms

pub mod course;
pub mod user;

pub use course::{
    Course, CourseCategory, CourseDraft, CourseFilter, CourseLevel, CoursePage,
    DEFAULT_THUMBNAIL_URL,
};
pub use user::UserProfile;
