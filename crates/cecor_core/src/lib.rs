//! Core domain logic for the CECOR back-office.
//! Owns the entity model, storage, and the enrollment admission rules.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::course::{Course, CourseClass, CourseClassId, CourseId, CourseStatus};
pub use model::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment};
pub use model::student::{Student, StudentId, StudentProfile, StudentStatus, User, UserId};
pub use model::ValidationError;
pub use repo::course_repo::{CourseListQuery, CourseRepository, SqliteCourseRepository};
pub use repo::enrollment_repo::{
    EnrollmentListQuery, EnrollmentRepository, SqliteEnrollmentRepository,
};
pub use repo::student_repo::{SqliteStudentRepository, StudentListQuery, StudentRepository};
pub use repo::{Page, RepoError, RepoResult};
pub use service::course_service::{CourseService, CourseServiceError};
pub use service::enrollment_service::{
    AdmissionPolicy, EnrollmentService, EnrollmentServiceError, EnrollmentServiceResult,
    MINIMUM_ENROLLMENT_AGE,
};
pub use service::student_service::{
    RegisterStudentRequest, StudentService, StudentServiceError,
};

/// Enrollment service wired to SQLite repositories sharing one connection.
pub type SqliteEnrollmentService<'conn> = EnrollmentService<
    SqliteStudentRepository<'conn>,
    SqliteCourseRepository<'conn>,
    SqliteEnrollmentRepository<'conn>,
>;

/// Builds an enrollment service over a migrated connection.
pub fn sqlite_enrollment_service(
    conn: &rusqlite::Connection,
) -> RepoResult<SqliteEnrollmentService<'_>> {
    Ok(EnrollmentService::new(
        SqliteStudentRepository::try_new(conn)?,
        SqliteCourseRepository::try_new(conn)?,
        SqliteEnrollmentRepository::try_new(conn)?,
    ))
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
