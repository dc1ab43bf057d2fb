//! Repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - One trait per aggregate (students, courses, enrollments).
//! - Keep SQL and row decoding inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call the model's `validate()` before any SQL mutation.
//! - Lookups return `Ok(None)` for missing rows; `Err` means the query failed.
//! - Repositories refuse connections that are not fully migrated.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::course::CourseId;
use crate::model::student::StudentId;
use crate::model::ValidationError;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod course_repo;
pub mod enrollment_repo;
pub mod student_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all aggregates.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    /// Target row does not exist or is soft-deleted.
    NotFound { entity: &'static str, id: Uuid },
    /// An open enrollment already exists for this pair.
    DuplicateActiveEnrollment {
        student_id: StudentId,
        course_id: CourseId,
    },
    /// Another unique constraint rejected the write (column list attached).
    UniqueViolation(String),
    /// Connection is not migrated to the schema this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be decoded into a model value.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::DuplicateActiveEnrollment {
                student_id,
                course_id,
            } => write!(
                f,
                "student {student_id} already has an open enrollment in course {course_id}"
            ),
            Self::UniqueViolation(columns) => write!(f, "unique constraint violated: {columns}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pagination options shared by list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    pub(crate) fn push_sql(&self, sql: &mut String, binds: &mut Vec<rusqlite::types::Value>) {
        use rusqlite::types::Value;

        match self.limit {
            Some(limit) => {
                sql.push_str(" LIMIT ?");
                binds.push(Value::Integer(i64::from(limit)));
            }
            None if self.offset > 0 => sql.push_str(" LIMIT -1"),
            None => return,
        }
        if self.offset > 0 {
            sql.push_str(" OFFSET ?");
            binds.push(Value::Integer(i64::from(self.offset)));
        }
    }
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Returns the constraint detail (`table.col, ...`) of a UNIQUE violation.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            message.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

/// Maps UNIQUE violations to `UniqueViolation`; other errors pass through.
pub(crate) fn map_write_error(err: rusqlite::Error) -> RepoError {
    match unique_violation(&err) {
        Some(columns) => RepoError::UniqueViolation(columns.to_string()),
        None => err.into(),
    }
}
