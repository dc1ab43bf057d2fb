//! Enrollment repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over `enrollments` plus the lookups admission needs.
//! - Translate the open-pair unique index into a semantic error.
//!
//! # Invariants
//! - `find_by_student_and_course` returns the open enrollment of the pair,
//!   or the most recent one when none is open; `Ok(None)` when absent.
//! - Concurrent inserts of an open enrollment for one pair: exactly one
//!   succeeds, the others get `RepoError::DuplicateActiveEnrollment`.

use crate::model::course::CourseId;
use crate::model::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::model::student::StudentId;
use crate::repo::{
    ensure_connection_ready, parse_uuid, unique_violation, Page, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENROLLMENT_SELECT_SQL: &str = "SELECT
    id,
    student_id,
    course_id,
    class_id,
    enrollment_number,
    status,
    enrollment_date,
    start_date,
    end_date,
    deleted_at
FROM enrollments";

/// Columns reported by SQLite when the open-pair index rejects an insert.
const OPEN_PAIR_COLUMNS: &str = "enrollments.student_id, enrollments.course_id";

/// Filter and pagination options for listing enrollments.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentListQuery {
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    pub status: Option<EnrollmentStatus>,
    pub include_deleted: bool,
    pub page: Page,
}

/// Repository interface for enrollments.
pub trait EnrollmentRepository {
    fn create_enrollment(&self, enrollment: &Enrollment) -> RepoResult<EnrollmentId>;
    fn get_enrollment(&self, id: EnrollmentId) -> RepoResult<Option<Enrollment>>;
    fn find_by_student_and_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RepoResult<Option<Enrollment>>;
    /// Ordered by enrollment date, then id.
    fn list_enrollments(&self, query: &EnrollmentListQuery) -> RepoResult<Vec<Enrollment>>;
    /// Non-deleted enrollments of one course.
    fn list_by_course(&self, course_id: CourseId) -> RepoResult<Vec<Enrollment>>;
    /// Non-deleted enrollments of one student with status `active`.
    fn list_active_by_student(&self, student_id: StudentId) -> RepoResult<Vec<Enrollment>>;
    fn update_enrollment(&self, enrollment: &Enrollment) -> RepoResult<()>;
    fn soft_delete_enrollment(&self, id: EnrollmentId) -> RepoResult<()>;
}

/// SQLite-backed enrollment repository.
pub struct SqliteEnrollmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnrollmentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_enrollments(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Enrollment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut enrollments = Vec::new();
        while let Some(row) = rows.next()? {
            enrollments.push(parse_enrollment_row(row)?);
        }
        Ok(enrollments)
    }
}

impl EnrollmentRepository for SqliteEnrollmentRepository<'_> {
    fn create_enrollment(&self, enrollment: &Enrollment) -> RepoResult<EnrollmentId> {
        enrollment.validate()?;

        self.conn
            .execute(
                "INSERT INTO enrollments (
                    id,
                    student_id,
                    course_id,
                    class_id,
                    enrollment_number,
                    status,
                    enrollment_date,
                    start_date,
                    end_date,
                    deleted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    enrollment.id.to_string(),
                    enrollment.student_id.to_string(),
                    enrollment.course_id.to_string(),
                    enrollment.class_id.map(|id| id.to_string()),
                    enrollment.enrollment_number.as_str(),
                    enrollment_status_to_db(enrollment.status),
                    enrollment.enrollment_date,
                    enrollment.start_date,
                    enrollment.end_date,
                    enrollment.deleted_at,
                ],
            )
            .map_err(|err| map_enrollment_write_error(err, enrollment))?;

        Ok(enrollment.id)
    }

    fn get_enrollment(&self, id: EnrollmentId) -> RepoResult<Option<Enrollment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE id = ?1
               AND deleted_at IS NULL;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_enrollment_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_by_student_and_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> RepoResult<Option<Enrollment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE student_id = ?1
               AND course_id = ?2
               AND deleted_at IS NULL
             ORDER BY
                status IN ('active', 'in_progress', 'locked') DESC,
                enrollment_date DESC,
                id ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([student_id.to_string(), course_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_enrollment_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_enrollments(&self, query: &EnrollmentListQuery) -> RepoResult<Vec<Enrollment>> {
        let mut sql = format!("{ENROLLMENT_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        if let Some(student_id) = query.student_id {
            sql.push_str(" AND student_id = ?");
            binds.push(Value::Text(student_id.to_string()));
        }
        if let Some(course_id) = query.course_id {
            sql.push_str(" AND course_id = ?");
            binds.push(Value::Text(course_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            binds.push(Value::Text(enrollment_status_to_db(status).to_string()));
        }
        sql.push_str(" ORDER BY enrollment_date ASC, id ASC");
        query.page.push_sql(&mut sql, &mut binds);

        self.query_enrollments(&sql, binds)
    }

    fn list_by_course(&self, course_id: CourseId) -> RepoResult<Vec<Enrollment>> {
        self.list_enrollments(&EnrollmentListQuery {
            course_id: Some(course_id),
            ..EnrollmentListQuery::default()
        })
    }

    fn list_active_by_student(&self, student_id: StudentId) -> RepoResult<Vec<Enrollment>> {
        self.list_enrollments(&EnrollmentListQuery {
            student_id: Some(student_id),
            status: Some(EnrollmentStatus::Active),
            ..EnrollmentListQuery::default()
        })
    }

    fn update_enrollment(&self, enrollment: &Enrollment) -> RepoResult<()> {
        enrollment.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE enrollments
                 SET
                    class_id = ?1,
                    enrollment_number = ?2,
                    status = ?3,
                    enrollment_date = ?4,
                    start_date = ?5,
                    end_date = ?6,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?7
                   AND deleted_at IS NULL;",
                params![
                    enrollment.class_id.map(|id| id.to_string()),
                    enrollment.enrollment_number.as_str(),
                    enrollment_status_to_db(enrollment.status),
                    enrollment.enrollment_date,
                    enrollment.start_date,
                    enrollment.end_date,
                    enrollment.id.to_string(),
                ],
            )
            .map_err(|err| map_enrollment_write_error(err, enrollment))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "enrollment",
                id: enrollment.id,
            });
        }
        Ok(())
    }

    fn soft_delete_enrollment(&self, id: EnrollmentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE enrollments
             SET
                deleted_at = COALESCE(deleted_at, strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "enrollment",
                id,
            });
        }
        Ok(())
    }
}

fn map_enrollment_write_error(err: rusqlite::Error, enrollment: &Enrollment) -> RepoError {
    match unique_violation(&err) {
        Some(OPEN_PAIR_COLUMNS) => RepoError::DuplicateActiveEnrollment {
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
        },
        Some(columns) => RepoError::UniqueViolation(columns.to_string()),
        None => err.into(),
    }
}

fn parse_enrollment_row(row: &Row<'_>) -> RepoResult<Enrollment> {
    let id: String = row.get("id")?;
    let student_id: String = row.get("student_id")?;
    let course_id: String = row.get("course_id")?;
    let class_id = match row.get::<_, Option<String>>("class_id")? {
        Some(value) => Some(parse_uuid(&value, "enrollments.class_id")?),
        None => None,
    };
    let status_text: String = row.get("status")?;
    let status = parse_enrollment_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid enrollment status `{status_text}` in enrollments.status"
        ))
    })?;

    let enrollment = Enrollment {
        id: parse_uuid(&id, "enrollments.id")?,
        student_id: parse_uuid(&student_id, "enrollments.student_id")?,
        course_id: parse_uuid(&course_id, "enrollments.course_id")?,
        class_id,
        enrollment_number: row.get("enrollment_number")?,
        status,
        enrollment_date: row.get("enrollment_date")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        deleted_at: row.get("deleted_at")?,
    };
    enrollment.validate()?;
    Ok(enrollment)
}

fn enrollment_status_to_db(status: EnrollmentStatus) -> &'static str {
    match status {
        EnrollmentStatus::Active => "active",
        EnrollmentStatus::InProgress => "in_progress",
        EnrollmentStatus::Locked => "locked",
        EnrollmentStatus::Completed => "completed",
        EnrollmentStatus::Cancelled => "cancelled",
    }
}

fn parse_enrollment_status(value: &str) -> Option<EnrollmentStatus> {
    match value {
        "active" => Some(EnrollmentStatus::Active),
        "in_progress" => Some(EnrollmentStatus::InProgress),
        "locked" => Some(EnrollmentStatus::Locked),
        "completed" => Some(EnrollmentStatus::Completed),
        "cancelled" => Some(EnrollmentStatus::Cancelled),
        _ => None,
    }
}
