//! Student/user repository contract and SQLite implementation.
//!
//! # Invariants
//! - `registration_number` is unique; collisions surface as
//!   `RepoError::UniqueViolation`.
//! - Soft-deleted students are hidden unless explicitly requested.
//! - Birth dates are stored as `YYYY-MM-DD` text.

use crate::model::student::{Student, StudentId, StudentProfile, StudentStatus, User};
use crate::repo::{
    ensure_connection_ready, map_write_error, parse_uuid, Page, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

const STUDENT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    registration_number,
    status,
    deleted_at
FROM students";

const PROFILE_SELECT_SQL: &str = "SELECT
    s.id AS id,
    s.user_id AS user_id,
    s.registration_number AS registration_number,
    s.status AS status,
    s.deleted_at AS deleted_at,
    u.full_name AS full_name,
    u.birth_date AS birth_date,
    u.email AS email,
    u.phone AS phone
FROM students s
JOIN users u ON u.id = s.user_id";

/// Filter and pagination options for listing students.
#[derive(Debug, Clone, Default)]
pub struct StudentListQuery {
    pub status: Option<StudentStatus>,
    pub include_deleted: bool,
    pub page: Page,
}

/// Repository interface for students and their user rows.
pub trait StudentRepository {
    /// Inserts the user row and the student row in one transaction.
    fn create_profile(&self, profile: &StudentProfile) -> RepoResult<StudentId>;
    /// Updates registration number and status.
    fn update_student(&self, student: &Student) -> RepoResult<()>;
    fn get_student(&self, id: StudentId, include_deleted: bool) -> RepoResult<Option<Student>>;
    /// Active (not soft-deleted) student joined with its user.
    fn get_student_profile(&self, id: StudentId) -> RepoResult<Option<StudentProfile>>;
    fn find_by_registration_number(&self, registration_number: &str)
        -> RepoResult<Option<Student>>;
    /// Ordered by registration number.
    fn list_students(&self, query: &StudentListQuery) -> RepoResult<Vec<Student>>;
    fn soft_delete_student(&self, id: StudentId) -> RepoResult<()>;
}

/// SQLite-backed student repository.
pub struct SqliteStudentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn create_profile(&self, profile: &StudentProfile) -> RepoResult<StudentId> {
        let StudentProfile { student, user } = profile;
        user.validate()?;
        student.validate()?;
        if student.user_id != user.id {
            return Err(RepoError::InvalidData(format!(
                "student {} links user {} but profile carries user {}",
                student.id, student.user_id, user.id
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO users (id, full_name, birth_date, email, phone)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                user.id.to_string(),
                user.full_name.as_str(),
                format_date(user.birth_date)?,
                user.email.as_deref(),
                user.phone.as_deref(),
            ],
        )
        .map_err(map_write_error)?;
        tx.execute(
            "INSERT INTO students (id, user_id, registration_number, status, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                student.id.to_string(),
                user.id.to_string(),
                student.registration_number.as_str(),
                student_status_to_db(student.status),
                student.deleted_at,
            ],
        )
        .map_err(map_write_error)?;
        tx.commit()?;

        Ok(student.id)
    }

    fn update_student(&self, student: &Student) -> RepoResult<()> {
        student.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE students
                 SET
                    registration_number = ?1,
                    status = ?2,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?3
                   AND deleted_at IS NULL;",
                params![
                    student.registration_number.as_str(),
                    student_status_to_db(student.status),
                    student.id.to_string(),
                ],
            )
            .map_err(map_write_error)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "student",
                id: student.id,
            });
        }
        Ok(())
    }

    fn get_student(&self, id: StudentId, include_deleted: bool) -> RepoResult<Option<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), i64::from(include_deleted)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_student_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_student_profile(&self, id: StudentId) -> RepoResult<Option<StudentProfile>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROFILE_SELECT_SQL}
             WHERE s.id = ?1
               AND s.deleted_at IS NULL;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let student = parse_student_row(row)?;
        let birth_date: String = row.get("birth_date")?;
        let user = User {
            id: student.user_id,
            full_name: row.get("full_name")?,
            birth_date: parse_date(&birth_date)?,
            email: row.get("email")?,
            phone: row.get("phone")?,
        };
        Ok(Some(StudentProfile { student, user }))
    }

    fn find_by_registration_number(
        &self,
        registration_number: &str,
    ) -> RepoResult<Option<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL} WHERE registration_number = ?1;"
        ))?;
        let mut rows = stmt.query([registration_number])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_student_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_students(&self, query: &StudentListQuery) -> RepoResult<Vec<Student>> {
        let mut sql = format!("{STUDENT_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            binds.push(Value::Text(student_status_to_db(status).to_string()));
        }
        sql.push_str(" ORDER BY registration_number ASC");
        query.page.push_sql(&mut sql, &mut binds);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn soft_delete_student(&self, id: StudentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE students
             SET
                deleted_at = COALESCE(deleted_at, strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "student",
                id,
            });
        }
        Ok(())
    }
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    let status_text: String = row.get("status")?;
    let status = parse_student_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid student status `{status_text}` in students.status"
        ))
    })?;

    Ok(Student {
        id: parse_uuid(&id, "students.id")?,
        user_id: parse_uuid(&user_id, "students.user_id")?,
        registration_number: row.get("registration_number")?,
        status,
        deleted_at: row.get("deleted_at")?,
    })
}

fn format_date(date: Date) -> RepoResult<String> {
    date.format(DATE_FORMAT)
        .map_err(|err| RepoError::InvalidData(format!("cannot format date {date}: {err}")))
}

fn parse_date(value: &str) -> RepoResult<Date> {
    Date::parse(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in users.birth_date")))
}

fn student_status_to_db(status: StudentStatus) -> &'static str {
    match status {
        StudentStatus::Active => "active",
        StudentStatus::Inactive => "inactive",
        StudentStatus::Suspended => "suspended",
    }
}

fn parse_student_status(value: &str) -> Option<StudentStatus> {
    match value {
        "active" => Some(StudentStatus::Active),
        "inactive" => Some(StudentStatus::Inactive),
        "suspended" => Some(StudentStatus::Suspended),
        _ => None,
    }
}
