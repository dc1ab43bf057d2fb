//! Course/class repository contract and SQLite implementation.
//!
//! # Invariants
//! - `create_course` inserts the course and its default class atomically.
//! - At most one default class per course (partial unique index).

use crate::model::course::{Course, CourseClass, CourseClassId, CourseId, CourseStatus};
use crate::repo::{
    ensure_connection_ready, map_write_error, parse_uuid, Page, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const COURSE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    weekdays,
    start_time,
    end_time,
    max_students,
    status
FROM courses";

const CLASS_SELECT_SQL: &str = "SELECT id, course_id, name, is_default FROM course_classes";

/// Filter and pagination options for listing courses.
#[derive(Debug, Clone, Default)]
pub struct CourseListQuery {
    pub status: Option<CourseStatus>,
    pub page: Page,
}

/// Repository interface for courses and their classes.
pub trait CourseRepository {
    /// Inserts the course together with its default class.
    fn create_course(&self, course: &Course) -> RepoResult<CourseId>;
    fn update_course(&self, course: &Course) -> RepoResult<()>;
    fn get_course(&self, id: CourseId) -> RepoResult<Option<Course>>;
    /// Ordered by name, then id.
    fn list_courses(&self, query: &CourseListQuery) -> RepoResult<Vec<Course>>;
    fn create_class(&self, class: &CourseClass) -> RepoResult<CourseClassId>;
    fn get_class(&self, id: CourseClassId) -> RepoResult<Option<CourseClass>>;
    /// Default class first, then by name.
    fn list_classes(&self, course_id: CourseId) -> RepoResult<Vec<CourseClass>>;
    fn get_default_class(&self, course_id: CourseId) -> RepoResult<Option<CourseClass>>;
}

/// SQLite-backed course repository.
pub struct SqliteCourseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCourseRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CourseRepository for SqliteCourseRepository<'_> {
    fn create_course(&self, course: &Course) -> RepoResult<CourseId> {
        course.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO courses (
                id,
                name,
                description,
                weekdays,
                start_time,
                end_time,
                max_students,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                course.id.to_string(),
                course.name.as_str(),
                course.description.as_deref(),
                course.weekdays.as_str(),
                course.start_time.as_str(),
                course.end_time.as_str(),
                course.max_students,
                course_status_to_db(course.status),
            ],
        )
        .map_err(map_write_error)?;
        insert_class(&tx, &CourseClass::default_for(course.id))?;
        tx.commit()?;

        Ok(course.id)
    }

    fn update_course(&self, course: &Course) -> RepoResult<()> {
        course.validate()?;

        let changed = self.conn.execute(
            "UPDATE courses
             SET
                name = ?1,
                description = ?2,
                weekdays = ?3,
                start_time = ?4,
                end_time = ?5,
                max_students = ?6,
                status = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?8;",
            params![
                course.name.as_str(),
                course.description.as_deref(),
                course.weekdays.as_str(),
                course.start_time.as_str(),
                course.end_time.as_str(),
                course.max_students,
                course_status_to_db(course.status),
                course.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "course",
                id: course.id,
            });
        }
        Ok(())
    }

    fn get_course(&self, id: CourseId) -> RepoResult<Option<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_course_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_courses(&self, query: &CourseListQuery) -> RepoResult<Vec<Course>> {
        let mut sql = format!("{COURSE_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            binds.push(Value::Text(course_status_to_db(status).to_string()));
        }
        sql.push_str(" ORDER BY name ASC, id ASC");
        query.page.push_sql(&mut sql, &mut binds);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut courses = Vec::new();
        while let Some(row) = rows.next()? {
            courses.push(parse_course_row(row)?);
        }
        Ok(courses)
    }

    fn create_class(&self, class: &CourseClass) -> RepoResult<CourseClassId> {
        class.validate()?;
        if self.get_course(class.course_id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: "course",
                id: class.course_id,
            });
        }

        insert_class(self.conn, class)?;
        Ok(class.id)
    }

    fn get_class(&self, id: CourseClassId) -> RepoResult<Option<CourseClass>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CLASS_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_class_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_classes(&self, course_id: CourseId) -> RepoResult<Vec<CourseClass>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLASS_SELECT_SQL}
             WHERE course_id = ?1
             ORDER BY is_default DESC, name ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([course_id.to_string()])?;
        let mut classes = Vec::new();
        while let Some(row) = rows.next()? {
            classes.push(parse_class_row(row)?);
        }
        Ok(classes)
    }

    fn get_default_class(&self, course_id: CourseId) -> RepoResult<Option<CourseClass>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLASS_SELECT_SQL} WHERE course_id = ?1 AND is_default = 1;"
        ))?;
        let mut rows = stmt.query([course_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_class_row(row)?)),
            None => Ok(None),
        }
    }
}

fn insert_class(conn: &Connection, class: &CourseClass) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO course_classes (id, course_id, name, is_default)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            class.id.to_string(),
            class.course_id.to_string(),
            class.name.as_str(),
            i64::from(class.is_default),
        ],
    )
    .map_err(map_write_error)?;
    Ok(())
}

fn parse_course_row(row: &Row<'_>) -> RepoResult<Course> {
    let id: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = parse_course_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid course status `{status_text}` in courses.status"
        ))
    })?;

    Ok(Course {
        id: parse_uuid(&id, "courses.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        weekdays: row.get("weekdays")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        max_students: row.get("max_students")?,
        status,
    })
}

fn parse_class_row(row: &Row<'_>) -> RepoResult<CourseClass> {
    let id: String = row.get("id")?;
    let course_id: String = row.get("course_id")?;
    let is_default = match row.get::<_, i64>("is_default")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_default value `{other}` in course_classes.is_default"
            )));
        }
    };

    Ok(CourseClass {
        id: parse_uuid(&id, "course_classes.id")?,
        course_id: parse_uuid(&course_id, "course_classes.course_id")?,
        name: row.get("name")?,
        is_default,
    })
}

fn course_status_to_db(status: CourseStatus) -> &'static str {
    match status {
        CourseStatus::Active => "active",
        CourseStatus::Inactive => "inactive",
        CourseStatus::Archived => "archived",
    }
}

fn parse_course_status(value: &str) -> Option<CourseStatus> {
    match value {
        "active" => Some(CourseStatus::Active),
        "inactive" => Some(CourseStatus::Inactive),
        "archived" => Some(CourseStatus::Archived),
        _ => None,
    }
}
