use cecor_core::db::migrations::{apply_migrations, apply_migrations_to, latest_version};
use cecor_core::db::{open_db, open_db_in_memory, DbError};
use cecor_core::{
    CourseRepository, EnrollmentRepository, RepoError, SqliteCourseRepository,
    SqliteEnrollmentRepository,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["users", "students", "courses", "enrollments", "course_classes"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_database_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cecor.db");

    drop(open_db(&path).unwrap());
    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn migrating_to_unknown_version_is_rejected() {
    let mut conn = Connection::open_in_memory().unwrap();
    let err = apply_migrations_to(&mut conn, latest_version() + 1).unwrap_err();
    assert!(matches!(err, DbError::UnknownMigrationTarget(_)));
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn repositories_refuse_partially_migrated_connections() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();

    let err = SqliteEnrollmentRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 1,
            ..
        }
    ));
}

#[test]
fn upgrade_backfills_default_class_for_legacy_courses_and_enrollments() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();

    let user_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();
    let course_id = Uuid::new_v4();
    let enrollment_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, full_name, birth_date) VALUES (?1, 'Legacy', '2005-03-01');",
        params![user_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO students (id, user_id, registration_number) VALUES (?1, ?2, 'R-0001');",
        params![student_id.to_string(), user_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO courses (id, name, weekdays, start_time, end_time, max_students)
         VALUES (?1, 'Guitar', '2,4', '14:00', '15:30', 12);",
        params![course_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO enrollments (
            id, student_id, course_id, enrollment_number, status, enrollment_date, start_date
         ) VALUES (?1, ?2, ?3, 'LEGACY-1', 'active', 1000, 1000);",
        params![
            enrollment_id.to_string(),
            student_id.to_string(),
            course_id.to_string()
        ],
    )
    .unwrap();

    apply_migrations(&mut conn).unwrap();
    assert_eq!(schema_version(&conn), latest_version());

    let courses = SqliteCourseRepository::try_new(&conn).unwrap();
    let default_class = courses.get_default_class(course_id).unwrap().unwrap();
    assert!(default_class.is_default);
    assert_eq!(default_class.name, "Default class");
    assert_eq!(courses.list_classes(course_id).unwrap().len(), 1);

    let enrollments = SqliteEnrollmentRepository::try_new(&conn).unwrap();
    let enrollment = enrollments.get_enrollment(enrollment_id).unwrap().unwrap();
    assert_eq!(enrollment.class_id, Some(default_class.id));
    assert_eq!(enrollment.enrollment_number, "LEGACY-1");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
