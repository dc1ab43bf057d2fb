use cecor_core::db::open_db;
use cecor_core::{
    sqlite_enrollment_service, Course, CourseService, EnrollmentServiceError, NewEnrollment,
    RegisterStudentRequest, SqliteCourseRepository, SqliteStudentRepository, StudentService,
};
use std::sync::{Arc, Barrier};
use std::thread;
use time::macros::date;

const CONTENDERS: usize = 4;

#[test]
fn racing_admissions_for_one_pair_admit_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cecor.sqlite3");

    let (student_id, course_id) = {
        let conn = open_db(&db_path).unwrap();
        let students = StudentService::new(SqliteStudentRepository::try_new(&conn).unwrap());
        let courses = CourseService::new(SqliteCourseRepository::try_new(&conn).unwrap());
        let student = students
            .register_student(&RegisterStudentRequest {
                full_name: "Student".to_string(),
                birth_date: date!(2010 - 05 - 05),
                email: None,
                phone: None,
                registration_number: "S-1".to_string(),
            })
            .unwrap();
        let course = courses
            .create_course(&Course::new("Painting", "2,4", "18:00", "20:00", 15))
            .unwrap();
        (student.student.id, course.id)
    };

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let db_path = db_path.clone();
            thread::spawn(move || {
                let conn = open_db(&db_path).unwrap();
                let service = sqlite_enrollment_service(&conn).unwrap();
                let request = NewEnrollment {
                    enrollment_number: Some(format!("RACE-{index}")),
                    ..NewEnrollment::new(student_id, course_id)
                };
                barrier.wait();
                service.enroll_student(&request)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(admitted, 1, "results: {results:?}");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, EnrollmentServiceError::DuplicateEnrollment { .. }),
                "unexpected error: {err}"
            );
        }
    }

    let conn = open_db(&db_path).unwrap();
    let open_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM enrollments
             WHERE student_id = ?1 AND course_id = ?2 AND deleted_at IS NULL;",
            [student_id.to_string(), course_id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(open_rows, 1);
}
