//! Enrollment admission workflow and enrollment CRUD.
//!
//! # Responsibility
//! - Decide whether a student may be enrolled in a course.
//! - Derive the defaulted fields of a new enrollment.
//!
//! # Invariants
//! - Checks run in order: duplicate, age, schedule conflict. The first
//!   failure wins and nothing is written.
//! - Schedule conflicts are exact matches on the weekday string and start
//!   time string. Overlapping but unequal slots are admitted.
//! - The open-pair unique index backs the duplicate check, so two racing
//!   admissions for one pair cannot both succeed.

use crate::model::course::{Course, CourseClassId, CourseId};
use crate::model::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment};
use crate::model::student::StudentId;
use crate::model::ValidationError;
use crate::repo::course_repo::CourseRepository;
use crate::repo::enrollment_repo::{EnrollmentListQuery, EnrollmentRepository};
use crate::repo::student_repo::StudentRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use time::OffsetDateTime;
use uuid::Uuid;

/// Youngest age, in whole years, accepted for any course.
pub const MINIMUM_ENROLLMENT_AGE: i32 = 12;

/// Prefix of synthesized enrollment numbers.
pub const ENROLLMENT_NUMBER_PREFIX: &str = "ENR-";

/// Tunable admission rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub minimum_age: i32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            minimum_age: MINIMUM_ENROLLMENT_AGE,
        }
    }
}

/// Errors from enrollment use-cases.
#[derive(Debug)]
pub enum EnrollmentServiceError {
    /// A repository read failed for a reason other than "not found".
    LookupFailed {
        step: &'static str,
        source: RepoError,
    },
    StudentNotFound(StudentId),
    CourseNotFound(CourseId),
    /// Requested class is unknown or belongs to another course.
    ClassNotInCourse {
        class_id: CourseClassId,
        course_id: CourseId,
    },
    /// The pair already has an open enrollment.
    DuplicateEnrollment {
        student_id: StudentId,
        course_id: CourseId,
    },
    IneligibleAge { age: i32, minimum: i32 },
    /// Another active enrollment occupies the same weekly slot.
    ScheduleConflict {
        course_id: CourseId,
        weekdays: String,
        start_time: String,
    },
    EnrollmentNotFound(EnrollmentId),
    /// Request fields are malformed; nothing was written.
    InvalidRequest(ValidationError),
    /// Write failed.
    Persistence(RepoError),
}

impl EnrollmentServiceError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LookupFailed { .. } => "lookup_failed",
            Self::StudentNotFound(_) => "student_not_found",
            Self::CourseNotFound(_) => "course_not_found",
            Self::ClassNotInCourse { .. } => "class_not_in_course",
            Self::DuplicateEnrollment { .. } => "duplicate_enrollment",
            Self::IneligibleAge { .. } => "ineligible_age",
            Self::ScheduleConflict { .. } => "schedule_conflict",
            Self::EnrollmentNotFound(_) => "enrollment_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}

impl Display for EnrollmentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LookupFailed { step, source } => write!(f, "{step} failed: {source}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::ClassNotInCourse {
                class_id,
                course_id,
            } => write!(f, "class {class_id} does not belong to course {course_id}"),
            Self::DuplicateEnrollment {
                student_id,
                course_id,
            } => write!(
                f,
                "student {student_id} is already enrolled in course {course_id}"
            ),
            Self::IneligibleAge { age, minimum } => write!(
                f,
                "student is {age} years old; minimum age for enrollment is {minimum}"
            ),
            Self::ScheduleConflict {
                course_id,
                weekdays,
                start_time,
            } => write!(
                f,
                "schedule conflict with course {course_id} at {start_time} on weekdays {weekdays}"
            ),
            Self::EnrollmentNotFound(id) => write!(f, "enrollment not found: {id}"),
            Self::InvalidRequest(err) => write!(f, "invalid enrollment request: {err}"),
            Self::Persistence(err) => write!(f, "failed to persist enrollment: {err}"),
        }
    }
}

impl Error for EnrollmentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LookupFailed { source, .. } => Some(source),
            Self::InvalidRequest(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EnrollmentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "enrollment",
                id,
            } => Self::EnrollmentNotFound(id),
            RepoError::DuplicateActiveEnrollment {
                student_id,
                course_id,
            } => Self::DuplicateEnrollment {
                student_id,
                course_id,
            },
            RepoError::Validation(err) => Self::InvalidRequest(err),
            other => Self::Persistence(other),
        }
    }
}

impl From<ValidationError> for EnrollmentServiceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidRequest(value)
    }
}

pub type EnrollmentServiceResult<T> = Result<T, EnrollmentServiceError>;

fn lookup(step: &'static str) -> impl FnOnce(RepoError) -> EnrollmentServiceError {
    move |source| EnrollmentServiceError::LookupFailed { step, source }
}

/// Enrollment service composing student, course and enrollment storage.
pub struct EnrollmentService<S, C, E> {
    students: S,
    courses: C,
    enrollments: E,
    policy: AdmissionPolicy,
}

impl<S, C, E> EnrollmentService<S, C, E>
where
    S: StudentRepository,
    C: CourseRepository,
    E: EnrollmentRepository,
{
    pub fn new(students: S, courses: C, enrollments: E) -> Self {
        Self {
            students,
            courses,
            enrollments,
            policy: AdmissionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the admission workflow against the current UTC clock.
    pub fn enroll_student(&self, request: &NewEnrollment) -> EnrollmentServiceResult<Enrollment> {
        self.enroll_student_at(request, OffsetDateTime::now_utc())
    }

    /// Runs the admission workflow as of `now`.
    ///
    /// `now` drives the age computation, the synthesized enrollment number
    /// and the defaulted dates.
    pub fn enroll_student_at(
        &self,
        request: &NewEnrollment,
        now: OffsetDateTime,
    ) -> EnrollmentServiceResult<Enrollment> {
        let started_at = Instant::now();
        let result = self.admit(request, now);

        match &result {
            Ok(enrollment) => info!(
                "event=enrollment_admit module=enrollment status=ok enrollment_id={} student_id={} course_id={} duration_ms={}",
                enrollment.id,
                enrollment.student_id,
                enrollment.course_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=enrollment_admit module=enrollment status=rejected student_id={} course_id={} duration_ms={} error_code={} error={}",
                request.student_id,
                request.course_id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }

        result
    }

    fn admit(
        &self,
        request: &NewEnrollment,
        now: OffsetDateTime,
    ) -> EnrollmentServiceResult<Enrollment> {
        self.ensure_not_enrolled(request.student_id, request.course_id)?;
        self.ensure_eligible_age(request.student_id, now)?;
        let course = self.ensure_no_schedule_conflict(request.student_id, request.course_id)?;
        let class_id = self.resolve_class(&course, request.class_id)?;

        let now_ms = epoch_ms(now);
        let enrollment_number = match request.enrollment_number.as_deref() {
            Some(number) if !number.trim().is_empty() => number.to_string(),
            _ => synthesize_enrollment_number(request.student_id, now),
        };
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            course_id: request.course_id,
            class_id,
            enrollment_number,
            status: request.status.unwrap_or(EnrollmentStatus::Active),
            enrollment_date: request.enrollment_date.unwrap_or(now_ms),
            start_date: request.start_date.unwrap_or(now_ms),
            end_date: request.end_date,
            deleted_at: None,
        };
        enrollment.validate()?;

        self.enrollments.create_enrollment(&enrollment)?;
        Ok(enrollment)
    }

    fn ensure_not_enrolled(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> EnrollmentServiceResult<()> {
        let existing = self
            .enrollments
            .find_by_student_and_course(student_id, course_id)
            .map_err(lookup("find_by_student_and_course"))?;

        match existing {
            Some(enrollment) if enrollment.is_open() => {
                Err(EnrollmentServiceError::DuplicateEnrollment {
                    student_id,
                    course_id,
                })
            }
            _ => Ok(()),
        }
    }

    fn ensure_eligible_age(
        &self,
        student_id: StudentId,
        now: OffsetDateTime,
    ) -> EnrollmentServiceResult<()> {
        let profile = self
            .students
            .get_student_profile(student_id)
            .map_err(lookup("get_student_profile"))?
            .ok_or(EnrollmentServiceError::StudentNotFound(student_id))?;

        let age = profile.user.age_on(now.date());
        if age < self.policy.minimum_age {
            return Err(EnrollmentServiceError::IneligibleAge {
                age,
                minimum: self.policy.minimum_age,
            });
        }
        Ok(())
    }

    /// Returns the target course when no active enrollment shares its slot.
    fn ensure_no_schedule_conflict(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> EnrollmentServiceResult<Course> {
        let target = self
            .courses
            .get_course(course_id)
            .map_err(lookup("get_course"))?
            .ok_or(EnrollmentServiceError::CourseNotFound(course_id))?;

        let active = self
            .enrollments
            .list_active_by_student(student_id)
            .map_err(lookup("list_active_by_student"))?;

        for enrollment in active {
            // A racing admission for this pair committed after the duplicate check.
            if enrollment.course_id == course_id {
                return Err(EnrollmentServiceError::DuplicateEnrollment {
                    student_id,
                    course_id,
                });
            }
            // Missing courses cannot occupy a slot.
            let Some(other) = self
                .courses
                .get_course(enrollment.course_id)
                .map_err(lookup("get_course"))?
            else {
                continue;
            };
            if other.shares_slot_with(&target) {
                return Err(EnrollmentServiceError::ScheduleConflict {
                    course_id: other.id,
                    weekdays: other.weekdays,
                    start_time: other.start_time,
                });
            }
        }

        Ok(target)
    }

    fn resolve_class(
        &self,
        course: &Course,
        requested: Option<CourseClassId>,
    ) -> EnrollmentServiceResult<Option<CourseClassId>> {
        let Some(class_id) = requested else {
            let default = self
                .courses
                .get_default_class(course.id)
                .map_err(lookup("get_default_class"))?;
            return Ok(default.map(|class| class.id));
        };

        match self
            .courses
            .get_class(class_id)
            .map_err(lookup("get_class"))?
        {
            Some(class) if class.course_id == course.id => Ok(Some(class_id)),
            _ => Err(EnrollmentServiceError::ClassNotInCourse {
                class_id,
                course_id: course.id,
            }),
        }
    }

    pub fn get_enrollment(&self, id: EnrollmentId) -> EnrollmentServiceResult<Option<Enrollment>> {
        Ok(self.enrollments.get_enrollment(id)?)
    }

    pub fn list_enrollments(
        &self,
        query: &EnrollmentListQuery,
    ) -> EnrollmentServiceResult<Vec<Enrollment>> {
        Ok(self.enrollments.list_enrollments(query)?)
    }

    pub fn list_by_course(&self, course_id: CourseId) -> EnrollmentServiceResult<Vec<Enrollment>> {
        Ok(self.enrollments.list_by_course(course_id)?)
    }

    /// Stores `enrollment` as-is. Reopening a second enrollment for a pair
    /// is rejected by storage as `DuplicateEnrollment`.
    pub fn update_enrollment(&self, enrollment: &Enrollment) -> EnrollmentServiceResult<()> {
        enrollment.validate()?;
        self.enrollments.update_enrollment(enrollment)?;
        Ok(())
    }

    /// Soft-deletes one enrollment.
    pub fn delete_enrollment(&self, id: EnrollmentId) -> EnrollmentServiceResult<()> {
        self.enrollments.soft_delete_enrollment(id)?;
        info!("event=enrollment_delete module=enrollment status=ok enrollment_id={id}");
        Ok(())
    }
}

/// `ENR-<student id>-<unix timestamp in nanoseconds>`.
///
/// Unique only as far as the clock resolution separates two admissions of
/// the same student; the store's unique index rejects a collision.
pub fn synthesize_enrollment_number(student_id: StudentId, now: OffsetDateTime) -> String {
    format!(
        "{ENROLLMENT_NUMBER_PREFIX}{student_id}-{}",
        now.unix_timestamp_nanos()
    )
}

fn epoch_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::{synthesize_enrollment_number, EnrollmentServiceError, ENROLLMENT_NUMBER_PREFIX};
    use crate::model::ValidationError;
    use crate::repo::RepoError;
    use time::macros::datetime;
    use uuid::Uuid;

    #[test]
    fn synthesized_number_carries_prefix_student_and_timestamp() {
        let student_id = Uuid::new_v4();
        let number = synthesize_enrollment_number(student_id, datetime!(2026-10-18 12:00 UTC));
        assert!(number.starts_with(ENROLLMENT_NUMBER_PREFIX));
        assert!(number.contains(&student_id.to_string()));
        assert!(number.ends_with("1792324800000000000"));
    }

    #[test]
    fn repo_pair_violation_maps_to_duplicate_enrollment() {
        let student_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let err = EnrollmentServiceError::from(RepoError::DuplicateActiveEnrollment {
            student_id,
            course_id,
        });
        assert!(matches!(
            err,
            EnrollmentServiceError::DuplicateEnrollment { student_id: s, course_id: c }
                if s == student_id && c == course_id
        ));
        assert_eq!(err.code(), "duplicate_enrollment");
    }

    #[test]
    fn repo_validation_failure_maps_to_invalid_request() {
        let err = EnrollmentServiceError::from(RepoError::Validation(
            ValidationError::BlankField("enrollment_number"),
        ));
        assert!(matches!(
            err,
            EnrollmentServiceError::InvalidRequest(ValidationError::BlankField("enrollment_number"))
        ));
        assert_eq!(err.code(), "invalid_request");
    }
}
