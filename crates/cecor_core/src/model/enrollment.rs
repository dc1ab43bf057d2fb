//! Enrollment records and admission requests.
//!
//! # Invariants
//! - `enrollment_number` is non-blank and unique across the store.
//! - `end_date`, when set, is not earlier than `start_date`.
//! - An enrollment is "open" while its status is `active`, `in_progress` or
//!   `locked` and it is not soft-deleted; at most one open enrollment exists
//!   per (student, course).

use super::course::{CourseClassId, CourseId};
use super::student::StudentId;
use super::{require_non_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EnrollmentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    InProgress,
    Locked,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    /// Statuses that still hold the student's seat in the course.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::InProgress | Self::Locked)
    }
}

/// Persisted binding of one student to one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub class_id: Option<CourseClassId>,
    pub enrollment_number: String,
    pub status: EnrollmentStatus,
    /// Epoch milliseconds.
    pub enrollment_date: i64,
    /// Epoch milliseconds.
    pub start_date: i64,
    /// Epoch milliseconds.
    pub end_date: Option<i64>,
    /// Soft-delete tombstone, epoch milliseconds.
    pub deleted_at: Option<i64>,
}

impl Enrollment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("enrollment_number", &self.enrollment_number)?;
        if let Some(end_date) = self.end_date {
            if end_date < self.start_date {
                return Err(ValidationError::EndBeforeStart {
                    start_date: self.start_date,
                    end_date,
                });
            }
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open() && self.deleted_at.is_none()
    }
}

/// Admission request. Unset fields are derived at admission time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    /// Defaults to the course's default class.
    pub class_id: Option<CourseClassId>,
    /// Kept verbatim when non-empty; synthesized otherwise.
    pub enrollment_number: Option<String>,
    pub enrollment_date: Option<i64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    /// Defaults to `active`.
    pub status: Option<EnrollmentStatus>,
}

impl NewEnrollment {
    pub fn new(student_id: StudentId, course_id: CourseId) -> Self {
        Self {
            student_id,
            course_id,
            ..Self::default()
        }
    }
}
