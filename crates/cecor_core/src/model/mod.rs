//! Canonical domain model for the back-office.
//!
//! # Responsibility
//! - Define the one entity set used by repositories and services.
//! - Provide field-level validation that does not need storage access.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Students and enrollments are soft-deleted via `deleted_at`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod course;
pub mod enrollment;
pub mod student;

/// Field-level validation failure raised before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Weekday list is not a comma-separated list of `0..=6`.
    InvalidWeekdays(String),
    /// Time of day is not `HH:MM`.
    InvalidTimeOfDay(String),
    /// Course ends at or before it starts.
    EmptyTimeRange {
        start_time: String,
        end_time: String,
    },
    /// Course capacity must be positive.
    InvalidCapacity(u32),
    /// Enrollment end date precedes its start date.
    EndBeforeStart { start_date: i64, end_date: i64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidWeekdays(value) => write!(
                f,
                "invalid weekday list `{value}`; expected comma-separated values in 0..=6"
            ),
            Self::InvalidTimeOfDay(value) => {
                write!(f, "invalid time of day `{value}`; expected HH:MM")
            }
            Self::EmptyTimeRange {
                start_time,
                end_time,
            } => write!(f, "end time {end_time} must be after start time {start_time}"),
            Self::InvalidCapacity(value) => {
                write!(f, "max_students must be greater than zero, got {value}")
            }
            Self::EndBeforeStart {
                start_date,
                end_date,
            } => write!(f, "end date {end_date} precedes start date {start_date}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
