//! Course and course class records.
//!
//! # Invariants
//! - `weekdays` is a comma-separated list of weekday indices `0..=6`
//!   (0 = Sunday), kept verbatim as entered.
//! - `start_time`/`end_time` are zero-padded `HH:MM` strings, so lexical
//!   order equals chronological order.
//! - Every course owns exactly one default class.

use super::{require_non_blank, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CourseId = Uuid;
pub type CourseClassId = Uuid;

/// Name given to the class created alongside every course.
pub const DEFAULT_CLASS_NAME: &str = "Default class";

static WEEKDAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-6](,[0-6])*$").expect("valid weekdays regex"));
static TIME_OF_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Active,
    Inactive,
    Archived,
}

/// Course offered by the center, with its weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: Option<String>,
    /// Weekday indices, e.g. `"1,3,5"` for Monday/Wednesday/Friday.
    pub weekdays: String,
    /// `HH:MM`.
    pub start_time: String,
    /// `HH:MM`, after `start_time`.
    pub end_time: String,
    pub max_students: u32,
    pub status: CourseStatus,
}

impl Course {
    pub fn new(
        name: impl Into<String>,
        weekdays: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        max_students: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            weekdays: weekdays.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            max_students,
            status: CourseStatus::Active,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("name", &self.name)?;
        if !WEEKDAYS_RE.is_match(&self.weekdays) {
            return Err(ValidationError::InvalidWeekdays(self.weekdays.clone()));
        }
        for value in [&self.start_time, &self.end_time] {
            if !TIME_OF_DAY_RE.is_match(value) {
                return Err(ValidationError::InvalidTimeOfDay(value.clone()));
            }
        }
        if self.end_time <= self.start_time {
            return Err(ValidationError::EmptyTimeRange {
                start_time: self.start_time.clone(),
                end_time: self.end_time.clone(),
            });
        }
        if self.max_students == 0 {
            return Err(ValidationError::InvalidCapacity(self.max_students));
        }
        Ok(())
    }

    /// Whether both courses occupy the same weekly slot.
    ///
    /// Compares the raw weekday list and start time for equality only.
    /// `"1,3,5" 09:00` and `"1,3,5" 09:30` do not share a slot even though
    /// the sessions overlap, and `"1,3,5"` differs from `"5,3,1"`.
    pub fn shares_slot_with(&self, other: &Course) -> bool {
        self.weekdays == other.weekdays && self.start_time == other.start_time
    }
}

/// A section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseClass {
    pub id: CourseClassId,
    pub course_id: CourseId,
    pub name: String,
    pub is_default: bool,
}

impl CourseClass {
    pub fn new(course_id: CourseId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            name: name.into(),
            is_default: false,
        }
    }

    /// The class every course gets on creation.
    pub fn default_for(course_id: CourseId) -> Self {
        Self {
            is_default: true,
            ..Self::new(course_id, DEFAULT_CLASS_NAME)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("class name", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::Course;
    use crate::model::ValidationError;

    fn course(weekdays: &str, start: &str, end: &str) -> Course {
        Course::new("Informatics", weekdays, start, end, 20)
    }

    #[test]
    fn validate_accepts_well_formed_schedule() {
        course("1,3,5", "09:00", "10:30").validate().unwrap();
        course("6", "23:00", "23:59").validate().unwrap();
    }

    #[test]
    fn validate_rejects_malformed_weekdays_and_times() {
        assert!(matches!(
            course("1;3", "09:00", "10:00").validate(),
            Err(ValidationError::InvalidWeekdays(_))
        ));
        assert!(matches!(
            course("7", "09:00", "10:00").validate(),
            Err(ValidationError::InvalidWeekdays(_))
        ));
        assert!(matches!(
            course("1", "9:00", "10:00").validate(),
            Err(ValidationError::InvalidTimeOfDay(_))
        ));
        assert!(matches!(
            course("1", "10:00", "10:00").validate(),
            Err(ValidationError::EmptyTimeRange { .. })
        ));
    }

    #[test]
    fn slot_sharing_is_exact_string_match() {
        let base = course("1,3,5", "09:00", "10:00");
        assert!(base.shares_slot_with(&course("1,3,5", "09:00", "11:00")));
        assert!(!base.shares_slot_with(&course("1,3,5", "09:30", "10:30")));
        assert!(!base.shares_slot_with(&course("5,3,1", "09:00", "10:00")));
    }
}
