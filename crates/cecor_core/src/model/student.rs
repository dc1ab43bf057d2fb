//! User and student records.
//!
//! A student is always backed by one user row that carries personal data
//! (name, birth date, contact). Admission reads the birth date through
//! `StudentProfile`.

use super::{require_non_blank, ValidationError};
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

pub type UserId = Uuid;
pub type StudentId = Uuid;

/// Lifecycle state of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    Suspended,
}

/// Person record shared by students, guardians and staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub birth_date: Date,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl User {
    pub fn new(full_name: impl Into<String>, birth_date: Date) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            birth_date,
            email: None,
            phone: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("full_name", &self.full_name)
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: Date) -> i32 {
        age_on(self.birth_date, today)
    }
}

/// Student record linked to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    /// Human-facing identifier; unique across all students.
    pub registration_number: String,
    pub status: StudentStatus,
    /// Soft-delete tombstone, epoch milliseconds.
    pub deleted_at: Option<i64>,
}

impl Student {
    /// Creates an active student for an existing user.
    pub fn new(user_id: UserId, registration_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            registration_number: registration_number.into(),
            status: StudentStatus::Active,
            deleted_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("registration_number", &self.registration_number)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Student joined with its user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student: Student,
    pub user: User,
}

impl StudentProfile {
    /// Creates an active student linked to `user`.
    pub fn new(user: User, registration_number: impl Into<String>) -> Self {
        Self {
            student: Student::new(user.id, registration_number),
            user,
        }
    }
}

/// Whole years between `birth_date` and `today`.
///
/// The year difference is reduced by one while the birthday (month, day)
/// has not yet been reached in `today`'s year. A 29 February birthday is
/// reached on 1 March in common years.
pub fn age_on(birth_date: Date, today: Date) -> i32 {
    let mut age = today.year() - birth_date.year();
    let today_md = (u8::from(today.month()), today.day());
    let birth_md = (u8::from(birth_date.month()), birth_date.day());
    if today_md < birth_md {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::age_on;
    use time::macros::date;

    #[test]
    fn age_counts_birthday_on_the_day() {
        assert_eq!(age_on(date!(2014 - 10 - 18), date!(2026 - 10 - 18)), 12);
    }

    #[test]
    fn age_waits_for_birthday_later_in_year() {
        assert_eq!(age_on(date!(2014 - 10 - 19), date!(2026 - 10 - 18)), 11);
        assert_eq!(age_on(date!(2014 - 12 - 31), date!(2026 - 01 - 01)), 11);
    }

    #[test]
    fn leap_day_birthday_turns_over_in_march_of_common_years() {
        assert_eq!(age_on(date!(2012 - 02 - 29), date!(2025 - 02 - 28)), 12);
        assert_eq!(age_on(date!(2012 - 02 - 29), date!(2025 - 03 - 01)), 13);
        assert_eq!(age_on(date!(2012 - 02 - 29), date!(2024 - 02 - 29)), 12);
    }
}
