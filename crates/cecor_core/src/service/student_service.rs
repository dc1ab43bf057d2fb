//! Student registration and lifecycle use-cases.
//!
//! # Invariants
//! - Registration numbers are unique, checked before writing and enforced
//!   again by storage.
//! - Withdrawal is a soft delete; the student row stays for history.

use crate::model::student::{Student, StudentId, StudentProfile, StudentStatus, User};
use crate::repo::student_repo::{StudentListQuery, StudentRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;

/// Input for registering a new student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterStudentRequest {
    pub full_name: String,
    pub birth_date: Date,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub registration_number: String,
}

/// Errors from student use-cases.
#[derive(Debug)]
pub enum StudentServiceError {
    DuplicateRegistrationNumber(String),
    StudentNotFound(StudentId),
    Repo(RepoError),
    /// A write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for StudentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateRegistrationNumber(value) => {
                write!(f, "registration number already in use: `{value}`")
            }
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent student state: {details}"),
        }
    }
}

impl Error for StudentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StudentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "student",
                id,
            } => Self::StudentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Student service facade over repository implementations.
pub struct StudentService<R: StudentRepository> {
    repo: R,
}

impl<R: StudentRepository> StudentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates the user and student rows for a new active student.
    pub fn register_student(
        &self,
        request: &RegisterStudentRequest,
    ) -> Result<StudentProfile, StudentServiceError> {
        let registration_number = request.registration_number.trim();
        if self
            .repo
            .find_by_registration_number(registration_number)?
            .is_some()
        {
            return Err(StudentServiceError::DuplicateRegistrationNumber(
                registration_number.to_string(),
            ));
        }

        let mut user = User::new(request.full_name.trim(), request.birth_date);
        user.email = request.email.clone();
        user.phone = request.phone.clone();
        let profile = StudentProfile::new(user, registration_number);

        let student_id = match self.repo.create_profile(&profile) {
            Ok(id) => id,
            Err(RepoError::UniqueViolation(columns))
                if columns == "students.registration_number" =>
            {
                return Err(StudentServiceError::DuplicateRegistrationNumber(
                    registration_number.to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        };
        info!("event=student_register module=student status=ok student_id={student_id}");

        self.repo
            .get_student_profile(student_id)?
            .ok_or(StudentServiceError::InconsistentState(
                "registered student not found in read-back",
            ))
    }

    pub fn get_student(&self, id: StudentId) -> RepoResult<Option<StudentProfile>> {
        self.repo.get_student_profile(id)
    }

    pub fn list_students(&self, query: &StudentListQuery) -> RepoResult<Vec<Student>> {
        self.repo.list_students(query)
    }

    /// Moves a student between `active`, `inactive` and `suspended`.
    pub fn set_status(
        &self,
        id: StudentId,
        status: StudentStatus,
    ) -> Result<Student, StudentServiceError> {
        let mut student = self
            .repo
            .get_student(id, false)?
            .ok_or(StudentServiceError::StudentNotFound(id))?;
        student.status = status;
        self.repo.update_student(&student)?;
        Ok(student)
    }

    /// Soft-deletes a student. Repeated calls keep the first timestamp.
    pub fn withdraw_student(&self, id: StudentId) -> Result<(), StudentServiceError> {
        self.repo.soft_delete_student(id)?;
        info!("event=student_withdraw module=student status=ok student_id={id}");
        Ok(())
    }
}
