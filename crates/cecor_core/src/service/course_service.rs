//! Course catalogue use-cases.

use crate::model::course::{Course, CourseClass, CourseId};
use crate::repo::course_repo::{CourseListQuery, CourseRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from course use-cases.
#[derive(Debug)]
pub enum CourseServiceError {
    CourseNotFound(CourseId),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for CourseServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent course state: {details}"),
        }
    }
}

impl Error for CourseServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CourseServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "course",
                id,
            } => Self::CourseNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Course service facade over repository implementations.
pub struct CourseService<R: CourseRepository> {
    repo: R,
}

impl<R: CourseRepository> CourseService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a course and its default class.
    pub fn create_course(&self, course: &Course) -> Result<Course, CourseServiceError> {
        let course_id = self.repo.create_course(course)?;
        info!("event=course_create module=course status=ok course_id={course_id}");
        self.repo
            .get_course(course_id)?
            .ok_or(CourseServiceError::InconsistentState(
                "created course not found in read-back",
            ))
    }

    pub fn get_course(&self, id: CourseId) -> RepoResult<Option<Course>> {
        self.repo.get_course(id)
    }

    pub fn list_courses(&self, query: &CourseListQuery) -> RepoResult<Vec<Course>> {
        self.repo.list_courses(query)
    }

    /// Replaces all course fields, schedule included.
    ///
    /// Existing enrollments are not re-checked for conflicts against the
    /// new schedule.
    pub fn update_course(&self, course: &Course) -> Result<Course, CourseServiceError> {
        self.repo.update_course(course)?;
        self.repo
            .get_course(course.id)?
            .ok_or(CourseServiceError::InconsistentState(
                "updated course not found in read-back",
            ))
    }

    /// Adds a non-default class to an existing course.
    pub fn add_class(
        &self,
        course_id: CourseId,
        name: impl Into<String>,
    ) -> Result<CourseClass, CourseServiceError> {
        let name: String = name.into();
        let class = CourseClass::new(course_id, name.trim());
        self.repo.create_class(&class)?;
        Ok(class)
    }

    pub fn list_classes(&self, course_id: CourseId) -> RepoResult<Vec<CourseClass>> {
        self.repo.list_classes(course_id)
    }
}
