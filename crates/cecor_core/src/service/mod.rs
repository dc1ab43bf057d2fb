//! Use-case services over the repository layer.
//!
//! # Responsibility
//! - Enforce cross-aggregate rules (admission) above storage.
//! - Keep callers decoupled from SQL and row decoding.

pub mod course_service;
pub mod enrollment_service;
pub mod student_service;
