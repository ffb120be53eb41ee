use thiserror::Error;

use crate::data::{CourseId, FailureOutput, GradeLevel, SlotId, StudentId};

/// Inconsistent catalog or student data. Fatal for the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("course '{0}' is defined more than once")]
    DuplicateCourse(CourseId),

    #[error("course '{0}' occupies no time slots")]
    EmptyCourse(CourseId),

    #[error("course '{course}' must have a capacity of at least 1")]
    InvalidCapacity { course: CourseId },

    #[error("course '{course}' references time slot '{slot}' which is not in the period enumeration")]
    UnknownSlot { course: CourseId, slot: SlotId },

    #[error("course '{course}' lists time slot '{slot}' more than once")]
    RepeatedSlot { course: CourseId, slot: SlotId },

    #[error("time slot '{0}' appears more than once in the period enumeration")]
    DuplicateSlot(SlotId),

    #[error("grade '{0}' appears more than once in the grade enumeration")]
    DuplicateGrade(GradeLevel),

    #[error("course '{course}' has a grade weight for unknown grade '{grade}'")]
    UnknownWeightGrade { course: CourseId, grade: GradeLevel },

    #[error("course '{course}' has an invalid weight {weight} for grade '{grade}'")]
    InvalidWeight {
        course: CourseId,
        grade: GradeLevel,
        weight: f64,
    },

    #[error("student {0} is defined more than once")]
    DuplicateStudent(StudentId),

    #[error("student {student} has unknown grade level '{grade}'")]
    UnknownGrade { student: StudentId, grade: GradeLevel },

    #[error("student {student} references unknown course '{course}'")]
    UnknownCourse { student: StudentId, course: CourseId },
}

/// Main error type for a scheduling run.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("data integrity error: {0}")]
    DataIntegrity(#[from] IntegrityError),

    /// The constraint system has no satisfying assignment.
    #[error("no feasible schedule exists: {0}")]
    Infeasible(String),

    /// The solver could not decide feasibility (unreachable, crashed, timed out).
    #[error("solver unavailable: {0}")]
    SolverUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScheduleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn solver(msg: impl Into<String>) -> Self {
        Self::SolverUnavailable(msg.into())
    }

    /// Short machine-readable tag used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataIntegrity(_) => "data_integrity",
            Self::Infeasible(_) => "infeasible",
            Self::SolverUnavailable(_) => "solver_unavailable",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

impl From<&ScheduleError> for FailureOutput {
    fn from(err: &ScheduleError) -> Self {
        FailureOutput {
            success: false,
            kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
