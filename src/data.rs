use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::weights::WeightConfig;

// Type aliases for clarity
pub type CourseId = String;
pub type SlotId = String;
pub type GradeLevel = String;
pub type StudentId = u32;

/// A course offering with fixed meeting periods.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    /// Periods the offering occupies, in order. A two-period block lists both.
    pub time_slots: Vec<SlotId>,
    /// Max students enrolled per occupied period.
    pub capacity: u32,
    /// Base desirability per grade; missing grades count as 1.
    #[serde(default)]
    pub grade_weight: BTreeMap<GradeLevel, f64>,
}

/// A primary course choice and its ordered fallbacks.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryChoice {
    pub course: CourseId,
    #[serde(default)]
    pub backups: Vec<CourseId>,
}

impl PrimaryChoice {
    pub fn new(course: impl Into<CourseId>) -> Self {
        Self {
            course: course.into(),
            backups: Vec::new(),
        }
    }

    pub fn with_backups(mut self, backups: impl IntoIterator<Item = impl Into<CourseId>>) -> Self {
        self.backups.extend(backups.into_iter().map(Into::into));
        self
    }
}

/// A student's grade, mandatory courses and ranked preferences.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub grade_level: GradeLevel,
    #[serde(default)]
    pub required_courses: Vec<CourseId>,
    #[serde(default)]
    pub preferences: Vec<PrimaryChoice>,
}

impl Student {
    pub fn new(id: StudentId, grade_level: impl Into<GradeLevel>) -> Self {
        Self {
            id,
            grade_level: grade_level.into(),
            required_courses: Vec::new(),
            preferences: Vec::new(),
        }
    }

    pub fn requiring(mut self, courses: impl IntoIterator<Item = impl Into<CourseId>>) -> Self {
        self.required_courses
            .extend(courses.into_iter().map(Into::into));
        self
    }

    pub fn preferring(mut self, choice: PrimaryChoice) -> Self {
        self.preferences.push(choice);
        self
    }
}

/// Course catalog as received from the caller.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogInput {
    pub courses: Vec<Course>,
    /// Period enumeration. Derived from the courses when empty.
    #[serde(default)]
    pub time_slots: Vec<SlotId>,
    /// Grade enumeration. Derived from weights and students when empty.
    #[serde(default)]
    pub grades: Vec<GradeLevel>,
}

/// The complete input for one scheduling run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub catalog: CatalogInput,
    pub students: Vec<Student>,
    /// Per-run override of the configured weighting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighting: Option<WeightConfig>,
}

/// Outcome quality reported by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Feasible => write!(f, "FEASIBLE"),
        }
    }
}

/// A single (course, period) seat held by a student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub course_id: CourseId,
    pub time_slot: SlotId,
}

/// A primary choice the student did not get.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetPreference {
    pub course_id: CourseId,
    /// First backup of this choice that was granted instead, if any.
    pub granted_backup: Option<CourseId>,
}

impl fmt::Display for UnmetPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.granted_backup {
            Some(backup) => write!(f, "{} not granted, backup {} granted", self.course_id, backup),
            None => write!(f, "{} not granted, no backup available", self.course_id),
        }
    }
}

/// Final timetable of one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSchedule {
    pub student_id: StudentId,
    pub grade_level: GradeLevel,
    pub enrollments: Vec<Enrollment>,
    pub unmet_preferences: Vec<UnmetPreference>,
}

/// The final output of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub success: bool,
    pub status: SolveStatus,
    pub objective_value: f64,
    pub schedules: Vec<StudentSchedule>,
}

/// Body reported when a run fails as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureOutput {
    pub success: bool,
    pub kind: String,
    pub error: String,
}
