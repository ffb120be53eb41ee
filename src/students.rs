use std::collections::HashSet;

use log::{debug, info};

use crate::catalog::{Catalog, CourseIdx};
use crate::data::{Student, StudentId};
use crate::error::IntegrityError;

/// A primary choice resolved to catalog indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChoice {
    pub primary: CourseIdx,
    pub backups: Vec<CourseIdx>,
}

/// A validated student with course references resolved.
#[derive(Debug, Clone)]
pub struct Profile {
    pub student: Student,
    pub required: Vec<CourseIdx>,
    pub choices: Vec<ResolvedChoice>,
    /// Required, then primary, then backup courses, de-duplicated in first-seen order.
    pub referenced: Vec<CourseIdx>,
}

impl Profile {
    pub fn id(&self) -> StudentId {
        self.student.id
    }

    pub fn grade(&self) -> &str {
        &self.student.grade_level
    }

    pub fn is_required(&self, course: CourseIdx) -> bool {
        self.required.contains(&course)
    }

    pub fn is_primary(&self, course: CourseIdx) -> bool {
        self.choices.iter().any(|c| c.primary == course)
    }

    pub fn is_backup(&self, course: CourseIdx) -> bool {
        self.choices.iter().any(|c| c.backups.contains(&course))
    }
}

/// Students validated against the catalog, read-only after construction.
#[derive(Debug, Clone)]
pub struct StudentStore {
    profiles: Vec<Profile>,
}

impl StudentStore {
    pub fn new(catalog: &Catalog, students: Vec<Student>) -> Result<Self, IntegrityError> {
        let mut seen = HashSet::with_capacity(students.len());
        let mut profiles = Vec::with_capacity(students.len());

        for student in students {
            if !seen.insert(student.id) {
                return Err(IntegrityError::DuplicateStudent(student.id));
            }
            if !catalog.has_grade(&student.grade_level) {
                return Err(IntegrityError::UnknownGrade {
                    student: student.id,
                    grade: student.grade_level.clone(),
                });
            }

            let resolve = |course: &String| {
                catalog
                    .index_of(course)
                    .ok_or_else(|| IntegrityError::UnknownCourse {
                        student: student.id,
                        course: course.clone(),
                    })
            };

            let required = student
                .required_courses
                .iter()
                .map(resolve)
                .collect::<Result<Vec<_>, _>>()?;
            let choices = student
                .preferences
                .iter()
                .map(|choice| -> Result<ResolvedChoice, IntegrityError> {
                    Ok(ResolvedChoice {
                        primary: resolve(&choice.course)?,
                        backups: choice
                            .backups
                            .iter()
                            .map(resolve)
                            .collect::<Result<Vec<_>, _>>()?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut referenced = Vec::new();
            let all = required
                .iter()
                .chain(choices.iter().map(|c| &c.primary))
                .chain(choices.iter().flat_map(|c| c.backups.iter()));
            for &course in all {
                if !referenced.contains(&course) {
                    referenced.push(course);
                }
            }

            debug!(
                "Student {} ({}): {} required, {} primary choices, {} courses referenced",
                student.id,
                student.grade_level,
                required.len(),
                choices.len(),
                referenced.len()
            );

            profiles.push(Profile {
                student,
                required,
                choices,
                referenced,
            });
        }

        info!("Loaded {} student profiles", profiles.len());
        Ok(Self { profiles })
    }

    pub fn students(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get(&self, idx: usize) -> &Profile {
        &self.profiles[idx]
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Courses a student could be assigned to, de-duplicated.
    pub fn referenced_courses(&self, idx: usize) -> &[CourseIdx] {
        &self.profiles[idx].referenced
    }
}
