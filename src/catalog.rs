use std::collections::HashMap;

use itertools::Itertools;
use log::{info, trace};

use crate::data::{CatalogInput, Course, CourseId, GradeLevel, SlotId, Student};
use crate::error::IntegrityError;

/// Weight used when a course has no entry for a grade.
pub const DEFAULT_GRADE_WEIGHT: f64 = 1.0;

/// Dense index of a course in the catalog.
pub type CourseIdx = usize;
/// Dense index of a period in the enumeration.
pub type SlotIdx = usize;

/// Immutable course catalog with dense course and period indices.
#[derive(Debug, Clone)]
pub struct Catalog {
    courses: Vec<Course>,
    course_index: HashMap<CourseId, CourseIdx>,
    time_slots: Vec<SlotId>,
    slot_index: HashMap<SlotId, SlotIdx>,
    grades: Vec<GradeLevel>,
    course_slots: Vec<Vec<SlotIdx>>,
    slot_courses: Vec<Vec<CourseIdx>>,
    // offering id of each course's first slot; offerings are (course, slot) pairs
    offering_offsets: Vec<usize>,
}

impl Catalog {
    /// Validates and indexes the catalog.
    pub fn new(
        courses: Vec<Course>,
        time_slots: Vec<SlotId>,
        grades: Vec<GradeLevel>,
    ) -> Result<Self, IntegrityError> {
        let mut slot_index = HashMap::with_capacity(time_slots.len());
        for (idx, slot) in time_slots.iter().enumerate() {
            if slot_index.insert(slot.clone(), idx).is_some() {
                return Err(IntegrityError::DuplicateSlot(slot.clone()));
            }
        }
        if let Some(grade) = grades.iter().duplicates().next() {
            return Err(IntegrityError::DuplicateGrade(grade.clone()));
        }

        let mut course_index = HashMap::with_capacity(courses.len());
        let mut course_slots = Vec::with_capacity(courses.len());
        let mut slot_courses = vec![Vec::new(); time_slots.len()];
        let mut offering_offsets = Vec::with_capacity(courses.len());
        let mut offerings = 0;

        for (idx, course) in courses.iter().enumerate() {
            if course_index.insert(course.id.clone(), idx).is_some() {
                return Err(IntegrityError::DuplicateCourse(course.id.clone()));
            }
            if course.time_slots.is_empty() {
                return Err(IntegrityError::EmptyCourse(course.id.clone()));
            }
            if course.capacity == 0 {
                return Err(IntegrityError::InvalidCapacity {
                    course: course.id.clone(),
                });
            }
            if let Some(grade) = course.grade_weight.keys().find(|g| !grades.contains(g)) {
                return Err(IntegrityError::UnknownWeightGrade {
                    course: course.id.clone(),
                    grade: grade.clone(),
                });
            }
            if let Some((grade, weight)) = course
                .grade_weight
                .iter()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(IntegrityError::InvalidWeight {
                    course: course.id.clone(),
                    grade: grade.clone(),
                    weight: *weight,
                });
            }

            let mut slots = Vec::with_capacity(course.time_slots.len());
            for slot in &course.time_slots {
                let slot_idx = *slot_index.get(slot).ok_or_else(|| IntegrityError::UnknownSlot {
                    course: course.id.clone(),
                    slot: slot.clone(),
                })?;
                if slots.contains(&slot_idx) {
                    return Err(IntegrityError::RepeatedSlot {
                        course: course.id.clone(),
                        slot: slot.clone(),
                    });
                }
                slots.push(slot_idx);
                slot_courses[slot_idx].push(idx);
            }

            offering_offsets.push(offerings);
            offerings += slots.len();
            course_slots.push(slots);
        }

        trace!(
            "Indexed {} courses over {} periods ({} offerings)",
            courses.len(),
            time_slots.len(),
            offerings
        );

        Ok(Self {
            courses,
            course_index,
            time_slots,
            slot_index,
            grades,
            course_slots,
            slot_courses,
            offering_offsets,
        })
    }

    /// Builds the catalog from wire input, deriving omitted enumerations.
    ///
    /// Missing periods are taken from the courses in first-seen order; missing grades
    /// from the grade-weight tables and then from the students.
    /// Without a grade list every student grade is accepted, so a misspelt grade
    /// silently gets the default weight.
    pub fn from_input(input: &CatalogInput, students: &[Student]) -> Result<Self, IntegrityError> {
        let time_slots = if input.time_slots.is_empty() {
            input
                .courses
                .iter()
                .flat_map(|c| c.time_slots.iter().cloned())
                .unique()
                .collect()
        } else {
            input.time_slots.clone()
        };
        let grades = if input.grades.is_empty() {
            input
                .courses
                .iter()
                .flat_map(|c| c.grade_weight.keys().cloned())
                .chain(students.iter().map(|s| s.grade_level.clone()))
                .unique()
                .collect()
        } else {
            input.grades.clone()
        };

        info!(
            "Loading catalog with {} courses, {} periods and {} grades...",
            input.courses.len(),
            time_slots.len(),
            grades.len()
        );
        Self::new(input.courses.clone(), time_slots, grades)
    }

    pub fn lookup(&self, course_id: &str) -> Option<&Course> {
        self.index_of(course_id).map(|idx| &self.courses[idx])
    }

    pub fn index_of(&self, course_id: &str) -> Option<CourseIdx> {
        self.course_index.get(course_id).copied()
    }

    pub fn course(&self, idx: CourseIdx) -> &Course {
        &self.courses[idx]
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn num_courses(&self) -> usize {
        self.courses.len()
    }

    /// The full period enumeration.
    pub fn time_slots(&self) -> &[SlotId] {
        &self.time_slots
    }

    pub fn slot(&self, idx: SlotIdx) -> &SlotId {
        &self.time_slots[idx]
    }

    pub fn slot_index(&self, slot: &str) -> Option<SlotIdx> {
        self.slot_index.get(slot).copied()
    }

    /// Periods occupied by at least one course, in enumeration order.
    pub fn slots_in_use(&self) -> impl Iterator<Item = &SlotId> {
        self.time_slots
            .iter()
            .zip(&self.slot_courses)
            .filter(|(_, courses)| !courses.is_empty())
            .map(|(slot, _)| slot)
    }

    pub fn grades(&self) -> &[GradeLevel] {
        &self.grades
    }

    pub fn has_grade(&self, grade: &str) -> bool {
        self.grades.iter().any(|g| g == grade)
    }

    /// Periods occupied by a course, in the course's own order.
    pub fn course_slots(&self, course: CourseIdx) -> &[SlotIdx] {
        &self.course_slots[course]
    }

    /// Courses meeting during a period, in catalog order.
    pub fn courses_at(&self, slot: SlotIdx) -> &[CourseIdx] {
        &self.slot_courses[slot]
    }

    /// Dense id of the `nth` period of a course, unique across the catalog.
    pub fn offering(&self, course: CourseIdx, nth: usize) -> usize {
        self.offering_offsets[course] + nth
    }

    pub fn num_offerings(&self) -> usize {
        self.course_slots.iter().map(Vec::len).sum()
    }

    pub fn grade_weight(&self, course: CourseIdx, grade: &str) -> f64 {
        match self.courses[course].grade_weight.get(grade) {
            Some(weight) => *weight,
            None => {
                trace!(
                    "Course {} has no weight for grade {}, using {}",
                    self.courses[course].id,
                    grade,
                    DEFAULT_GRADE_WEIGHT
                );
                DEFAULT_GRADE_WEIGHT
            }
        }
    }
}
