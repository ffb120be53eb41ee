use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use log::{info, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::catalog::{Catalog, CourseIdx, SlotIdx};
use crate::data::{CourseId, SlotId, StudentId};
use crate::students::StudentStore;
use crate::weights::{MultiSlotPolicy, WeightTable};

pub type VarId = usize;

const TOLERANCE: f64 = 1e-6;

/// Identity of one assignment variable. `student` indexes the student store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssignmentKey {
    pub student: usize,
    pub course: CourseIdx,
    pub slot: SlotIdx,
}

/// Which rule a constraint encodes and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintFamily {
    MandatoryEnrollment { student: StudentId, course: CourseId },
    Capacity { course: CourseId, slot: SlotId },
    SlotExclusivity { student: StudentId, slot: SlotId },
    BlockLink { student: StudentId, course: CourseId, slot: SlotId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
}

/// sum(coef * x) <cmp> rhs
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub family: ConstraintFamily,
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    fn sum_of(
        family: ConstraintFamily,
        vars: impl IntoIterator<Item = VarId>,
        cmp: Comparison,
        rhs: f64,
    ) -> Self {
        Self {
            family,
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            cmp,
            rhs,
        }
    }

    pub fn lhs(&self, values: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|(v, _)| values[*v])
            .map(|(_, coef)| coef)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let lhs = self.lhs(values);
        match self.cmp {
            Comparison::Eq => (lhs - self.rhs).abs() <= TOLERANCE,
            Comparison::Le => lhs <= self.rhs + TOLERANCE,
        }
    }

    fn shifted(mut self, offset: VarId) -> Self {
        for (v, _) in &mut self.terms {
            *v += offset;
        }
        self
    }
}

/// A complete problem ready for a solver. Owns the variable set for the run.
///
/// x_sct = 1 if student s is enrolled in course c during period t. Variables exist
/// only for courses a student references, one per period the course occupies, and
/// all of a student's variables for one course are contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    keys: Vec<AssignmentKey>,
    objective: Vec<f64>,
    constraints: Vec<LinearConstraint>,
    course_vars: HashMap<(usize, CourseIdx), Range<VarId>>,
    policy: MultiSlotPolicy,
}

impl Problem {
    pub fn num_variables(&self) -> usize {
        self.keys.len()
    }

    pub fn variables(&self) -> &[AssignmentKey] {
        &self.keys
    }

    pub fn key(&self, var: VarId) -> AssignmentKey {
        self.keys[var]
    }

    /// Objective coefficient of every variable, indexed by [`VarId`].
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn policy(&self) -> MultiSlotPolicy {
        self.policy
    }

    /// Variables of one student's course, one per period in course order.
    pub fn course_vars(&self, student: usize, course: CourseIdx) -> Option<Range<VarId>> {
        self.course_vars.get(&(student, course)).cloned()
    }

    pub fn var(&self, student: usize, course: CourseIdx, slot: SlotIdx) -> Option<VarId> {
        self.course_vars(student, course)?
            .find(|&v| self.keys[v].slot == slot)
    }

    /// Objective value of an assignment.
    pub fn evaluate(&self, values: &[bool]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .filter(|(_, on)| **on)
            .map(|(w, _)| w)
            .sum()
    }

    /// Constraints broken by an assignment.
    pub fn violations<'a>(
        &'a self,
        values: &'a [bool],
    ) -> impl Iterator<Item = &'a LinearConstraint> + 'a {
        self.constraints.iter().filter(move |c| !c.is_satisfied(values))
    }
}

/// Variables and per-student constraints of one student, with local ids.
struct Fragment {
    keys: Vec<AssignmentKey>,
    offerings: Vec<usize>,
    objective: Vec<f64>,
    constraints: Vec<LinearConstraint>,
    course_vars: Vec<(CourseIdx, Range<VarId>)>,
}

pub struct ModelBuilder<'a> {
    catalog: &'a Catalog,
    store: &'a StudentStore,
    weights: &'a WeightTable,
    policy: MultiSlotPolicy,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        store: &'a StudentStore,
        weights: &'a WeightTable,
        policy: MultiSlotPolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            weights,
            policy,
        }
    }

    pub fn build(&self) -> Problem {
        info!(
            "Building assignment model for {} students over {} courses...",
            self.store.len(),
            self.catalog.num_courses()
        );

        let fragments = self.fragments();

        let total: usize = fragments.iter().map(|f| f.keys.len()).sum();
        let mut keys = Vec::with_capacity(total);
        let mut objective = Vec::with_capacity(total);
        let mut constraints = Vec::new();
        let mut course_vars = HashMap::new();
        let mut offering_vars: Vec<Vec<VarId>> = vec![Vec::new(); self.catalog.num_offerings()];

        for (student, fragment) in fragments.into_iter().enumerate() {
            let offset = keys.len();
            for (local, offering) in fragment.offerings.iter().enumerate() {
                offering_vars[*offering].push(offset + local);
            }
            for (course, range) in fragment.course_vars {
                course_vars.insert((student, course), range.start + offset..range.end + offset);
            }
            keys.extend(fragment.keys);
            objective.extend(fragment.objective);
            constraints.extend(fragment.constraints.into_iter().map(|c| c.shifted(offset)));
        }
        let per_student = constraints.len();

        // a seat count at or under capacity cannot bind
        let mut skipped = 0;
        for (course_idx, course) in self.catalog.courses().iter().enumerate() {
            for (nth, &slot) in self.catalog.course_slots(course_idx).iter().enumerate() {
                let vars = &offering_vars[self.catalog.offering(course_idx, nth)];
                if vars.len() <= course.capacity as usize {
                    skipped += 1;
                    continue;
                }
                constraints.push(LinearConstraint::sum_of(
                    ConstraintFamily::Capacity {
                        course: course.id.clone(),
                        slot: self.catalog.slot(slot).clone(),
                    },
                    vars.iter().copied(),
                    Comparison::Le,
                    course.capacity as f64,
                ));
            }
        }
        trace!(
            "Added {} capacity constraints, {} offerings cannot exceed capacity",
            constraints.len() - per_student,
            skipped
        );
        info!(
            "Model has {} variables and {} constraints",
            keys.len(),
            constraints.len()
        );

        Problem {
            keys,
            objective,
            constraints,
            course_vars,
            policy: self.policy,
        }
    }

    #[cfg(feature = "parallel")]
    fn fragments(&self) -> Vec<Fragment> {
        (0..self.store.len())
            .into_par_iter()
            .map(|s| self.student_fragment(s))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn fragments(&self) -> Vec<Fragment> {
        (0..self.store.len())
            .map(|s| self.student_fragment(s))
            .collect()
    }

    fn student_fragment(&self, student: usize) -> Fragment {
        let profile = self.store.get(student);
        let entries = self.weights.entries(student);

        let mut fragment = Fragment {
            keys: Vec::new(),
            offerings: Vec::new(),
            objective: Vec::new(),
            constraints: Vec::new(),
            course_vars: Vec::with_capacity(entries.len()),
        };
        let mut by_slot: BTreeMap<SlotIdx, Vec<VarId>> = BTreeMap::new();

        for entry in entries {
            let course = entry.course;
            let slots = self.catalog.course_slots(course);
            let first = fragment.keys.len();

            for (nth, &slot) in slots.iter().enumerate() {
                let var = fragment.keys.len();
                fragment.keys.push(AssignmentKey {
                    student,
                    course,
                    slot,
                });
                fragment.offerings.push(self.catalog.offering(course, nth));
                fragment.objective.push(entry.weight);
                by_slot.entry(slot).or_default().push(var);
            }
            let range = first..fragment.keys.len();
            let course_id = &self.catalog.course(course).id;

            if profile.is_required(course) {
                let units = match self.policy {
                    MultiSlotPolicy::AnySlot => 1.0,
                    MultiSlotPolicy::AllSlots => slots.len() as f64,
                };
                fragment.constraints.push(LinearConstraint::sum_of(
                    ConstraintFamily::MandatoryEnrollment {
                        student: profile.id(),
                        course: course_id.clone(),
                    },
                    range.clone(),
                    Comparison::Eq,
                    units,
                ));
            }

            if self.policy == MultiSlotPolicy::AllSlots {
                for (var, &slot) in range.clone().zip(slots).skip(1) {
                    fragment.constraints.push(LinearConstraint {
                        family: ConstraintFamily::BlockLink {
                            student: profile.id(),
                            course: course_id.clone(),
                            slot: self.catalog.slot(slot).clone(),
                        },
                        terms: vec![(var, 1.0), (first, -1.0)],
                        cmp: Comparison::Eq,
                        rhs: 0.0,
                    });
                }
            }

            fragment.course_vars.push((course, range));
        }

        // a single course in a period cannot clash
        for (slot, vars) in by_slot {
            if vars.len() > 1 {
                fragment.constraints.push(LinearConstraint::sum_of(
                    ConstraintFamily::SlotExclusivity {
                        student: profile.id(),
                        slot: self.catalog.slot(slot).clone(),
                    },
                    vars,
                    Comparison::Le,
                    1.0,
                ));
            }
        }

        fragment
    }
}
