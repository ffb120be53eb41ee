use itertools::Itertools;
use log::{debug, info, warn};

use crate::catalog::{Catalog, CourseIdx};
use crate::data::{
    Enrollment, SchedulingOutput, SolveStatus, StudentId, StudentSchedule, UnmetPreference,
};
use crate::error::ScheduleError;
use crate::model::Problem;
use crate::solver::SolverOutcome;
use crate::students::StudentStore;
use crate::weights::MultiSlotPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleReport {
    pub status: SolveStatus,
    pub objective_value: f64,
    pub schedules: Vec<StudentSchedule>,
}

impl ScheduleReport {
    pub fn schedule_of(&self, student_id: StudentId) -> Option<&StudentSchedule> {
        self.schedules.iter().find(|s| s.student_id == student_id)
    }

    pub fn into_output(self) -> SchedulingOutput {
        SchedulingOutput {
            success: true,
            status: self.status,
            objective_value: self.objective_value,
            schedules: self.schedules,
        }
    }
}

pub fn interpret(
    problem: &Problem,
    store: &StudentStore,
    catalog: &Catalog,
    outcome: SolverOutcome,
) -> Result<ScheduleReport, ScheduleError> {
    let (status, values, objective_value) = match outcome {
        SolverOutcome::Solved {
            status,
            values,
            objective_value,
        } => (status, values, objective_value),
        SolverOutcome::Infeasible => {
            return Err(ScheduleError::Infeasible(diagnose_infeasibility(
                problem, store, catalog,
            )));
        }
        SolverOutcome::Error(msg) => return Err(ScheduleError::solver(msg)),
    };

    if values.len() != problem.num_variables() {
        return Err(ScheduleError::solver(format!(
            "solver returned {} values for {} variables",
            values.len(),
            problem.num_variables()
        )));
    }
    if let Some(broken) = problem.violations(&values).next() {
        return Err(ScheduleError::solver(format!(
            "solver returned an assignment violating {:?}",
            broken.family
        )));
    }

    let realized = problem.evaluate(&values);
    if (realized - objective_value).abs() > 1e-6 * realized.abs().max(1.0) {
        warn!(
            "Solver reported objective {} but the assignment scores {}",
            objective_value, realized
        );
    }

    let granted = |student: usize, course: CourseIdx| -> bool {
        let Some(mut vars) = problem.course_vars(student, course) else {
            return false;
        };
        match problem.policy() {
            MultiSlotPolicy::AnySlot => vars.any(|v| values[v]),
            MultiSlotPolicy::AllSlots => vars.all(|v| values[v]),
        }
    };

    let schedules: Vec<StudentSchedule> = store
        .students()
        .iter()
        .enumerate()
        .map(|(student, profile)| {
            // catalog order, then the course's own period order
            let enrollments: Vec<Enrollment> = profile
                .referenced
                .iter()
                .sorted()
                .filter_map(|&course| problem.course_vars(student, course))
                .flatten()
                .filter(|&var| values[var])
                .map(|var| {
                    let key = problem.key(var);
                    Enrollment {
                        course_id: catalog.course(key.course).id.clone(),
                        time_slot: catalog.slot(key.slot).clone(),
                    }
                })
                .collect();

            let unmet_preferences: Vec<UnmetPreference> = profile
                .choices
                .iter()
                .filter(|choice| !granted(student, choice.primary))
                .map(|choice| UnmetPreference {
                    course_id: catalog.course(choice.primary).id.clone(),
                    granted_backup: choice
                        .backups
                        .iter()
                        .find(|&&b| granted(student, b))
                        .map(|&b| catalog.course(b).id.clone()),
                })
                .collect();

            debug!(
                "Student {}: {} periods scheduled, {} primary choices unmet",
                profile.id(),
                enrollments.len(),
                unmet_preferences.len()
            );

            StudentSchedule {
                student_id: profile.id(),
                grade_level: profile.grade().to_string(),
                enrollments,
                unmet_preferences,
            }
        })
        .collect();

    info!(
        "{} schedule for {} students, objective value {}",
        status,
        schedules.len(),
        objective_value
    );

    Ok(ScheduleReport {
        status,
        objective_value,
        schedules,
    })
}

/// Explains an infeasible run by the courses whose required demand exceeds their seats.
fn diagnose_infeasibility(problem: &Problem, store: &StudentStore, catalog: &Catalog) -> String {
    let demand = store
        .students()
        .iter()
        .flat_map(|p| p.required.iter().copied())
        .counts();

    let overloaded: Vec<String> = (0..catalog.num_courses())
        .filter_map(|course| {
            let required = *demand.get(&course)?;
            let c = catalog.course(course);
            let seats = match problem.policy() {
                MultiSlotPolicy::AnySlot => c.capacity as usize * c.time_slots.len(),
                MultiSlotPolicy::AllSlots => c.capacity as usize,
            };
            (required > seats).then(|| {
                format!(
                    "course '{}' is required by {} students but seats {}",
                    c.id, required, seats
                )
            })
        })
        .collect();

    if overloaded.is_empty() {
        "required courses cannot be placed without period clashes or exceeding capacity"
            .to_string()
    } else {
        overloaded.join("; ")
    }
}
