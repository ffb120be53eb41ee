//! Student course scheduling as a binary integer program.
//!
//! Students' required courses and ranked preferences are turned into assignment
//! variables, hard constraints (mandatory enrollment, section capacity, one course
//! per period) and a weighted objective, handed to a MILP solver, and read back as
//! per-student timetables.
//!
//! Pipeline: [`catalog::Catalog`] + [`students::StudentStore`] ->
//! [`weights::WeightTable`] -> [`model::ModelBuilder`] -> [`solver::SolverBackend`]
//! -> [`interpret::interpret`].

pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod interpret;
pub mod model;
pub mod server;
pub mod solver;
pub mod students;
pub mod weights;

use log::info;
use std::time::Instant;

use crate::catalog::Catalog;
use crate::config::SchedulerConfig;
use crate::data::SchedulingInput;
use crate::error::Result;
use crate::interpret::{ScheduleReport, interpret};
use crate::model::ModelBuilder;
use crate::solver::SolverBackend;
use crate::students::StudentStore;
use crate::weights::WeightTable;

/// Runs one scheduling pass: validate, weigh, build, solve, interpret.
///
/// The input's own `weighting` block takes precedence over the configured one.
pub fn schedule(
    input: SchedulingInput,
    config: &SchedulerConfig,
    backend: &dyn SolverBackend,
) -> Result<ScheduleReport> {
    schedule_until(input, config, backend, None)
}

/// Like [`schedule`], but the solver is told to stop by `deadline`.
pub fn schedule_until(
    input: SchedulingInput,
    config: &SchedulerConfig,
    backend: &dyn SolverBackend,
    deadline: Option<Instant>,
) -> Result<ScheduleReport> {
    let start_time = Instant::now();
    let weighting = input.weighting.unwrap_or(config.weighting);
    weighting.validate()?;

    let catalog = Catalog::from_input(&input.catalog, &input.students)?;
    let store = StudentStore::new(&catalog, input.students)?;
    let weights = WeightTable::compute(&catalog, &store, &weighting)?;
    let problem = ModelBuilder::new(&catalog, &store, &weights, weighting.multi_slot).build();

    info!("Submitting model to the {} backend", backend.name());
    let budget = deadline.map(|d| d.saturating_duration_since(Instant::now()));
    let outcome = backend.submit(&problem, budget);
    let report = interpret(&problem, &store, &catalog, outcome)?;
    info!("Scheduling run finished in {:.2?}", start_time.elapsed());
    Ok(report)
}
