use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel,
    constraint, default_solver,
};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::data::SolveStatus;
use crate::model::{Comparison, Problem};

/// What a solver reports back for a submitted problem.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutcome {
    Solved {
        status: SolveStatus,
        /// Value of every variable, indexed by `VarId`.
        values: Vec<bool>,
        objective_value: f64,
    },
    Infeasible,
    Error(String),
}

/// Anything that can take a built problem and return an assignment.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Solves `problem`, giving up after `budget` when one is set.
    fn submit(&self, problem: &Problem, budget: Option<Duration>) -> SolverOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverOptions {
    pub threads: u32,
    pub random_seed: u32,
    /// Stop the search after this many seconds and keep the incumbent.
    pub time_limit_secs: Option<f64>,
    pub log_to_console: bool,
}

impl SolverOptions {
    /// Time limit handed to the solver: the configured one, cut down to `budget`.
    pub fn effective_time_limit(&self, budget: Option<Duration>) -> Option<f64> {
        match (self.time_limit_secs, budget.map(|b| b.as_secs_f64())) {
            (Some(limit), Some(budget)) => Some(limit.min(budget)),
            (limit, budget) => limit.or(budget),
        }
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        // one thread and a fixed seed for reproducibility
        Self {
            threads: 1,
            random_seed: 1234,
            time_limit_secs: None,
            log_to_console: false,
        }
    }
}

/// Solves problems with the HiGHS MILP solver through good_lp.
#[derive(Debug, Clone, Default)]
pub struct HighsBackend {
    options: SolverOptions,
}

impl HighsBackend {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl SolverBackend for HighsBackend {
    fn name(&self) -> &str {
        "highs"
    }

    fn submit(&self, problem: &Problem, budget: Option<Duration>) -> SolverOutcome {
        let start_time = Instant::now();
        if problem.num_variables() == 0 {
            info!("Model has no variables, nothing to solve.");
            return SolverOutcome::Solved {
                status: SolveStatus::Optimal,
                values: Vec::new(),
                objective_value: 0.0,
            };
        }

        let mut vars = ProblemVariables::new();
        let x = vars.add_vector(variable().binary(), problem.num_variables());

        let objective: Expression = problem
            .objective()
            .iter()
            .zip(&x)
            .map(|(weight, var)| *weight * *var)
            .sum();

        let mut model = vars
            .maximise(objective.clone())
            .using(default_solver)
            .set_option("threads", self.options.threads as i32)
            .set_option("random_seed", self.options.random_seed as i32)
            .set_option(
                "log_to_console",
                if self.options.log_to_console { "true" } else { "false" },
            );
        if let Some(limit) = self.options.effective_time_limit(budget) {
            debug!("HiGHS time limit {:.3}s", limit);
            model = model.set_option("time_limit", limit);
        }

        for c in problem.constraints() {
            let lhs: Expression = c.terms.iter().map(|(var, coef)| *coef * x[*var]).sum();
            let rhs = c.rhs;
            match c.cmp {
                Comparison::Eq => model.add_constraint(constraint!(lhs == rhs)),
                Comparison::Le => model.add_constraint(constraint!(lhs <= rhs)),
            };
        }
        trace!(
            "Submitted {} variables and {} constraints to HiGHS",
            problem.num_variables(),
            problem.constraints().len()
        );

        info!("Starting ILP solver...");
        let solution = match model.solve() {
            Ok(s) => s,
            Err(ResolutionError::Infeasible) => {
                info!("HiGHS proved the model infeasible in {:.2?}", start_time.elapsed());
                return SolverOutcome::Infeasible;
            }
            Err(e) => {
                warn!("Solver error: {}", e);
                return SolverOutcome::Error(e.to_string());
            }
        };
        let status = solve_status(solution.status());
        info!("{} solution found in {:.2?}", status, start_time.elapsed());

        SolverOutcome::Solved {
            status,
            values: x.iter().map(|var| solution.value(*var) > 0.5).collect(),
            objective_value: solution.eval(objective),
        }
    }
}

/// A search stopped by a time or gap limit leaves an unproven incumbent.
fn solve_status(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::TimeLimit | SolutionStatus::GapLimit => SolveStatus::Feasible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_proven_optimum_is_optimal() {
        assert_eq!(solve_status(SolutionStatus::Optimal), SolveStatus::Optimal);
        assert_eq!(solve_status(SolutionStatus::TimeLimit), SolveStatus::Feasible);
        assert_eq!(solve_status(SolutionStatus::GapLimit), SolveStatus::Feasible);
    }

    #[test]
    fn budget_caps_the_time_limit() {
        let mut options = SolverOptions::default();
        assert_eq!(options.effective_time_limit(None), None);
        assert_eq!(
            options.effective_time_limit(Some(Duration::from_secs(60))),
            Some(60.0)
        );

        options.time_limit_secs = Some(10.0);
        assert_eq!(options.effective_time_limit(None), Some(10.0));
        assert_eq!(
            options.effective_time_limit(Some(Duration::from_secs(60))),
            Some(10.0)
        );
        assert_eq!(
            options.effective_time_limit(Some(Duration::from_millis(2500))),
            Some(2.5)
        );
    }

    #[test]
    fn default_options_are_reproducible() {
        let options = SolverOptions::default();
        assert_eq!(options.threads, 1);
        assert_eq!(options.random_seed, 1234);
        assert!(options.time_limit_secs.is_none());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SolverOptions = serde_json::from_str(r#"{"timeLimitSecs": 2.5}"#).unwrap();
        assert_eq!(options.time_limit_secs, Some(2.5));
        assert_eq!(options.threads, 1);
    }
}
