use good_lp::solvers::{ResolutionError, SolutionStatus};
use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable, default_solver};
use log::{Level, debug, log_enabled, warn};
use std::collections::HashMap;

use crate::config::SolverSettings;
use crate::data::SolveStatus;
use crate::model::TimetableModel;

/// What a backend hands back for one objective.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// Value of every model variable; present iff the status carries a solution.
    pub values: Option<HashMap<Variable, f64>>,
}

impl BackendSolution {
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            objective_value: None,
            values: None,
        }
    }
}

/// A MILP engine able to minimise one objective over a [`TimetableModel`].
///
/// Implementations must not keep state between calls: lexicographic mode
/// calls `solve` twice on the same (grown) model.
pub trait Backend {
    fn solve(
        &self,
        model: &TimetableModel,
        objective: &Expression,
        settings: &SolverSettings,
    ) -> BackendSolution;
}

/// HiGHS through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

impl Backend for HighsBackend {
    fn solve(
        &self,
        model: &TimetableModel,
        objective: &Expression,
        settings: &SolverSettings,
    ) -> BackendSolution {
        // Re-registering the definitions in order reproduces the same handles.
        let mut problem = ProblemVariables::new();
        for (_, kind) in model.variables() {
            problem.add(kind.definition());
        }

        let mut highs = problem
            .minimise(objective.clone())
            .using(default_solver)
            .set_option("threads", settings.threads as i32)
            .set_option("mip_rel_gap", settings.relative_gap)
            .set_option("log_to_console", log_enabled!(Level::Debug));
        if let Some(limit) = settings.time_limit {
            highs = highs.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(seed) = settings.random_seed {
            highs = highs.set_option("random_seed", (seed % i32::MAX as u64) as i32);
        }
        for row in model.rows() {
            highs.add_constraint(row.to_constraint());
        }

        debug!(
            "Handing {} variables and {} rows to HiGHS.",
            model.variables().len(),
            model.rows().len()
        );
        match highs.solve() {
            Ok(solution) => {
                let status = match solution.status() {
                    SolutionStatus::Optimal => SolveStatus::Optimal,
                    _ => SolveStatus::Feasible,
                };
                let values: HashMap<Variable, f64> = model
                    .variables()
                    .iter()
                    .map(|(v, _)| (*v, solution.value(*v)))
                    .collect();
                BackendSolution {
                    status,
                    objective_value: Some(objective.eval_with(&values)),
                    values: Some(values),
                }
            }
            Err(ResolutionError::Infeasible) => {
                BackendSolution::without_values(SolveStatus::Infeasible)
            }
            Err(e) => {
                warn!("HiGHS returned no solution: {e}");
                BackendSolution::without_values(SolveStatus::Unknown)
            }
        }
    }
}
