use good_lp::Expression;
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::time::Instant;

use crate::backend::{Backend, BackendSolution, HighsBackend};
use crate::config::OptimizationWeights;
use crate::data::{PhaseSummary, SolvePhase, SolveReport, SolveStatus, TimetableInput};
use crate::error::TimetableError;
use crate::extract::{self, Extraction};
use crate::model::{self, Encoding};
use crate::problem::Problem;
use crate::validate::validate;

/// Values off by more than this from an integer or a row bound are not
/// trusted.
const VALUE_TOLERANCE: f64 = 1e-4;

/// solves the timetabling problem using the HiGHS MILP solver.
pub fn solve(
    input: &TimetableInput,
    weights: &OptimizationWeights,
) -> Result<SolveReport, TimetableError> {
    solve_with_backend(input, weights, &HighsBackend)
}

/// Full pipeline: integrity checks, feasibility pre-validation, model
/// construction, one or two solver phases and extraction.
pub fn solve_with_backend(
    input: &TimetableInput,
    weights: &OptimizationWeights,
    backend: &impl Backend,
) -> Result<SolveReport, TimetableError> {
    let start_time = Instant::now();
    weights.validate()?;
    let problem = Problem::from_input(input)?;
    info!(
        "Timetabling {} classes over {} days x {} periods, {} plan entries.",
        problem.class_ids().count(),
        problem.day_count(),
        problem.period_count(),
        problem.requirements().len()
    );

    validate(&problem)?;
    trace!("Pre-validation passed.");

    let encoding = model::build(&problem, weights);
    let report = if weights.use_lexico {
        solve_lexicographic(&problem, encoding, weights, backend)
    } else {
        solve_weighted(&problem, encoding, weights, backend)
    };

    info!(
        "Finished with status {} in {:.2?}.",
        report.status,
        start_time.elapsed()
    );
    Ok(report)
}

/// Rejects solutions whose values break integrality, a row or the plan.
fn verify(problem: &Problem, encoding: &Encoding, solution: &mut BackendSolution) {
    if !solution.status.has_solution() {
        return;
    }
    let Some(values) = &solution.values else {
        warn!("Backend reported {} without values.", solution.status);
        solution.status = SolveStatus::Unknown;
        return;
    };

    let fractional = encoding.model.fractional_binaries(values, VALUE_TOLERANCE);
    let violated = encoding.model.violated_rows(values, VALUE_TOLERANCE);
    let placed = extract::placed_lessons(&encoding.vars, values);
    let mismatches = extract::plan_conformance(problem, &placed);
    if fractional == 0 && violated == 0 && mismatches.is_empty() {
        return;
    }
    warn!(
        "Discarding {} solution: {fractional} fractional binaries, {violated} violated rows, \
         plan mismatches: [{}].",
        solution.status,
        mismatches.join(", ")
    );
    solution.status = SolveStatus::Unknown;
}

fn run_phase(
    problem: &Problem,
    encoding: &Encoding,
    objective: &Expression,
    weights: &OptimizationWeights,
    backend: &impl Backend,
    phase: SolvePhase,
) -> (BackendSolution, PhaseSummary) {
    let start_time = Instant::now();
    let mut solution = backend.solve(&encoding.model, objective, &weights.solver_settings());
    verify(problem, encoding, &mut solution);
    info!(
        "{phase:?} phase: {} (objective {:?}) in {:.2?}.",
        solution.status,
        solution.objective_value,
        start_time.elapsed()
    );
    if let Some(values) = &solution.values {
        for (term, value) in encoding.terms.breakdown(values) {
            debug!("  {term}: {value}");
        }
    }
    let summary = PhaseSummary {
        phase,
        status: solution.status,
        objective_value: solution.objective_value,
    };
    (solution, summary)
}

fn solve_weighted(
    problem: &Problem,
    encoding: Encoding,
    weights: &OptimizationWeights,
    backend: &impl Backend,
) -> SolveReport {
    let objective = encoding.terms.weighted(weights, None);
    let (solution, summary) = run_phase(
        problem,
        &encoding,
        &objective,
        weights,
        backend,
        SolvePhase::WeightedSum,
    );
    assemble(problem, &encoding, weights, solution, None, vec![summary])
}

/// Minimises the primary compactness term, freezes its optimum with a row,
/// then minimises the remaining weighted terms on the same model.
fn solve_lexicographic(
    problem: &Problem,
    mut encoding: Encoding,
    weights: &OptimizationWeights,
    backend: &impl Backend,
) -> SolveReport {
    let primary = encoding.terms.primary(weights.lexico_primary).clone();
    let (first, first_summary) = run_phase(
        problem,
        &encoding,
        &primary,
        weights,
        backend,
        SolvePhase::Primary,
    );
    let Some(first_values) = first.values.as_ref().filter(|_| first.status.has_solution()) else {
        return assemble(problem, &encoding, weights, first, None, vec![first_summary]);
    };

    // The primary term is integral, rounding only strips solver noise.
    let achieved = primary.eval_with(first_values).round();
    info!("Primary {:?} fixed at {achieved}.", weights.lexico_primary);
    encoding.model.leq(primary.clone(), achieved);

    let secondary = encoding.terms.weighted(weights, Some(weights.lexico_primary));
    let (second, second_summary) = run_phase(
        problem,
        &encoding,
        &secondary,
        weights,
        backend,
        SolvePhase::Secondary,
    );
    let phases = vec![first_summary, second_summary];

    if second.status.has_solution() {
        let primary_value = second.values.as_ref().map(|v| primary.eval_with(v).round());
        return assemble(problem, &encoding, weights, second, primary_value, phases);
    }

    warn!(
        "Secondary phase ended with {}; reporting the primary phase solution.",
        second.status
    );
    let objective_value = first
        .values
        .as_ref()
        .map(|v| encoding.terms.weighted(weights, None).eval_with(v));
    let fallback = BackendSolution {
        status: SolveStatus::Feasible,
        objective_value,
        values: first.values,
    };
    assemble(problem, &encoding, weights, fallback, Some(achieved), phases)
}

fn assemble(
    problem: &Problem,
    encoding: &Encoding,
    weights: &OptimizationWeights,
    solution: BackendSolution,
    primary_objective_value: Option<f64>,
    phases: Vec<PhaseSummary>,
) -> SolveReport {
    let mut report = SolveReport {
        status: solution.status,
        objective_value: None,
        primary_objective_value: None,
        phases,
        model_size: encoding.model.size(),
        timetable: None,
        stats: None,
        unmet_soft_constraints: Vec::new(),
    };
    if !solution.status.has_solution() {
        return report;
    }
    let values: HashMap<_, _> = solution.values.unwrap_or_default();
    let Extraction {
        timetable,
        stats,
        unmet_soft_constraints,
    } = extract::extract(problem, &encoding.vars, &values, weights.last_ok_period);
    info!(
        "{} lessons placed, {} teacher gaps, {} class gaps, {} lonely lessons, {} tail lessons.",
        stats.total_lessons,
        stats.total_teacher_gaps,
        stats.total_class_gaps,
        stats.total_lonely_lessons,
        stats.tail_lessons
    );
    report.objective_value = solution.objective_value;
    report.primary_objective_value = primary_objective_value;
    report.timetable = Some(timetable);
    report.stats = Some(stats);
    report.unmet_soft_constraints = unmet_soft_constraints;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverSettings;
    use crate::data::{ClassInfo, PlanEntry, TeacherAssignment};
    use crate::model::TimetableModel;
    use std::cell::Cell;

    fn tiny_input(math_hours: u32) -> TimetableInput {
        TimetableInput {
            days: vec!["Mon".into(), "Tue".into()],
            periods: vec![1, 2, 3],
            classes: vec![ClassInfo::new("5A", 5)],
            subjects: vec!["math".into()],
            teachers: vec!["Ivanov".into()],
            plan_hours: vec![PlanEntry {
                class: "5A".into(),
                subject: "math".into(),
                hours: math_hours,
            }],
            assigned_teachers: vec![TeacherAssignment {
                class: "5A".into(),
                subject: "math".into(),
                teacher: "Ivanov".into(),
            }],
            ..Default::default()
        }
    }

    fn weights() -> OptimizationWeights {
        OptimizationWeights {
            num_search_workers: 1,
            random_seed: Some(1234),
            ..Default::default()
        }
    }

    /// Claims optimality for the all-zero assignment.
    struct LyingBackend;

    impl Backend for LyingBackend {
        fn solve(
            &self,
            model: &TimetableModel,
            _objective: &Expression,
            _settings: &SolverSettings,
        ) -> BackendSolution {
            BackendSolution {
                status: SolveStatus::Optimal,
                objective_value: Some(0.0),
                values: Some(model.variables().iter().map(|(v, _)| (*v, 0.0)).collect()),
            }
        }
    }

    /// Solves the first phase with HiGHS and gives up on the second.
    struct GivesUpAfterFirstPhase {
        calls: Cell<usize>,
    }

    impl Backend for GivesUpAfterFirstPhase {
        fn solve(
            &self,
            model: &TimetableModel,
            objective: &Expression,
            settings: &SolverSettings,
        ) -> BackendSolution {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == 1 {
                HighsBackend.solve(model, objective, settings)
            } else {
                BackendSolution::without_values(SolveStatus::Unknown)
            }
        }
    }

    struct UnreachableBackend;

    impl Backend for UnreachableBackend {
        fn solve(&self, _: &TimetableModel, _: &Expression, _: &SolverSettings) -> BackendSolution {
            panic!("the backend must not be called");
        }
    }

    #[test]
    fn untrustworthy_values_are_downgraded() {
        let report = solve_with_backend(&tiny_input(2), &weights(), &LyingBackend).unwrap();
        assert_eq!(report.status, SolveStatus::Unknown);
        assert!(report.timetable.is_none());
        assert_eq!(report.phases[0].phase, SolvePhase::WeightedSum);
    }

    #[test]
    fn infeasible_input_never_reaches_the_backend() {
        let err = solve_with_backend(&tiny_input(7), &weights(), &UnreachableBackend).unwrap_err();
        assert!(matches!(err, TimetableError::Infeasible(_)));
    }

    #[test]
    fn lexicographic_mode_falls_back_to_the_primary_solution() {
        let weights = OptimizationWeights {
            use_lexico: true,
            ..weights()
        };
        let backend = GivesUpAfterFirstPhase {
            calls: Cell::new(0),
        };
        let report = solve_with_backend(&tiny_input(2), &weights, &backend).unwrap();
        assert_eq!(backend.calls.get(), 2);
        assert_eq!(report.status, SolveStatus::Feasible);
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.phases[1].status, SolveStatus::Unknown);
        let timetable = report.timetable.unwrap();
        assert_eq!(timetable.count("5A", "math", None), 2);
        // One lesson per day keeps each teacher day one period long.
        assert_eq!(report.primary_objective_value, Some(2.0));
        // The full weighted objective, not the primary term alone.
        let objective = report.objective_value.unwrap();
        assert!(objective > 2.0, "objective {objective}");
    }

    #[test]
    fn weighted_mode_solves_once() {
        let report = solve(&tiny_input(2), &weights()).unwrap();
        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.phases.len(), 1);
        let stats = report.stats.unwrap();
        assert_eq!(stats.total_lessons, 2);
        assert_eq!(stats.total_teacher_gaps, 0);
    }
}
