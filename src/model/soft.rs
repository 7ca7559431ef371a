//! Soft cost terms and the two ways of combining them.
//!
//! Each term is an unweighted linear expression; the weights are applied
//! only when an objective is assembled, so a zero weight switches a term
//! off without removing its auxiliary rows.

use good_lp::{Expression, Solution, Variable};
use itertools::Itertools;
use log::trace;

use crate::config::{LexicoPrimary, OptimizationWeights};
use crate::model::{TimetableModel, VariableIndex};
use crate::problem::{LessonStream, Problem, Slot, TeacherId};

/// Unweighted soft terms. All but `preferences` take integral values on
/// integral solutions.
#[derive(Debug, Clone)]
pub struct SoftTerms {
    /// Summed envelope length of class days.
    pub class_windows: Expression,
    /// Summed envelope length of teacher days.
    pub teacher_windows: Expression,
    pub early: Expression,
    pub balance: Expression,
    pub tail: Expression,
    pub lonely: Expression,
    pub preferences: Expression,
}

impl SoftTerms {
    pub fn primary(&self, which: LexicoPrimary) -> &Expression {
        match which {
            LexicoPrimary::TeacherWindows => &self.teacher_windows,
            LexicoPrimary::ClassWindows => &self.class_windows,
        }
    }

    /// Weighted sum of the terms, leaving out `skip` when given.
    pub fn weighted(
        &self,
        weights: &OptimizationWeights,
        skip: Option<LexicoPrimary>,
    ) -> Expression {
        let mut objective = Expression::default();
        if skip != Some(LexicoPrimary::ClassWindows) {
            objective.add_mul(weights.alpha_runs, &self.class_windows);
        }
        if skip != Some(LexicoPrimary::TeacherWindows) {
            objective.add_mul(weights.alpha_runs_teacher, &self.teacher_windows);
        }
        objective.add_mul(weights.beta_early, &self.early);
        objective.add_mul(weights.gamma_balance, &self.balance);
        objective.add_mul(weights.delta_tail, &self.tail);
        objective.add_mul(weights.epsilon_pairing, &self.lonely);
        objective.add_mul(weights.pref_scale, &self.preferences);
        objective
    }

    /// Value of every term under `values`, for logging.
    pub fn breakdown<S: Solution>(&self, values: &S) -> Vec<(&'static str, f64)> {
        vec![
            ("class windows", self.class_windows.eval_with(values)),
            ("teacher windows", self.teacher_windows.eval_with(values)),
            ("early", self.early.eval_with(values)),
            ("balance", self.balance.eval_with(values)),
            ("tail", self.tail.eval_with(values)),
            ("lonely", self.lonely.eval_with(values)),
            ("preferences", self.preferences.eval_with(values)),
        ]
    }
}

pub fn compose(
    problem: &Problem,
    vars: &VariableIndex,
    weights: &OptimizationWeights,
    model: &mut TimetableModel,
) -> SoftTerms {
    let terms = SoftTerms {
        class_windows: class_windows(problem, vars, model),
        teacher_windows: teacher_windows(problem, vars, model),
        early: early(problem, vars),
        balance: balance(problem, vars, model),
        tail: tail(problem, vars, weights.last_ok_period),
        lonely: lonely(problem, vars, model),
        preferences: preferences(problem, vars),
    };
    trace!("Soft terms composed, {} rows in the model.", model.rows().len());
    terms
}

/// 0/1 flag as an expression; `None` is the literal 0.
type Flag = Option<Expression>;

fn or_flag(model: &mut TimetableModel, a: Flag, b: Flag) -> Flag {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) => {
            let v = model.add_unit();
            model.require_or(v, &[a, b]);
            Some(v.into())
        }
    }
}

fn and_flag(model: &mut TimetableModel, a: &Flag, b: &Flag) -> Flag {
    let (Some(a), Some(b)) = (a, b) else {
        return None;
    };
    let v = model.add_unit();
    model.require_and(v, a.clone(), b.clone());
    Some(v.into())
}

/// Number of periods between the first and the last busy period of a day,
/// both included.
///
/// `started(p)` is a prefix OR, `pending(p)` a suffix OR and the day counts
/// `inside(p) = started(p) AND pending(p)`. The first prefix and the last
/// suffix element alias the flag itself.
pub fn envelope(model: &mut TimetableModel, flags: &[Flag]) -> Expression {
    let mut started = Vec::with_capacity(flags.len());
    let mut running: Flag = None;
    for flag in flags {
        running = or_flag(model, running, flag.clone());
        started.push(running.clone());
    }

    let mut pending = vec![None; flags.len()];
    let mut running: Flag = None;
    for (i, flag) in flags.iter().enumerate().rev() {
        running = or_flag(model, running, flag.clone());
        pending[i] = running.clone();
    }

    let mut length = Expression::default();
    for (s, p) in started.iter().zip(&pending) {
        if let Some(inside) = and_flag(model, s, p) {
            length += inside;
        }
    }
    length
}

fn class_windows(
    problem: &Problem,
    vars: &VariableIndex,
    model: &mut TimetableModel,
) -> Expression {
    let mut total = Expression::default();
    for class in problem.class_ids() {
        for day in problem.day_ids() {
            let flags: Vec<Flag> = problem
                .period_ids()
                .map(|period| vars.occupied(class, Slot { day, period }).map(Expression::from))
                .collect();
            total += envelope(model, &flags);
        }
    }
    total
}

/// Teacher exclusivity keeps at most one lesson per slot, so the plain sum
/// of a teacher's lesson variables is already the busy flag.
fn teacher_busy(vars: &VariableIndex, teacher: TeacherId, slot: Slot) -> Flag {
    let lessons = vars.teacher_lessons_at(teacher, slot);
    if lessons.is_empty() {
        None
    } else {
        Some(lessons.iter().copied().sum())
    }
}

fn teacher_windows(
    problem: &Problem,
    vars: &VariableIndex,
    model: &mut TimetableModel,
) -> Expression {
    let mut total = Expression::default();
    for teacher in problem.teacher_ids() {
        for day in problem.day_ids() {
            let flags: Vec<Flag> = problem
                .period_ids()
                .map(|period| teacher_busy(vars, teacher, Slot { day, period }))
                .collect();
            if flags.iter().any(Option::is_some) {
                total += envelope(model, &flags);
            }
        }
    }
    total
}

fn early(problem: &Problem, vars: &VariableIndex) -> Expression {
    let mut total = Expression::default();
    for ((_, slot), y) in vars.occupancy() {
        total.add_mul(problem.period_number(slot.period) as f64, y);
    }
    total
}

/// Per class, the spread between the busiest and the lightest day.
fn balance(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) -> Expression {
    let periods = problem.period_count() as f64;
    let mut total = Expression::default();
    for class in problem.class_ids() {
        let most = model.add_continuous(0.0, periods);
        let least = model.add_continuous(0.0, periods);
        for day in problem.day_ids() {
            let load: Expression = problem
                .period_ids()
                .filter_map(|period| vars.occupied(class, Slot { day, period }))
                .sum();
            model.geq(most, load.clone());
            model.leq(least, load);
        }
        total += most;
        total -= least;
    }
    total
}

fn tail(problem: &Problem, vars: &VariableIndex, last_ok_period: u32) -> Expression {
    vars.occupancy()
        .filter(|((_, slot), _)| problem.period_number(slot.period) > last_ok_period)
        .map(|(_, y)| y)
        .sum()
}

/// Lessons of paired subjects with no lesson of the same stream directly
/// before or after: `lonely = cur AND NOT prev AND NOT next`.
fn lonely(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) -> Expression {
    let mut total = Expression::default();
    let streams: Vec<LessonStream> = vars
        .streams()
        .filter(|s| problem.is_paired(s.subject))
        .collect();
    for stream in streams {
        for day in problem.day_ids() {
            let day_vars: Vec<Option<Variable>> = problem
                .period_ids()
                .map(|period| vars.lesson(&stream, Slot { day, period }))
                .collect();
            for (p, cur) in day_vars.iter().enumerate() {
                let Some(cur) = *cur else { continue };
                let prev = p.checked_sub(1).and_then(|q| day_vars[q]);
                let next = day_vars.get(p + 1).copied().flatten();
                let l = model.add_unit();
                model.leq(l, cur);
                let mut lower = Expression::from(cur);
                for neighbour in [prev, next].into_iter().flatten() {
                    model.leq(l + neighbour, 1.0);
                    lower -= neighbour;
                }
                model.geq(l, lower);
                total += l;
            }
        }
    }
    total
}

/// User preference tables; positive weights penalise, negative ones reward.
fn preferences(problem: &Problem, vars: &VariableIndex) -> Expression {
    let mut total = Expression::default();
    let class_slot = problem.class_slot_weights();
    if !class_slot.is_empty() {
        for ((class, slot), y) in vars.occupancy() {
            let w = class_slot.weight(&(class, slot));
            if w != 0.0 {
                total.add_mul(w, y);
            }
        }
    }

    let teacher_slot = problem.teacher_slot_weights();
    if !teacher_slot.is_empty() {
        for teacher in problem.teacher_ids() {
            for slot in problem.slots() {
                let w = teacher_slot.weight(&(teacher, slot));
                if w == 0.0 {
                    continue;
                }
                for &lesson in vars.teacher_lessons_at(teacher, slot) {
                    total.add_mul(w, lesson);
                }
            }
        }
    }

    let subject_day = problem.class_subject_day_weights();
    if !subject_day.is_empty() {
        let class_subjects = vars.streams().map(|s| (s.class, s.subject)).dedup().collect_vec();
        for (class, subject) in class_subjects {
            for day in problem.day_ids() {
                let w = subject_day.weight(&(class, subject, day));
                if w == 0.0 {
                    continue;
                }
                for flag in vars.subject_day_flags(problem, class, subject, day) {
                    total.add_mul(w, flag);
                }
            }
        }
    }
    total
}
