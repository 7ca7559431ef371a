//! Hard rules of the timetable as linear rows.

use good_lp::{Expression, Variable};
use itertools::Itertools;
use log::trace;

use crate::model::{TimetableModel, VariableIndex};
use crate::problem::{ClassId, LessonStream, PeriodId, Problem, Slot, SubjectId};

pub fn encode(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    let mut before = model.rows().len();
    let mut stage = |model: &TimetableModel, name: &str| {
        trace!("{name}: {} rows", model.rows().len() - before);
        before = model.rows().len();
    };

    plan_fulfillment(problem, vars, model);
    stage(model, "plan fulfillment");
    daily_repetition(problem, vars, model);
    stage(model, "daily repetition");
    occupancy(problem, vars, model);
    stage(model, "occupancy");
    mutual_exclusion(problem, vars, model);
    stage(model, "mutual exclusion");
    teacher_exclusivity(problem, vars, model);
    stage(model, "teacher exclusivity");
    split_compatibility(problem, vars, model);
    stage(model, "split compatibility");
    must_sync(problem, vars, model);
    stage(model, "must-sync");
    daily_cap(problem, vars, model);
    not_last_lesson(problem, vars, model);
    elementary_adjacency(problem, vars, model);
    consecutive_days(problem, vars, model);
    stage(model, "grade policies");
}

fn sum(vars: impl IntoIterator<Item = Variable>) -> Expression {
    vars.into_iter().sum()
}

/// Every planned stream receives exactly its weekly hours. A stream without
/// any reachable slot yields the unsatisfiable row `0 == hours`.
fn plan_fulfillment(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for req in problem.active_requirements() {
        let scheduled = sum(vars.stream_lessons(&req.stream).map(|(_, v)| v));
        model.eq(scheduled, req.hours as f64);
    }
}

fn daily_repetition(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    // Two weekly hours of a subject that is not taught as a double lesson go
    // on two different days.
    for req in problem.active_requirements() {
        if req.hours != 2 || problem.is_paired(req.stream.subject) {
            continue;
        }
        for day in problem.day_ids() {
            let today: Vec<Variable> = vars
                .stream_lessons(&req.stream)
                .filter(|(slot, _)| slot.day == day)
                .map(|(_, v)| v)
                .collect();
            if today.len() > 1 {
                model.leq(sum(today), 1.0);
            }
        }
    }

    for ((class, subject), cap) in problem.max_repeats_per_day() {
        for day in problem.day_ids() {
            let flags: Vec<Variable> = vars
                .subject_day_flags(problem, class, subject, day)
                .collect();
            if flags.len() > cap as usize {
                model.leq(sum(flags), cap as f64);
            }
        }
    }
}

/// `occupied(class, slot)` is the OR of the class's lessons in that slot and
/// is pinned to 0 on forbidden slots.
fn occupancy(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for ((class, slot), y) in vars.occupancy() {
        if problem.is_forbidden(class, slot) {
            model.fix_zero(y);
            continue;
        }
        let inputs: Vec<Expression> = vars
            .class_lessons_at(class, slot)
            .iter()
            .map(|&(_, v)| v.into())
            .collect();
        model.require_or(y, &inputs);
    }
}

/// A whole-class lesson excludes everything else in the slot; each subgroup
/// attends at most one split lesson.
fn mutual_exclusion(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for class in problem.class_ids() {
        for slot in problem.slots() {
            let lessons = vars.class_lessons_at(class, slot);
            let whole: Vec<Variable> = lessons
                .iter()
                .filter(|(stream, _)| stream.subgroup.is_none())
                .map(|&(_, v)| v)
                .collect();
            let split = lessons
                .iter()
                .filter_map(|&(stream, v)| stream.subgroup.map(|g| (g, v)))
                .into_group_map();
            if split.is_empty() {
                model.at_most_one(&whole);
                continue;
            }
            for subgroup in problem.subgroup_ids() {
                let mut group = whole.clone();
                group.extend(split.get(&subgroup).into_iter().flatten().copied());
                model.at_most_one(&group);
            }
        }
    }
}

fn teacher_exclusivity(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for teacher in problem.teacher_ids() {
        for slot in problem.slots() {
            model.at_most_one(vars.teacher_lessons_at(teacher, slot));
        }
    }
}

/// Presence flags mirror the subgroups of a split subject; two different
/// split subjects share a slot only when they form a compatible pair.
fn split_compatibility(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for ((class, subject, slot), presence) in vars.presences() {
        let inputs: Vec<Expression> = vars
            .class_lessons_at(class, slot)
            .iter()
            .filter(|(stream, _)| stream.subject == subject && stream.subgroup.is_some())
            .map(|&(_, v)| v.into())
            .collect();
        model.require_or(presence, &inputs);
    }

    for class in problem.class_ids() {
        for slot in problem.slots() {
            let present: Vec<(SubjectId, Variable)> = problem
                .subject_ids()
                .filter_map(|s| vars.presence(class, s, slot).map(|p| (s, p)))
                .collect();
            for (&(a, pa), &(b, pb)) in present.iter().tuple_combinations() {
                if !problem.is_compatible(a, b) {
                    model.leq(pa + pb, 1.0);
                }
            }
        }
    }
}

/// Subgroups of a must-sync subject sit in the same slots. Chaining equality
/// over consecutive subgroups ties all of them together.
fn must_sync(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for class in problem.class_ids() {
        for subject in problem.must_sync_subjects() {
            let streams: Vec<LessonStream> = problem
                .subgroup_ids()
                .map(|g| LessonStream {
                    class,
                    subject,
                    subgroup: Some(g),
                })
                .collect();
            if streams.iter().all(|s| vars.stream_lessons(s).next().is_none()) {
                continue;
            }
            for (first, second) in streams.iter().tuple_windows() {
                for slot in problem.slots() {
                    match (vars.lesson(first, slot), vars.lesson(second, slot)) {
                        (Some(a), Some(b)) => model.eq(a, b),
                        (Some(only), None) | (None, Some(only)) => model.fix_zero(only),
                        (None, None) => {}
                    }
                }
            }
        }
    }
}

fn daily_cap(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for class in problem.class_ids() {
        let cap = problem.max_lessons_per_day(class);
        if cap as usize >= problem.period_count() {
            continue;
        }
        for day in problem.day_ids() {
            let load = sum(
                problem
                    .period_ids()
                    .filter_map(|period| vars.occupied(class, Slot { day, period })),
            );
            model.leq(load, cap as f64);
        }
    }
}

/// A not-last-lesson subject in period `p` needs another occupied period
/// later the same day: `lesson(p) <= sum_{q > p} occupied(q)`.
fn not_last_lesson(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for (stream, slot, lesson) in vars.lessons() {
        let Some(subjects) = problem.not_last_lesson_subjects(stream.class) else {
            continue;
        };
        if !subjects.contains(&stream.subject) {
            continue;
        }
        let later = sum(
            problem
                .period_ids()
                .filter(|p| *p > slot.period)
                .filter_map(|period| {
                    vars.occupied(
                        stream.class,
                        Slot {
                            day: slot.day,
                            period,
                        },
                    )
                }),
        );
        model.leq(lesson, later);
    }
}

/// Grades 2-4 never have the same non-paired subject in two adjacent periods.
fn elementary_adjacency(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for class in problem.class_ids().filter(|&c| problem.is_elementary(c)) {
        for subject in class_subjects(vars, class) {
            if problem.is_paired(subject) {
                continue;
            }
            for day in problem.day_ids() {
                let periods: Vec<PeriodId> = problem.period_ids().collect();
                for (&p, &q) in periods.iter().tuple_windows() {
                    let flag =
                        |period| vars.subject_flag(problem, class, subject, Slot { day, period });
                    if let (Some(a), Some(b)) = (flag(p), flag(q)) {
                        model.leq(a + b, 1.0);
                    }
                }
            }
        }
    }
}

/// Windows of `limit + 1` consecutive days hold the subject on at most
/// `limit` of them.
fn consecutive_days(problem: &Problem, vars: &VariableIndex, model: &mut TimetableModel) {
    for ((class, subject, day), flag) in vars.day_presences() {
        let inputs: Vec<Expression> = vars
            .subject_day_flags(problem, class, subject, day)
            .map(Expression::from)
            .collect();
        model.require_or(flag, &inputs);
    }

    for class in problem.class_ids() {
        let Some(limits) = problem.max_consecutive_days(class) else {
            continue;
        };
        for (&subject, &limit) in limits {
            let window = limit as usize + 1;
            if window > problem.day_count() {
                continue;
            }
            let days: Vec<_> = problem.day_ids().collect();
            for run in days.windows(window) {
                let flags: Vec<Variable> = run
                    .iter()
                    .filter_map(|&d| vars.day_presence(class, subject, d))
                    .collect();
                if flags.len() > limit as usize {
                    model.leq(sum(flags), limit as f64);
                }
            }
        }
    }
}

/// Subjects of `class` that own lesson variables, each listed once.
fn class_subjects(vars: &VariableIndex, class: ClassId) -> Vec<SubjectId> {
    vars.streams()
        .filter(|s| s.class == class)
        .map(|s| s.subject)
        .dedup()
        .collect()
}
