//! Static feasibility checks run before any model is built.
//!
//! Every check runs; violations are collected rather than returned on the
//! first hit so the caller sees the whole picture at once.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::problem::{ClassId, LessonStream, Problem, SubjectId, SubjectKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingTeacher,
    TeacherCapacity,
    ClassCapacity,
    ElementaryEnglish,
    MustSyncHours,
    MustSyncTeacher,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Structural reasons why no timetable can exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibilityReport {
    pub violations: Vec<Violation>,
}

impl InfeasibilityReport {
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.message.as_str())
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

impl fmt::Display for InfeasibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timetable is infeasible ({} violation(s)): {}",
            self.violations.len(),
            self.messages().join("; ")
        )
    }
}

impl std::error::Error for InfeasibilityReport {}

/// Runs every feasibility check against `problem`.
///
/// The result is deterministic: checks follow input order and duplicate
/// messages are dropped keeping the first occurrence.
pub fn validate(problem: &Problem) -> Result<(), InfeasibilityReport> {
    let mut violations = Vec::new();
    check_teachers_assigned(problem, &mut violations);
    check_teacher_capacity(problem, &mut violations);
    check_class_capacity(problem, &mut violations);
    check_elementary_english(problem, &mut violations);
    check_must_sync(problem, &mut violations);

    let violations: Vec<Violation> = violations
        .into_iter()
        .unique_by(|v| v.message.clone())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(InfeasibilityReport { violations })
    }
}

fn check_teachers_assigned(problem: &Problem, out: &mut Vec<Violation>) {
    for req in problem.active_requirements() {
        if req.teacher.is_none() {
            out.push(Violation::new(
                ViolationKind::MissingTeacher,
                format!(
                    "{} has {} weekly hour(s) but no assigned teacher",
                    problem.stream_label(&req.stream),
                    req.hours
                ),
            ));
        }
    }
}

fn check_teacher_capacity(problem: &Problem, out: &mut Vec<Violation>) {
    let load = problem
        .active_requirements()
        .filter_map(|r| r.teacher.map(|t| (t, r.hours)))
        .into_group_map();
    for teacher in problem.teacher_ids() {
        let Some(hours) = load.get(&teacher) else {
            continue;
        };
        let required: u32 = hours.iter().sum();
        let available = problem
            .slots()
            .filter(|&slot| problem.teacher_available(teacher, slot))
            .count() as u32;
        if required > available {
            out.push(Violation::new(
                ViolationKind::TeacherCapacity,
                format!(
                    "teacher {} needs {required} hour(s) \
                     but only {available} slot(s) are available",
                    problem.teacher_name(teacher)
                ),
            ));
        }
    }
}

/// Whole-class hours plus the heaviest subgroup's split hours of a class.
fn class_weekly_hours(problem: &Problem, class: ClassId) -> u32 {
    let whole: u32 = problem
        .active_requirements()
        .filter(|r| r.stream.class == class && r.stream.subgroup.is_none())
        .map(|r| r.hours)
        .sum();
    let split_per_subgroup = problem
        .active_requirements()
        .filter(|r| r.stream.class == class)
        .filter_map(|r| r.stream.subgroup.map(|g| (g, r.hours)))
        .into_group_map();
    let split = split_per_subgroup
        .values()
        .map(|hours| hours.iter().sum::<u32>())
        .max()
        .unwrap_or(0);
    whole + split
}

fn check_class_capacity(problem: &Problem, out: &mut Vec<Violation>) {
    for class in problem.class_ids() {
        let required = class_weekly_hours(problem, class);
        let cap = problem.max_lessons_per_day(class);
        let available: u32 = problem
            .day_ids()
            .map(|day| {
                let open = problem
                    .slots()
                    .filter(|s| s.day == day && !problem.is_forbidden(class, *s))
                    .count() as u32;
                open.min(cap)
            })
            .sum();
        if required > available {
            out.push(Violation::new(
                ViolationKind::ClassCapacity,
                format!(
                    "class {} needs {required} lesson slot(s) per week but only {available} fit",
                    problem.class(class).name
                ),
            ));
        }
    }
}

fn check_elementary_english(problem: &Problem, out: &mut Vec<Violation>) {
    let Some(english) = problem.english_subject() else {
        return;
    };
    for class in problem.class_ids().filter(|&c| problem.restricts_english(c)) {
        let required = english_hours(problem, class, english);
        if required == 0 {
            continue;
        }
        let allowed = problem
            .slots()
            .filter(|s| problem.is_english_period(s.period) && !problem.is_forbidden(class, *s))
            .count() as u32;
        if required > allowed {
            out.push(Violation::new(
                ViolationKind::ElementaryEnglish,
                format!(
                    "class {} needs {required} English hour(s) \
                     but only {allowed} elementary English slot(s) are open",
                    problem.class(class).name
                ),
            ));
        }
    }
}

fn english_hours(problem: &Problem, class: ClassId, english: SubjectId) -> u32 {
    match problem.subject(english).kind {
        SubjectKind::WholeClass => problem.hours(&LessonStream {
            class,
            subject: english,
            subgroup: None,
        }),
        SubjectKind::Split => problem
            .subgroup_ids()
            .map(|g| {
                problem.hours(&LessonStream {
                    class,
                    subject: english,
                    subgroup: Some(g),
                })
            })
            .max()
            .unwrap_or(0),
    }
}

fn check_must_sync(problem: &Problem, out: &mut Vec<Violation>) {
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
            let hours: Vec<u32> = streams.iter().map(|s| problem.hours(s)).collect();
            if hours.iter().all(|&h| h == 0) {
                continue;
            }
            let label = format!(
                "{}/{}",
                problem.class(class).name,
                problem.subject(subject).name
            );
            if !hours.iter().all_equal() {
                let listed = streams
                    .iter()
                    .zip(&hours)
                    .map(|(s, h)| {
                        let g = s.subgroup.map_or(0, |g| problem.subgroup_number(g));
                        format!("g{g}={h}")
                    })
                    .join(", ");
                out.push(Violation::new(
                    ViolationKind::MustSyncHours,
                    format!("must-sync subject {label} has unequal subgroup hours ({listed})"),
                ));
            }
            for (a, b) in streams.iter().tuple_combinations() {
                let (Some(ta), Some(tb)) = (problem.teacher_of(a), problem.teacher_of(b)) else {
                    continue;
                };
                if ta == tb && problem.hours(a) > 0 && problem.hours(b) > 0 {
                    out.push(Violation::new(
                        ViolationKind::MustSyncTeacher,
                        format!(
                            "must-sync subject {label} is taught to several subgroups \
                             by teacher {} at the same time",
                            problem.teacher_name(ta)
                        ),
                    ));
                }
            }
        }
    }
}
