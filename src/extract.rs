//! Turns raw variable values back into a timetable with statistics.

use good_lp::{Solution, Variable};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::data::{ScheduledLesson, Timetable, TimetableStats, UnmetSoftConstraint};
use crate::model::VariableIndex;
use crate::problem::{ClassId, DayId, LessonStream, Problem, Slot, TeacherId};

/// A lesson variable above this value counts as scheduled.
pub const ACTIVE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Extraction {
    pub timetable: Timetable,
    pub stats: TimetableStats,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}

/// Scheduled lessons ordered by class, day, period, then subject and subgroup.
pub fn placed_lessons(
    vars: &VariableIndex,
    values: &HashMap<Variable, f64>,
) -> Vec<(LessonStream, Slot)> {
    vars.lessons()
        .filter(|(_, _, v)| values.value(*v) > ACTIVE_THRESHOLD)
        .map(|(stream, slot, _)| (stream, slot))
        .sorted_by_key(|(stream, slot)| {
            (
                stream.class,
                slot.day,
                slot.period,
                stream.subject,
                stream.subgroup,
            )
        })
        .collect()
}

/// Streams whose scheduled count differs from their weekly hours, as
/// `label: scheduled/required` strings.
pub fn plan_conformance(problem: &Problem, placed: &[(LessonStream, Slot)]) -> Vec<String> {
    let counts = placed.iter().map(|(stream, _)| *stream).counts();
    let mut mismatches: Vec<String> = problem
        .requirements()
        .iter()
        .filter_map(|req| {
            let scheduled = counts.get(&req.stream).copied().unwrap_or(0);
            (scheduled != req.hours as usize).then(|| {
                format!(
                    "{}: {scheduled}/{}",
                    problem.stream_label(&req.stream),
                    req.hours
                )
            })
        })
        .collect();
    mismatches.extend(
        counts
            .keys()
            .filter(|stream| problem.requirement(stream).is_none())
            .sorted()
            .map(|stream| format!("{}: unplanned", problem.stream_label(stream))),
    );
    mismatches
}

pub fn extract(
    problem: &Problem,
    vars: &VariableIndex,
    values: &HashMap<Variable, f64>,
    last_ok_period: u32,
) -> Extraction {
    let placed = placed_lessons(vars, values);

    let lessons = placed
        .iter()
        .map(|&(stream, slot)| ScheduledLesson {
            class: problem.class(stream.class).name.clone(),
            day: problem.day_name(slot.day).to_string(),
            period: problem.period_number(slot.period),
            subject: problem.subject(stream.subject).name.clone(),
            subgroup: stream.subgroup.map(|g| problem.subgroup_number(g)),
            teacher: problem
                .teacher_of(&stream)
                .map(|t| problem.teacher_name(t).to_string()),
        })
        .collect();

    let mut unmet = Vec::new();
    let total_lonely_lessons = lonely_lessons(problem, &placed, &mut unmet);
    let total_teacher_gaps = teacher_gaps(problem, &placed, &mut unmet);
    let total_class_gaps = class_gaps(&placed);
    let tail_lessons = tail_lessons(problem, &placed, last_ok_period, &mut unmet);

    Extraction {
        timetable: Timetable {
            days: problem.days().to_vec(),
            periods: problem.periods().to_vec(),
            lessons,
        },
        stats: TimetableStats {
            total_lessons: placed.len(),
            total_lonely_lessons,
            total_teacher_gaps,
            total_class_gaps,
            tail_lessons,
        },
        unmet_soft_constraints: unmet,
    }
}

/// Busy period positions grouped by key, in key order.
fn busy_periods<K: Ord>(entries: impl Iterator<Item = (K, Slot)>) -> BTreeMap<K, BTreeSet<usize>> {
    let mut grouped: BTreeMap<K, BTreeSet<usize>> = BTreeMap::new();
    for (key, slot) in entries {
        grouped.entry(key).or_default().insert(slot.period.index());
    }
    grouped
}

/// Periods (by position) between the first and last busy one that are idle.
fn idle_periods(busy: &BTreeSet<usize>) -> usize {
    match (busy.first(), busy.last()) {
        (Some(first), Some(last)) => last - first + 1 - busy.len(),
        _ => 0,
    }
}

fn lonely_lessons(
    problem: &Problem,
    placed: &[(LessonStream, Slot)],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> usize {
    let by_stream_day = busy_periods(
        placed
            .iter()
            .filter(|(stream, _)| problem.is_paired(stream.subject))
            .map(|&(stream, slot)| ((stream, slot.day), slot)),
    );

    let mut count = 0;
    for ((stream, day), periods) in &by_stream_day {
        for &p in periods {
            let before = p.checked_sub(1).is_some_and(|q| periods.contains(&q));
            let after = periods.contains(&(p + 1));
            if before || after {
                continue;
            }
            count += 1;
            let period = problem.periods()[p];
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Lonely Lesson".to_string(),
                description: format!(
                    "{} on {} period {period} is not part of a double lesson",
                    problem.stream_label(stream),
                    problem.day_name(*day)
                ),
            });
        }
    }
    count
}

fn teacher_gaps(
    problem: &Problem,
    placed: &[(LessonStream, Slot)],
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> usize {
    let by_teacher_day: BTreeMap<(TeacherId, DayId), BTreeSet<usize>> =
        busy_periods(placed.iter().filter_map(|(stream, slot)| {
            problem
                .teacher_of(stream)
                .map(|t| ((t, slot.day), *slot))
        }));

    let mut total = 0;
    for ((teacher, day), busy) in &by_teacher_day {
        let gaps = idle_periods(busy);
        if gaps == 0 {
            continue;
        }
        total += gaps;
        unmet.push(UnmetSoftConstraint {
            constraint_type: "Teacher Window".to_string(),
            description: format!(
                "teacher {} has {gaps} idle period(s) on {}",
                problem.teacher_name(*teacher),
                problem.day_name(*day)
            ),
        });
    }
    total
}

fn class_gaps(placed: &[(LessonStream, Slot)]) -> usize {
    let by_class_day: BTreeMap<(ClassId, DayId), BTreeSet<usize>> =
        busy_periods(placed.iter().map(|(stream, slot)| ((stream.class, slot.day), *slot)));
    by_class_day.values().map(idle_periods).sum()
}

fn tail_lessons(
    problem: &Problem,
    placed: &[(LessonStream, Slot)],
    last_ok_period: u32,
    unmet: &mut Vec<UnmetSoftConstraint>,
) -> usize {
    let late: BTreeSet<(ClassId, Slot)> = placed
        .iter()
        .filter(|(_, slot)| problem.period_number(slot.period) > last_ok_period)
        .map(|(stream, slot)| (stream.class, *slot))
        .collect();
    for (class, slot) in &late {
        unmet.push(UnmetSoftConstraint {
            constraint_type: "Late Lesson".to_string(),
            description: format!(
                "class {} has a lesson on {} period {}, after period {last_ok_period}",
                problem.class(*class).name,
                problem.day_name(slot.day),
                problem.period_number(slot.period)
            ),
        });
    }
    late.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClassInfo, PlanEntry, TeacherAssignment, TimetableInput};
    use crate::model::TimetableModel;

    fn fixture() -> (Problem, VariableIndex, TimetableModel) {
        let mut input = TimetableInput {
            days: vec!["Mon".into(), "Tue".into()],
            periods: (1..=7).collect(),
            classes: vec![ClassInfo::new("5A", 5)],
            subjects: vec!["math".into(), "labor".into()],
            teachers: vec!["Ivanov".into(), "Orlov".into()],
            paired_subjects: vec!["labor".into()],
            ..Default::default()
        };
        for (subject, teacher, hours) in [("math", "Ivanov", 3), ("labor", "Orlov", 3)] {
            input.plan_hours.push(PlanEntry {
                class: "5A".into(),
                subject: subject.into(),
                hours,
            });
            input.assigned_teachers.push(TeacherAssignment {
                class: "5A".into(),
                subject: subject.into(),
                teacher: teacher.into(),
            });
        }
        let problem = Problem::from_input(&input).unwrap();
        let mut model = TimetableModel::new();
        let vars = VariableIndex::allocate(&problem, &mut model);
        (problem, vars, model)
    }

    fn values_for(
        problem: &Problem,
        vars: &VariableIndex,
        model: &TimetableModel,
        placed: &[(&str, usize, usize)],
    ) -> HashMap<Variable, f64> {
        let mut values: HashMap<Variable, f64> =
            model.variables().iter().map(|(v, _)| (*v, 0.0)).collect();
        for &(subject, day, period) in placed {
            let var = vars
                .lessons()
                .find(|(stream, slot, _)| {
                    problem.subject(stream.subject).name == subject
                        && slot.day.index() == day
                        && slot.period.index() == period
                })
                .map(|(_, _, v)| v)
                .unwrap();
            values.insert(var, 1.0);
        }
        values
    }

    #[test]
    fn rebuilds_sorted_lessons_and_stats() {
        let (problem, vars, model) = fixture();
        // Monday: math 1, labor 2-3, math 5; Tuesday: labor 7, math 1.
        let values = values_for(
            &problem,
            &vars,
            &model,
            &[
                ("math", 0, 4),
                ("labor", 0, 1),
                ("math", 0, 0),
                ("labor", 0, 2),
                ("labor", 1, 6),
                ("math", 1, 0),
            ],
        );
        let extraction = extract(&problem, &vars, &values, 6);

        let monday: Vec<(u32, &str)> = extraction
            .timetable
            .lessons
            .iter()
            .filter(|l| l.day == "Mon")
            .map(|l| (l.period, l.subject.as_str()))
            .collect();
        assert_eq!(monday, vec![(1, "math"), (2, "labor"), (3, "labor"), (5, "math")]);
        assert_eq!(extraction.timetable.lessons[0].teacher.as_deref(), Some("Ivanov"));

        let stats = extraction.stats;
        assert_eq!(stats.total_lessons, 6);
        assert_eq!(stats.total_lonely_lessons, 1);
        // Ivanov: Monday 1 and 5; Orlov alone on Tuesday 7.
        assert_eq!(stats.total_teacher_gaps, 3);
        // 5A: Monday period 4 idle; Tuesday periods 2-6 idle.
        assert_eq!(stats.total_class_gaps, 6);
        assert_eq!(stats.tail_lessons, 1);

        let kinds: Vec<&str> = extraction
            .unmet_soft_constraints
            .iter()
            .map(|u| u.constraint_type.as_str())
            .collect();
        assert_eq!(kinds, vec!["Lonely Lesson", "Teacher Window", "Late Lesson"]);
    }

    #[test]
    fn conformance_reports_missing_hours() {
        let (problem, vars, model) = fixture();
        let values = values_for(&problem, &vars, &model, &[("math", 0, 0)]);
        let placed = placed_lessons(&vars, &values);
        let mismatches = plan_conformance(&problem, &placed);
        assert_eq!(mismatches, vec!["5A/math: 1/3", "5A/labor: 0/3"]);
    }
}
