mod common;

use common::{
    class_envelope, names, plan, sample_input, small_school, split_plan, teacher_envelope,
    test_weights,
};
use school_timetable::data::{ClassInfo, ScheduledLesson, TimetableInput};
use school_timetable::{LexicoPrimary, OptimizationWeights, SolveStatus, Timetable, solve};
use std::collections::{BTreeMap, BTreeSet, HashMap};

fn solved(input: &TimetableInput, weights: &OptimizationWeights) -> Timetable {
    let report = solve(input, weights).expect("input should pass validation");
    assert!(
        report.status.has_solution(),
        "unexpected status {}",
        report.status
    );
    report.timetable.expect("a solved report carries a timetable")
}

fn assert_plan_conformance(input: &TimetableInput, timetable: &Timetable) {
    for entry in &input.plan_hours {
        assert_eq!(
            timetable.count(&entry.class, &entry.subject, None),
            entry.hours as usize,
            "{}/{}",
            entry.class,
            entry.subject
        );
    }
    for entry in &input.subgroup_plan_hours {
        assert_eq!(
            timetable.count(&entry.class, &entry.subject, Some(entry.subgroup)),
            entry.hours as usize,
            "{}/{}/{}",
            entry.class,
            entry.subject,
            entry.subgroup
        );
    }
}

fn assert_no_double_booking(timetable: &Timetable) {
    let mut teacher_slots: HashMap<(&str, &str, u32), usize> = HashMap::new();
    for lesson in &timetable.lessons {
        if let Some(teacher) = lesson.teacher.as_deref() {
            *teacher_slots
                .entry((teacher, lesson.day.as_str(), lesson.period))
                .or_default() += 1;
        }
    }
    for (key, count) in teacher_slots {
        assert_eq!(count, 1, "teacher double-booked at {key:?}");
    }

    let mut class_slots: BTreeMap<(&str, &str, u32), Vec<&ScheduledLesson>> = BTreeMap::new();
    for lesson in &timetable.lessons {
        class_slots
            .entry((lesson.class.as_str(), lesson.day.as_str(), lesson.period))
            .or_default()
            .push(lesson);
    }
    for (key, lessons) in class_slots {
        if lessons.iter().any(|l| l.subgroup.is_none()) {
            assert_eq!(lessons.len(), 1, "whole-class lesson shares {key:?}");
        }
        let subgroups: Vec<u32> = lessons.iter().filter_map(|l| l.subgroup).collect();
        let distinct: BTreeSet<u32> = subgroups.iter().copied().collect();
        assert_eq!(subgroups.len(), distinct.len(), "subgroup double-booked at {key:?}");
    }
}

#[test]
fn sample_school_week_is_consistent() {
    let input = sample_input();
    let report = solve(&input, &test_weights()).unwrap();
    assert!(report.status.has_solution(), "status {}", report.status);
    let timetable = report.timetable.as_ref().unwrap();

    assert_plan_conformance(&input, timetable);
    assert_no_double_booking(timetable);

    // Compatibility closure: every pair of split subjects sharing a slot is
    // a declared compatible pair.
    let compatible: BTreeSet<(String, String)> = input
        .compatible_pairs
        .iter()
        .flat_map(|(a, b)| [(a.clone(), b.clone()), (b.clone(), a.clone())])
        .collect();
    for lesson in &timetable.lessons {
        for other in timetable.lessons_at(&lesson.class, &lesson.day, lesson.period) {
            if lesson.subgroup.is_some() && other.subject != lesson.subject {
                assert!(
                    compatible.contains(&(lesson.subject.clone(), other.subject.clone())),
                    "{} and {} share a slot",
                    lesson.subject,
                    other.subject
                );
            }
        }
    }

    // Must-sync labor: both subgroups always together.
    for class in ["5A", "5B"] {
        let slots = |g| -> BTreeSet<(String, u32)> {
            timetable
                .lessons_for_class(class)
                .filter(|l| l.subject == "labor" && l.subgroup == Some(g))
                .map(|l| (l.day.clone(), l.period))
                .collect()
        };
        assert_eq!(slots(1), slots(2));
    }

    // Availability and placement policies.
    assert!(
        timetable
            .lessons_for_teacher("Petrov")
            .all(|l| l.day != "Mon" && !(l.day == "Tue" && l.period == 1))
    );
    assert!(
        timetable
            .lessons_for_teacher("Nikolaev")
            .all(|l| !(l.day == "Thu" && l.period == 7))
    );
    assert!(timetable.lessons_at("5A", "Mon", 1).is_empty());
    assert!(
        timetable
            .lessons_for_class("2A")
            .all(|l| (2..=4).contains(&l.period))
    );

    let stats = report.stats.unwrap();
    assert_eq!(stats.total_lessons, timetable.lessons.len());
    assert_eq!(report.model_size.binary_variables > 0, true);
}

#[test]
fn two_hour_subject_lands_on_two_days() {
    let mut input = TimetableInput {
        days: names(&["Mon", "Tue", "Wed"]),
        periods: vec![1, 2, 3],
        classes: vec![ClassInfo::new("5A", 5)],
        subjects: names(&["math", "history"]),
        teachers: names(&["Ivanov", "Kuznetsov"]),
        ..Default::default()
    };
    plan(&mut input, "5A", "math", 2, "Ivanov");
    plan(&mut input, "5A", "history", 2, "Kuznetsov");
    let timetable = solved(&input, &test_weights());

    for subject in ["math", "history"] {
        let days: BTreeSet<&str> = timetable
            .lessons
            .iter()
            .filter(|l| l.subject == subject)
            .map(|l| l.day.as_str())
            .collect();
        assert_eq!(days.len(), 2, "{subject} doubled up on one day");
    }
}

#[test]
fn incompatible_split_subjects_never_share_a_slot() {
    let mut input = TimetableInput {
        days: names(&["Mon"]),
        periods: vec![1, 2],
        classes: vec![ClassInfo::new("5A", 5)],
        subjects: names(&["eng", "cs"]),
        teachers: names(&["Sidorov", "Nikolaev", "Petrov", "Popova"]),
        split_subjects: names(&["eng", "cs"]),
        ..Default::default()
    };
    split_plan(&mut input, "5A", "eng", 1, 1, "Sidorov");
    split_plan(&mut input, "5A", "eng", 2, 1, "Nikolaev");
    split_plan(&mut input, "5A", "cs", 1, 1, "Petrov");
    split_plan(&mut input, "5A", "cs", 2, 1, "Popova");
    let timetable = solved(&input, &test_weights());

    assert_plan_conformance(&input, &timetable);
    for period in [1, 2] {
        let subjects: BTreeSet<&str> = timetable
            .lessons_at("5A", "Mon", period)
            .iter()
            .map(|l| l.subject.as_str())
            .collect();
        assert_eq!(subjects.len(), 1, "period {period}: {subjects:?}");
    }
}

#[test]
fn days_off_are_respected() {
    let mut input = small_school();
    input.days_off.insert("Ivanov".into(), names(&["Mon"]));
    let timetable = solved(&input, &test_weights());
    assert_plan_conformance(&input, &timetable);
    assert!(timetable.lessons_for_teacher("Ivanov").all(|l| l.day != "Mon"));
    assert_eq!(timetable.lessons_for_teacher("Ivanov").count(), 6);
}

#[test]
fn impossible_plan_reports_infeasible_status() {
    // Every slot is reachable on its own, but the two-hour rule needs two
    // days and the teacher only works one.
    let mut input = TimetableInput {
        days: names(&["Mon", "Tue"]),
        periods: vec![1, 2, 3],
        classes: vec![ClassInfo::new("5A", 5)],
        subjects: names(&["math"]),
        teachers: names(&["Ivanov"]),
        ..Default::default()
    };
    plan(&mut input, "5A", "math", 2, "Ivanov");
    input.days_off.insert("Ivanov".into(), names(&["Tue"]));

    let report = solve(&input, &test_weights()).unwrap();
    assert_eq!(report.status, SolveStatus::Infeasible);
    assert!(report.timetable.is_none());
    assert!(report.stats.is_none());
}

#[test]
fn lexicographic_mode_never_loses_on_the_primary_term() {
    let input = small_school();
    let exact = OptimizationWeights {
        relative_gap_limit: 0.0,
        ..test_weights()
    };

    let weighted = solve(&input, &exact).unwrap();
    let lexico = solve(
        &input,
        &OptimizationWeights {
            use_lexico: true,
            lexico_primary: LexicoPrimary::TeacherWindows,
            ..exact.clone()
        },
    )
    .unwrap();

    assert_eq!(lexico.phases.len(), 2);
    let weighted_envelope = teacher_envelope(weighted.timetable.as_ref().unwrap());
    let lexico_envelope = teacher_envelope(lexico.timetable.as_ref().unwrap());
    assert!(lexico_envelope <= weighted_envelope);
    assert_eq!(lexico.primary_objective_value, Some(lexico_envelope as f64));
    // The second phase keeps the optimum proven by the first.
    assert_eq!(
        lexico.phases[0].objective_value.map(f64::round),
        lexico.primary_objective_value
    );
    assert_plan_conformance(&input, lexico.timetable.as_ref().unwrap());
}

#[test]
fn class_windows_can_lead_the_lexicographic_order() {
    let input = small_school();
    let exact = OptimizationWeights {
        relative_gap_limit: 0.0,
        ..test_weights()
    };

    let weighted = solve(&input, &exact).unwrap();
    let lexico = solve(
        &input,
        &OptimizationWeights {
            use_lexico: true,
            lexico_primary: LexicoPrimary::ClassWindows,
            ..exact.clone()
        },
    )
    .unwrap();

    assert_eq!(lexico.status, SolveStatus::Optimal);
    assert_eq!(lexico.phases.len(), 2);
    let weighted_envelope = class_envelope(weighted.timetable.as_ref().unwrap());
    let lexico_envelope = class_envelope(lexico.timetable.as_ref().unwrap());
    assert!(lexico_envelope <= weighted_envelope);
    assert_eq!(lexico.primary_objective_value, Some(lexico_envelope as f64));
    assert_eq!(
        lexico.phases[0].objective_value.map(f64::round),
        lexico.primary_objective_value
    );
    assert_plan_conformance(&input, lexico.timetable.as_ref().unwrap());
}

#[test]
fn time_limit_without_incumbent_is_not_trusted() {
    let input = sample_input();
    let weights = OptimizationWeights {
        time_limit_s: Some(1e-6),
        ..test_weights()
    };
    let report = solve(&input, &weights).unwrap();

    assert!(
        matches!(report.status, SolveStatus::Feasible | SolveStatus::Unknown),
        "status {}",
        report.status
    );
    match report.status {
        SolveStatus::Feasible => {
            assert_plan_conformance(&input, report.timetable.as_ref().unwrap())
        }
        _ => assert!(report.timetable.is_none()),
    }
}
