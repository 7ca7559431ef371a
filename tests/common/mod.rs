#![allow(dead_code)]

use school_timetable::OptimizationWeights;
use school_timetable::data::{
    ClassInfo, ClassSlot, ClassSlotWeight, ClassSubjectDayWeight, PlanEntry, ScheduledLesson,
    SlotRef, SubgroupPlanEntry, SubgroupTeacherAssignment, TeacherAssignment, TeacherSlotWeight,
    Timetable, TimetableInput,
};
use std::collections::{BTreeMap, BTreeSet};

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn plan(input: &mut TimetableInput, class: &str, subject: &str, hours: u32, teacher: &str) {
    input.plan_hours.push(PlanEntry {
        class: class.into(),
        subject: subject.into(),
        hours,
    });
    input.assigned_teachers.push(TeacherAssignment {
        class: class.into(),
        subject: subject.into(),
        teacher: teacher.into(),
    });
}

pub fn split_plan(
    input: &mut TimetableInput,
    class: &str,
    subject: &str,
    subgroup: u32,
    hours: u32,
    teacher: &str,
) {
    input.subgroup_plan_hours.push(SubgroupPlanEntry {
        class: class.into(),
        subject: subject.into(),
        subgroup,
        hours,
    });
    input
        .subgroup_assigned_teachers
        .push(SubgroupTeacherAssignment {
            class: class.into(),
            subject: subject.into(),
            subgroup,
            teacher: teacher.into(),
        });
}

/// Deterministic, single-threaded solver settings for tests.
pub fn test_weights() -> OptimizationWeights {
    OptimizationWeights {
        num_search_workers: 1,
        random_seed: Some(42),
        time_limit_s: Some(60.0),
        ..Default::default()
    }
}

/// Three classes over a 5 x 7 week with split English, CS and labor.
pub fn sample_input() -> TimetableInput {
    let mut input = TimetableInput {
        days: names(&["Mon", "Tue", "Wed", "Thu", "Fri"]),
        periods: (1..=7).collect(),
        classes: vec![
            ClassInfo::new("5A", 5),
            ClassInfo::new("5B", 5),
            ClassInfo::new("2A", 2),
        ],
        subjects: names(&["math", "cs", "eng", "labor", "PE", "history", "music"]),
        teachers: names(&[
            "Ivanov",
            "Petrov",
            "Sidorov",
            "Nikolaev",
            "Smirnov",
            "Kuznetsov",
            "Orlova",
            "Volkov",
        ]),
        split_subjects: names(&["eng", "cs", "labor"]),
        ..Default::default()
    };

    for class in ["5A", "5B"] {
        plan(&mut input, class, "math", 2, "Ivanov");
        plan(&mut input, class, "PE", 1, "Smirnov");
        plan(&mut input, class, "history", 1, "Kuznetsov");
        plan(&mut input, class, "music", 1, "Orlova");
        split_plan(&mut input, class, "eng", 1, 1, "Sidorov");
        split_plan(&mut input, class, "eng", 2, 1, "Nikolaev");
        split_plan(&mut input, class, "cs", 1, 1, "Petrov");
        split_plan(&mut input, class, "cs", 2, 1, "Petrov");
        split_plan(&mut input, class, "labor", 1, 2, "Smirnov");
        split_plan(&mut input, class, "labor", 2, 2, "Volkov");
    }
    split_plan(&mut input, "2A", "eng", 1, 1, "Sidorov");
    split_plan(&mut input, "2A", "eng", 2, 1, "Nikolaev");

    input.days_off.insert("Petrov".into(), names(&["Mon"]));
    input
        .teacher_forbidden_slots
        .insert("Petrov".into(), vec![SlotRef::new("Tue", 1)]);
    input
        .teacher_forbidden_slots
        .insert("Nikolaev".into(), vec![SlotRef::new("Thu", 7)]);
    input.forbidden_slots.push(ClassSlot {
        class: "5A".into(),
        day: "Mon".into(),
        period: 1,
    });

    input.grade_max_lessons_per_day = BTreeMap::from([(5, 7), (2, 4)]);
    input.subjects_not_last_lesson = BTreeMap::from([(5, names(&["math"]))]);
    input.elementary_english_periods = vec![2, 3, 4];
    input.grade_subject_max_consecutive_days = BTreeMap::from([(
        5,
        BTreeMap::from([("PE".to_string(), 2), ("eng".to_string(), 2)]),
    )]);

    input.class_slot_weights = vec![
        ClassSlotWeight {
            class: "5A".into(),
            day: "Fri".into(),
            period: 7,
            weight: 10.0,
        },
        ClassSlotWeight {
            class: "5A".into(),
            day: "Fri".into(),
            period: 6,
            weight: 5.0,
        },
    ];
    input.teacher_slot_weights = vec![TeacherSlotWeight {
        teacher: "Petrov".into(),
        day: "Tue".into(),
        period: 2,
        weight: 8.0,
    }];
    input.class_subject_day_weights = vec![ClassSubjectDayWeight {
        class: "5B".into(),
        subject: "math".into(),
        day: "Mon".into(),
        weight: 6.0,
    }];

    input.compatible_pairs = vec![
        ("cs".into(), "eng".into()),
        ("eng".into(), "labor".into()),
        ("cs".into(), "labor".into()),
    ];
    input.paired_subjects = names(&["labor"]);
    input.must_sync_split_subjects = names(&["labor"]);
    input
}

/// Two classes over three days of four periods; small enough to solve to
/// proven optimality quickly.
pub fn small_school() -> TimetableInput {
    let mut input = TimetableInput {
        days: names(&["Mon", "Tue", "Wed"]),
        periods: vec![1, 2, 3, 4],
        classes: vec![ClassInfo::new("5A", 5), ClassInfo::new("5B", 5)],
        subjects: names(&["math", "history", "eng"]),
        teachers: names(&["Ivanov", "Kuznetsov", "Sidorov", "Nikolaev"]),
        split_subjects: names(&["eng"]),
        ..Default::default()
    };
    for class in ["5A", "5B"] {
        plan(&mut input, class, "math", 3, "Ivanov");
        plan(&mut input, class, "history", 2, "Kuznetsov");
        split_plan(&mut input, class, "eng", 1, 1, "Sidorov");
        split_plan(&mut input, class, "eng", 2, 1, "Nikolaev");
    }
    input
}

fn envelope<'a>(
    timetable: &'a Timetable,
    owner: impl Fn(&'a ScheduledLesson) -> Option<&'a str>,
) -> usize {
    let mut days: BTreeMap<(&str, &str), BTreeSet<usize>> = BTreeMap::new();
    for lesson in &timetable.lessons {
        let Some(owner) = owner(lesson) else {
            continue;
        };
        let position = timetable
            .periods
            .iter()
            .position(|p| *p == lesson.period)
            .unwrap();
        days.entry((owner, lesson.day.as_str()))
            .or_default()
            .insert(position);
    }
    days.values()
        .map(|busy| busy.last().unwrap() - busy.first().unwrap() + 1)
        .sum()
}

/// Summed first-to-last period span of every teacher day.
pub fn teacher_envelope(timetable: &Timetable) -> usize {
    envelope(timetable, |lesson| lesson.teacher.as_deref())
}

/// Summed first-to-last period span of every class day.
pub fn class_envelope(timetable: &Timetable) -> usize {
    envelope(timetable, |lesson| Some(lesson.class.as_str()))
}
