//! Indexed, strongly typed form of the timetabling input.
//!
//! Every name in [`TimetableInput`] is resolved once into a small integer
//! handle; the rest of the pipeline never looks anything up by string.

use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::data::TimetableInput;
use crate::error::DataIntegrityError;

macro_rules! index_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_handle!(DayId);
index_handle!(
    /// Position of a period within the day, not the period number itself.
    PeriodId
);
index_handle!(ClassId);
index_handle!(SubjectId);
index_handle!(TeacherId);
index_handle!(SubgroupId);

/// The atomic scheduling unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub day: DayId,
    pub period: PeriodId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// Taught to the whole class at once.
    WholeClass,
    /// Taught separately to every subgroup.
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    pub kind: SubjectKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: String,
    pub grade: u32,
}

/// One independently scheduled sequence of lessons: a whole-class subject,
/// or one subgroup of a split subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LessonStream {
    pub class: ClassId,
    pub subject: SubjectId,
    pub subgroup: Option<SubgroupId>,
}

/// Weekly hours of a stream and the teacher in charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub stream: LessonStream,
    pub hours: u32,
    pub teacher: Option<TeacherId>,
}

/// A soft-preference table with a total lookup.
///
/// Keys that were never set resolve to the table default instead of being
/// silently treated as absent.
#[derive(Debug, Clone)]
pub struct WeightTable<K> {
    entries: HashMap<K, f64>,
    default: f64,
}

impl<K: Eq + Hash> PartialEq for WeightTable<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.default == other.default
    }
}

impl<K: Eq + Hash> WeightTable<K> {
    pub fn new(default: f64) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    pub fn weight(&self, key: &K) -> f64 {
        self.entries.get(key).copied().unwrap_or(self.default)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: K, weight: f64) -> bool {
        self.entries.insert(key, weight).is_none()
    }
}

/// Grades whose English lessons are bound to the elementary English periods
/// and whose subjects may not sit in two adjacent periods.
pub const ELEMENTARY_GRADES: std::ops::RangeInclusive<u32> = 2..=4;

#[derive(Debug, Clone)]
pub struct Problem {
    days: Vec<String>,
    periods: Vec<u32>,
    classes: Vec<Class>,
    subjects: Vec<Subject>,
    teachers: Vec<String>,
    subgroups: Vec<u32>,

    requirements: Vec<Requirement>,
    requirement_index: HashMap<LessonStream, usize>,

    days_off: HashSet<(TeacherId, DayId)>,
    teacher_forbidden: HashSet<(TeacherId, Slot)>,
    forbidden: HashSet<(ClassId, Slot)>,

    compatible_pairs: HashSet<(SubjectId, SubjectId)>,
    must_sync: BTreeSet<SubjectId>,
    paired: BTreeSet<SubjectId>,

    grade_max_lessons: BTreeMap<u32, u32>,
    not_last_lesson: BTreeMap<u32, BTreeSet<SubjectId>>,
    english: Option<SubjectId>,
    english_periods: BTreeSet<PeriodId>,
    max_consecutive_days: BTreeMap<u32, BTreeMap<SubjectId, u32>>,
    max_repeats_per_day: BTreeMap<(ClassId, SubjectId), u32>,

    class_slot_weights: WeightTable<(ClassId, Slot)>,
    teacher_slot_weights: WeightTable<(TeacherId, Slot)>,
    class_subject_day_weights: WeightTable<(ClassId, SubjectId, DayId)>,
}

/// Resolves names of one base set to handles.
struct NameIndex<'a> {
    entity: &'static str,
    ids: HashMap<&'a str, usize>,
}

impl<'a> NameIndex<'a> {
    fn build(
        entity: &'static str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DataIntegrityError> {
        let mut ids = HashMap::new();
        for (index, name) in names.into_iter().enumerate() {
            if ids.insert(name, index).is_some() {
                return Err(DataIntegrityError::Duplicate {
                    entity,
                    key: name.to_string(),
                });
            }
        }
        Ok(Self { entity, ids })
    }

    fn resolve(&self, context: &'static str, name: &str) -> Result<usize, DataIntegrityError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| DataIntegrityError::UnknownReference {
                context,
                entity: self.entity,
                key: name.to_string(),
            })
    }
}

struct Resolver<'a> {
    days: NameIndex<'a>,
    classes: NameIndex<'a>,
    subjects: NameIndex<'a>,
    teachers: NameIndex<'a>,
    periods: HashMap<u32, usize>,
    subgroups: HashMap<u32, usize>,
}

impl Resolver<'_> {
    fn day(&self, context: &'static str, name: &str) -> Result<DayId, DataIntegrityError> {
        self.days.resolve(context, name).map(DayId::new)
    }

    fn class(&self, context: &'static str, name: &str) -> Result<ClassId, DataIntegrityError> {
        self.classes.resolve(context, name).map(ClassId::new)
    }

    fn subject(&self, context: &'static str, name: &str) -> Result<SubjectId, DataIntegrityError> {
        self.subjects.resolve(context, name).map(SubjectId::new)
    }

    fn teacher(&self, context: &'static str, name: &str) -> Result<TeacherId, DataIntegrityError> {
        self.teachers.resolve(context, name).map(TeacherId::new)
    }

    fn period(&self, context: &'static str, period: u32) -> Result<PeriodId, DataIntegrityError> {
        self.periods
            .get(&period)
            .map(|&i| PeriodId::new(i))
            .ok_or_else(|| DataIntegrityError::UnknownReference {
                context,
                entity: "period",
                key: period.to_string(),
            })
    }

    fn subgroup(&self, context: &'static str, id: u32) -> Result<SubgroupId, DataIntegrityError> {
        self.subgroups
            .get(&id)
            .map(|&i| SubgroupId::new(i))
            .ok_or_else(|| DataIntegrityError::UnknownReference {
                context,
                entity: "subgroup",
                key: id.to_string(),
            })
    }

    fn slot(
        &self,
        context: &'static str,
        day: &str,
        period: u32,
    ) -> Result<Slot, DataIntegrityError> {
        Ok(Slot {
            day: self.day(context, day)?,
            period: self.period(context, period)?,
        })
    }
}

impl Problem {
    /// Resolves every reference of `input`, failing on the first dangling key.
    pub fn from_input(input: &TimetableInput) -> Result<Self, DataIntegrityError> {
        for (entity, empty) in [
            ("day", input.days.is_empty()),
            ("period", input.periods.is_empty()),
            ("class", input.classes.is_empty()),
        ] {
            if empty {
                return Err(DataIntegrityError::EmptyDomain(entity));
            }
        }
        for (previous, next) in input.periods.iter().tuple_windows() {
            if next <= previous {
                return Err(DataIntegrityError::UnorderedPeriods {
                    previous: *previous,
                    next: *next,
                });
            }
        }

        let resolver = Resolver {
            days: NameIndex::build("day", input.days.iter().map(String::as_str))?,
            classes: NameIndex::build("class", input.classes.iter().map(|c| c.name.as_str()))?,
            subjects: NameIndex::build("subject", input.subjects.iter().map(String::as_str))?,
            teachers: NameIndex::build("teacher", input.teachers.iter().map(String::as_str))?,
            periods: input.periods.iter().enumerate().map(|(i, &p)| (p, i)).collect(),
            subgroups: unique_positions("subgroup", &input.subgroup_ids)?,
        };

        let classes = input
            .classes
            .iter()
            .map(|c| {
                if c.grade == 0 {
                    return Err(DataIntegrityError::InvalidGrade {
                        class: c.name.clone(),
                        grade: c.grade,
                    });
                }
                Ok(Class {
                    name: c.name.clone(),
                    grade: c.grade,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut split = HashSet::new();
        for name in &input.split_subjects {
            let subject = resolver.subject("split subjects", name)?;
            if !split.insert(subject) {
                return Err(DataIntegrityError::Duplicate {
                    entity: "split subject",
                    key: name.clone(),
                });
            }
        }
        let subjects: Vec<Subject> = input
            .subjects
            .iter()
            .enumerate()
            .map(|(i, name)| Subject {
                name: name.clone(),
                kind: if split.contains(&SubjectId::new(i)) {
                    SubjectKind::Split
                } else {
                    SubjectKind::WholeClass
                },
            })
            .collect();
        let kind_of = |s: SubjectId| subjects[s.index()].kind;

        let mut requirements: Vec<Requirement> = Vec::new();
        let mut requirement_index = HashMap::new();
        for entry in &input.plan_hours {
            let class = resolver.class("plan hours", &entry.class)?;
            let subject = resolver.subject("plan hours", &entry.subject)?;
            if kind_of(subject) == SubjectKind::Split {
                return Err(DataIntegrityError::ExpectedWholeClassSubject {
                    context: "plan hours",
                    class: entry.class.clone(),
                    subject: entry.subject.clone(),
                });
            }
            let stream = LessonStream {
                class,
                subject,
                subgroup: None,
            };
            push_requirement(
                &mut requirements,
                &mut requirement_index,
                stream,
                entry.hours,
                || format!("{}/{}", entry.class, entry.subject),
            )?;
        }
        for entry in &input.subgroup_plan_hours {
            let class = resolver.class("subgroup plan hours", &entry.class)?;
            let subject = resolver.subject("subgroup plan hours", &entry.subject)?;
            let subgroup = resolver.subgroup("subgroup plan hours", entry.subgroup)?;
            if kind_of(subject) != SubjectKind::Split {
                return Err(DataIntegrityError::ExpectedSplitSubject {
                    context: "subgroup plan hours",
                    class: entry.class.clone(),
                    subject: entry.subject.clone(),
                });
            }
            let stream = LessonStream {
                class,
                subject,
                subgroup: Some(subgroup),
            };
            push_requirement(
                &mut requirements,
                &mut requirement_index,
                stream,
                entry.hours,
                || format!("{}/{}/{}", entry.class, entry.subject, entry.subgroup),
            )?;
        }

        let mut assigned = HashSet::new();
        for entry in &input.assigned_teachers {
            let class = resolver.class("teacher assignment", &entry.class)?;
            let subject = resolver.subject("teacher assignment", &entry.subject)?;
            let teacher = resolver.teacher("teacher assignment", &entry.teacher)?;
            if kind_of(subject) == SubjectKind::Split {
                return Err(DataIntegrityError::ExpectedWholeClassSubject {
                    context: "teacher assignment",
                    class: entry.class.clone(),
                    subject: entry.subject.clone(),
                });
            }
            let stream = LessonStream {
                class,
                subject,
                subgroup: None,
            };
            let label = || format!("{}/{}", entry.class, entry.subject);
            assign_teacher(
                &mut requirements,
                &requirement_index,
                &mut assigned,
                stream,
                teacher,
                label,
            )?;
        }
        for entry in &input.subgroup_assigned_teachers {
            let class = resolver.class("subgroup teacher assignment", &entry.class)?;
            let subject = resolver.subject("subgroup teacher assignment", &entry.subject)?;
            let subgroup = resolver.subgroup("subgroup teacher assignment", entry.subgroup)?;
            let teacher = resolver.teacher("subgroup teacher assignment", &entry.teacher)?;
            if kind_of(subject) != SubjectKind::Split {
                return Err(DataIntegrityError::ExpectedSplitSubject {
                    context: "subgroup teacher assignment",
                    class: entry.class.clone(),
                    subject: entry.subject.clone(),
                });
            }
            let stream = LessonStream {
                class,
                subject,
                subgroup: Some(subgroup),
            };
            let label = || format!("{}/{}/{}", entry.class, entry.subject, entry.subgroup);
            assign_teacher(
                &mut requirements,
                &requirement_index,
                &mut assigned,
                stream,
                teacher,
                label,
            )?;
        }

        let mut days_off = HashSet::new();
        for (teacher, days) in &input.days_off {
            let teacher = resolver.teacher("days off", teacher)?;
            for day in days {
                days_off.insert((teacher, resolver.day("days off", day)?));
            }
        }
        let mut teacher_forbidden = HashSet::new();
        for (teacher, slots) in &input.teacher_forbidden_slots {
            let teacher = resolver.teacher("teacher forbidden slots", teacher)?;
            for slot in slots {
                teacher_forbidden.insert((
                    teacher,
                    resolver.slot("teacher forbidden slots", &slot.day, slot.period)?,
                ));
            }
        }
        let mut forbidden = HashSet::new();
        for entry in &input.forbidden_slots {
            let class = resolver.class("forbidden slots", &entry.class)?;
            forbidden.insert((class, resolver.slot("forbidden slots", &entry.day, entry.period)?));
        }

        let mut compatible_pairs = HashSet::new();
        for (a, b) in &input.compatible_pairs {
            let first = resolver.subject("compatible pairs", a)?;
            let second = resolver.subject("compatible pairs", b)?;
            if first == second {
                return Err(DataIntegrityError::DegeneratePair(a.clone(), b.clone()));
            }
            for (subject, name) in [(first, a), (second, b)] {
                if kind_of(subject) != SubjectKind::Split {
                    return Err(DataIntegrityError::ExpectedSplitSubject {
                        context: "compatible pairs",
                        class: "*".to_string(),
                        subject: name.clone(),
                    });
                }
            }
            compatible_pairs.insert(ordered_pair(first, second));
        }

        let mut must_sync = BTreeSet::new();
        for name in &input.must_sync_split_subjects {
            let subject = resolver.subject("must-sync subjects", name)?;
            if kind_of(subject) != SubjectKind::Split {
                return Err(DataIntegrityError::ExpectedSplitSubject {
                    context: "must-sync subjects",
                    class: "*".to_string(),
                    subject: name.clone(),
                });
            }
            must_sync.insert(subject);
        }
        let paired = input
            .paired_subjects
            .iter()
            .map(|name| resolver.subject("paired subjects", name))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut not_last_lesson = BTreeMap::new();
        for (&grade, names) in &input.subjects_not_last_lesson {
            let subjects = names
                .iter()
                .map(|name| resolver.subject("not-last-lesson subjects", name))
                .collect::<Result<BTreeSet<_>, _>>()?;
            not_last_lesson.insert(grade, subjects);
        }
        // An unknown English subject simply disables the elementary English rule.
        let english = resolver
            .subjects
            .ids
            .get(input.english_subject_name.as_str())
            .map(|&i| SubjectId::new(i));
        let english_periods = input
            .elementary_english_periods
            .iter()
            .map(|&p| resolver.period("elementary English periods", p))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut max_consecutive_days = BTreeMap::new();
        for (&grade, limits) in &input.grade_subject_max_consecutive_days {
            let limits = limits
                .iter()
                .map(|(name, &limit)| {
                    Ok((resolver.subject("consecutive-day limits", name)?, limit))
                })
                .collect::<Result<BTreeMap<_, _>, DataIntegrityError>>()?;
            max_consecutive_days.insert(grade, limits);
        }
        let mut max_repeats_per_day = BTreeMap::new();
        for (class_name, caps) in &input.max_repeats_per_day {
            let class = resolver.class("max repeats per day", class_name)?;
            for (subject_name, &cap) in caps {
                let subject = resolver.subject("max repeats per day", subject_name)?;
                max_repeats_per_day.insert((class, subject), cap);
            }
        }

        let mut class_slot_weights = WeightTable::new(0.0);
        for w in &input.class_slot_weights {
            let key = (
                resolver.class("class slot weights", &w.class)?,
                resolver.slot("class slot weights", &w.day, w.period)?,
            );
            if !class_slot_weights.insert(key, w.weight) {
                return Err(DataIntegrityError::Duplicate {
                    entity: "class slot weight",
                    key: format!("{}/{}/{}", w.class, w.day, w.period),
                });
            }
        }
        let mut teacher_slot_weights = WeightTable::new(0.0);
        for w in &input.teacher_slot_weights {
            let key = (
                resolver.teacher("teacher slot weights", &w.teacher)?,
                resolver.slot("teacher slot weights", &w.day, w.period)?,
            );
            if !teacher_slot_weights.insert(key, w.weight) {
                return Err(DataIntegrityError::Duplicate {
                    entity: "teacher slot weight",
                    key: format!("{}/{}/{}", w.teacher, w.day, w.period),
                });
            }
        }
        let mut class_subject_day_weights = WeightTable::new(0.0);
        for w in &input.class_subject_day_weights {
            let key = (
                resolver.class("class subject day weights", &w.class)?,
                resolver.subject("class subject day weights", &w.subject)?,
                resolver.day("class subject day weights", &w.day)?,
            );
            if !class_subject_day_weights.insert(key, w.weight) {
                return Err(DataIntegrityError::Duplicate {
                    entity: "class subject day weight",
                    key: format!("{}/{}/{}", w.class, w.subject, w.day),
                });
            }
        }

        Ok(Self {
            days: input.days.clone(),
            periods: input.periods.clone(),
            classes,
            subjects,
            teachers: input.teachers.clone(),
            subgroups: input.subgroup_ids.clone(),
            requirements,
            requirement_index,
            days_off,
            teacher_forbidden,
            forbidden,
            compatible_pairs,
            must_sync,
            paired,
            grade_max_lessons: input.grade_max_lessons_per_day.clone(),
            not_last_lesson,
            english,
            english_periods,
            max_consecutive_days,
            max_repeats_per_day,
            class_slot_weights,
            teacher_slot_weights,
            class_subject_day_weights,
        })
    }

    pub fn day_ids(&self) -> impl Iterator<Item = DayId> + use<> {
        (0..self.days.len()).map(DayId::new)
    }

    pub fn period_ids(&self) -> impl Iterator<Item = PeriodId> + use<> {
        (0..self.periods.len()).map(PeriodId::new)
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + use<> {
        (0..self.classes.len()).map(ClassId::new)
    }

    pub fn subject_ids(&self) -> impl Iterator<Item = SubjectId> + use<> {
        (0..self.subjects.len()).map(SubjectId::new)
    }

    pub fn teacher_ids(&self) -> impl Iterator<Item = TeacherId> + use<> {
        (0..self.teachers.len()).map(TeacherId::new)
    }

    pub fn subgroup_ids(&self) -> impl Iterator<Item = SubgroupId> + use<> {
        (0..self.subgroups.len()).map(SubgroupId::new)
    }

    /// All slots, day by day, in period order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + use<> {
        let periods = self.periods.len();
        self.day_ids().flat_map(move |day| {
            (0..periods).map(move |p| Slot {
                day,
                period: PeriodId::new(p),
            })
        })
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn day_name(&self, day: DayId) -> &str {
        &self.days[day.index()]
    }

    /// The period number as given in the input (e.g. 1..=7).
    pub fn period_number(&self, period: PeriodId) -> u32 {
        self.periods[period.index()]
    }

    pub fn class(&self, class: ClassId) -> &Class {
        &self.classes[class.index()]
    }

    pub fn subject(&self, subject: SubjectId) -> &Subject {
        &self.subjects[subject.index()]
    }

    pub fn teacher_name(&self, teacher: TeacherId) -> &str {
        &self.teachers[teacher.index()]
    }

    pub fn subgroup_number(&self, subgroup: SubgroupId) -> u32 {
        self.subgroups[subgroup.index()]
    }

    pub fn days(&self) -> &[String] {
        &self.days
    }

    pub fn periods(&self) -> &[u32] {
        &self.periods
    }

    /// Every plan entry, including zero-hour ones, in input order.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Plan entries that actually need lessons.
    pub fn active_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| r.hours > 0)
    }

    pub fn requirement(&self, stream: &LessonStream) -> Option<&Requirement> {
        self.requirement_index
            .get(stream)
            .map(|&i| &self.requirements[i])
    }

    /// Weekly hours of a stream; unplanned streams need zero hours.
    pub fn hours(&self, stream: &LessonStream) -> u32 {
        self.requirement(stream).map_or(0, |r| r.hours)
    }

    pub fn teacher_of(&self, stream: &LessonStream) -> Option<TeacherId> {
        self.requirement(stream).and_then(|r| r.teacher)
    }

    pub fn is_day_off(&self, teacher: TeacherId, day: DayId) -> bool {
        self.days_off.contains(&(teacher, day))
    }

    pub fn is_teacher_forbidden(&self, teacher: TeacherId, slot: Slot) -> bool {
        self.teacher_forbidden.contains(&(teacher, slot))
    }

    /// Whether the teacher can teach in the slot at all.
    pub fn teacher_available(&self, teacher: TeacherId, slot: Slot) -> bool {
        !self.is_day_off(teacher, slot.day) && !self.is_teacher_forbidden(teacher, slot)
    }

    pub fn is_forbidden(&self, class: ClassId, slot: Slot) -> bool {
        self.forbidden.contains(&(class, slot))
    }

    pub fn is_compatible(&self, a: SubjectId, b: SubjectId) -> bool {
        self.compatible_pairs.contains(&ordered_pair(a, b))
    }

    pub fn must_sync_subjects(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.must_sync.iter().copied()
    }

    pub fn is_paired(&self, subject: SubjectId) -> bool {
        self.paired.contains(&subject)
    }

    /// Daily lesson cap of a class; grades without a cap may fill every period.
    pub fn max_lessons_per_day(&self, class: ClassId) -> u32 {
        self.grade_max_lessons
            .get(&self.class(class).grade)
            .copied()
            .unwrap_or(self.periods.len() as u32)
    }

    pub fn not_last_lesson_subjects(&self, class: ClassId) -> Option<&BTreeSet<SubjectId>> {
        self.not_last_lesson.get(&self.class(class).grade)
    }

    pub fn is_elementary(&self, class: ClassId) -> bool {
        ELEMENTARY_GRADES.contains(&self.class(class).grade)
    }

    pub fn english_subject(&self) -> Option<SubjectId> {
        self.english
    }

    /// Whether English lessons of this class are bound to the elementary
    /// English periods. An empty period list leaves English unrestricted.
    pub fn restricts_english(&self, class: ClassId) -> bool {
        self.english.is_some() && !self.english_periods.is_empty() && self.is_elementary(class)
    }

    pub fn is_english_period(&self, period: PeriodId) -> bool {
        self.english_periods.contains(&period)
    }

    pub fn max_consecutive_days(&self, class: ClassId) -> Option<&BTreeMap<SubjectId, u32>> {
        self.max_consecutive_days.get(&self.class(class).grade)
    }

    pub fn max_repeats_per_day(&self) -> impl Iterator<Item = ((ClassId, SubjectId), u32)> + '_ {
        self.max_repeats_per_day.iter().map(|(&k, &v)| (k, v))
    }

    pub fn class_slot_weights(&self) -> &WeightTable<(ClassId, Slot)> {
        &self.class_slot_weights
    }

    pub fn teacher_slot_weights(&self) -> &WeightTable<(TeacherId, Slot)> {
        &self.teacher_slot_weights
    }

    pub fn class_subject_day_weights(&self) -> &WeightTable<(ClassId, SubjectId, DayId)> {
        &self.class_subject_day_weights
    }

    pub fn stream_label(&self, stream: &LessonStream) -> String {
        let class = &self.class(stream.class).name;
        let subject = &self.subject(stream.subject).name;
        match stream.subgroup {
            Some(g) => format!("{class}/{subject}/g{}", self.subgroup_number(g)),
            None => format!("{class}/{subject}"),
        }
    }
}

fn ordered_pair(a: SubjectId, b: SubjectId) -> (SubjectId, SubjectId) {
    if a <= b { (a, b) } else { (b, a) }
}

fn unique_positions(
    entity: &'static str,
    values: &[u32],
) -> Result<HashMap<u32, usize>, DataIntegrityError> {
    let mut positions = HashMap::new();
    for (i, &value) in values.iter().enumerate() {
        if positions.insert(value, i).is_some() {
            return Err(DataIntegrityError::Duplicate {
                entity,
                key: value.to_string(),
            });
        }
    }
    Ok(positions)
}

fn push_requirement(
    requirements: &mut Vec<Requirement>,
    index: &mut HashMap<LessonStream, usize>,
    stream: LessonStream,
    hours: u32,
    label: impl FnOnce() -> String,
) -> Result<(), DataIntegrityError> {
    if index.insert(stream, requirements.len()).is_some() {
        return Err(DataIntegrityError::Duplicate {
            entity: "plan entry",
            key: label(),
        });
    }
    requirements.push(Requirement {
        stream,
        hours,
        teacher: None,
    });
    Ok(())
}

/// Assignments for streams without plan hours are accepted and ignored.
fn assign_teacher(
    requirements: &mut [Requirement],
    index: &HashMap<LessonStream, usize>,
    assigned: &mut HashSet<LessonStream>,
    stream: LessonStream,
    teacher: TeacherId,
    label: impl FnOnce() -> String,
) -> Result<(), DataIntegrityError> {
    if !assigned.insert(stream) {
        return Err(DataIntegrityError::Duplicate {
            entity: "teacher assignment",
            key: label(),
        });
    }
    if let Some(&i) = index.get(&stream) {
        requirements[i].teacher = Some(teacher);
    }
    Ok(())
}
