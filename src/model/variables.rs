use good_lp::Variable;
use std::collections::BTreeMap;

use crate::model::TimetableModel;
use crate::problem::{
    ClassId, DayId, LessonStream, Problem, Requirement, Slot, SubjectId, SubjectKind, TeacherId,
};

/// Handles of all decision variables of the model.
///
/// Lesson variables exist only at reachable slots; a missing lesson
/// variable is the constant 0 wherever it would have appeared.
#[derive(Debug, Default)]
pub struct VariableIndex {
    lessons: BTreeMap<LessonStream, BTreeMap<Slot, Variable>>,
    by_class_slot: BTreeMap<(ClassId, Slot), Vec<(LessonStream, Variable)>>,
    by_teacher_slot: BTreeMap<(TeacherId, Slot), Vec<Variable>>,
    occupied: BTreeMap<(ClassId, Slot), Variable>,
    presence: BTreeMap<(ClassId, SubjectId, Slot), Variable>,
    day_presence: BTreeMap<(ClassId, SubjectId, DayId), Variable>,
}

/// Whether a lesson of `req` may take place in `slot` at all.
pub fn is_reachable(problem: &Problem, req: &Requirement, slot: Slot) -> bool {
    let class = req.stream.class;
    if problem.is_forbidden(class, slot) {
        return false;
    }
    if let Some(teacher) = req.teacher {
        if !problem.teacher_available(teacher, slot) {
            return false;
        }
    }
    if problem.restricts_english(class)
        && problem.english_subject() == Some(req.stream.subject)
        && !problem.is_english_period(slot.period)
    {
        return false;
    }
    true
}

impl VariableIndex {
    pub fn allocate(problem: &Problem, model: &mut TimetableModel) -> Self {
        let mut index = Self::default();

        for req in problem.active_requirements() {
            let mut slots = BTreeMap::new();
            for slot in problem.slots().filter(|&s| is_reachable(problem, req, s)) {
                let var = model.add_binary();
                slots.insert(slot, var);
                index
                    .by_class_slot
                    .entry((req.stream.class, slot))
                    .or_default()
                    .push((req.stream, var));
                if let Some(teacher) = req.teacher {
                    index
                        .by_teacher_slot
                        .entry((teacher, slot))
                        .or_default()
                        .push(var);
                }
            }
            index.lessons.insert(req.stream, slots);
        }

        for class in problem.class_ids() {
            for slot in problem.slots() {
                index.occupied.insert((class, slot), model.add_binary());
            }
        }

        let split_keys: Vec<(ClassId, SubjectId, Slot)> = index
            .by_class_slot
            .iter()
            .flat_map(|(&(class, slot), lessons)| {
                lessons
                    .iter()
                    .filter(|(stream, _)| stream.subgroup.is_some())
                    .map(move |(stream, _)| (class, stream.subject, slot))
            })
            .collect();
        for key in split_keys {
            if !index.presence.contains_key(&key) {
                index.presence.insert(key, model.add_binary());
            }
        }

        for class in problem.class_ids() {
            let Some(limits) = problem.max_consecutive_days(class) else {
                continue;
            };
            for &subject in limits.keys() {
                for day in problem.day_ids() {
                    if index.subject_day_flags(problem, class, subject, day).next().is_some() {
                        index
                            .day_presence
                            .insert((class, subject, day), model.add_binary());
                    }
                }
            }
        }

        index
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.values().map(BTreeMap::len).sum()
    }

    pub fn lesson(&self, stream: &LessonStream, slot: Slot) -> Option<Variable> {
        self.lessons.get(stream)?.get(&slot).copied()
    }

    /// Reachable slots of a stream in slot order.
    pub fn stream_lessons(
        &self,
        stream: &LessonStream,
    ) -> impl Iterator<Item = (Slot, Variable)> + '_ {
        self.lessons
            .get(stream)
            .into_iter()
            .flat_map(|slots| slots.iter().map(|(&s, &v)| (s, v)))
    }

    /// Every lesson variable, ordered by stream then slot.
    pub fn lessons(&self) -> impl Iterator<Item = (LessonStream, Slot, Variable)> + '_ {
        self.lessons
            .iter()
            .flat_map(|(&stream, slots)| slots.iter().map(move |(&s, &v)| (stream, s, v)))
    }

    /// Streams that own lesson variables (positive hours).
    pub fn streams(&self) -> impl Iterator<Item = LessonStream> + '_ {
        self.lessons.keys().copied()
    }

    pub fn class_lessons_at(&self, class: ClassId, slot: Slot) -> &[(LessonStream, Variable)] {
        self.by_class_slot
            .get(&(class, slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn teacher_lessons_at(&self, teacher: TeacherId, slot: Slot) -> &[Variable] {
        self.by_teacher_slot
            .get(&(teacher, slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn occupied(&self, class: ClassId, slot: Slot) -> Option<Variable> {
        self.occupied.get(&(class, slot)).copied()
    }

    pub fn occupancy(&self) -> impl Iterator<Item = ((ClassId, Slot), Variable)> + '_ {
        self.occupied.iter().map(|(&k, &v)| (k, v))
    }

    pub fn presence(&self, class: ClassId, subject: SubjectId, slot: Slot) -> Option<Variable> {
        self.presence.get(&(class, subject, slot)).copied()
    }

    pub fn presences(&self) -> impl Iterator<Item = ((ClassId, SubjectId, Slot), Variable)> + '_ {
        self.presence.iter().map(|(&k, &v)| (k, v))
    }

    pub fn day_presence(&self, class: ClassId, subject: SubjectId, day: DayId) -> Option<Variable> {
        self.day_presence.get(&(class, subject, day)).copied()
    }

    pub fn day_presences(
        &self,
    ) -> impl Iterator<Item = ((ClassId, SubjectId, DayId), Variable)> + '_ {
        self.day_presence.iter().map(|(&k, &v)| (k, v))
    }

    /// The 0/1 flag telling whether `subject` takes place for `class` in
    /// `slot`: the lesson itself for whole-class subjects, the presence flag
    /// for split ones.
    pub fn subject_flag(
        &self,
        problem: &Problem,
        class: ClassId,
        subject: SubjectId,
        slot: Slot,
    ) -> Option<Variable> {
        match problem.subject(subject).kind {
            SubjectKind::WholeClass => self.lesson(
                &LessonStream {
                    class,
                    subject,
                    subgroup: None,
                },
                slot,
            ),
            SubjectKind::Split => self.presence(class, subject, slot),
        }
    }

    /// Subject flags of one day, in period order.
    pub fn subject_day_flags<'a>(
        &'a self,
        problem: &'a Problem,
        class: ClassId,
        subject: SubjectId,
        day: DayId,
    ) -> impl Iterator<Item = Variable> + 'a {
        problem
            .period_ids()
            .filter_map(move |period| {
                self.subject_flag(problem, class, subject, Slot { day, period })
            })
    }
}
