use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A class with its grade (parallel). Grades start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassInfo {
    pub name: String,
    pub grade: u32,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>, grade: u32) -> Self {
        Self {
            name: name.into(),
            grade,
        }
    }
}

/// Weekly hours of a whole-class (non-split) subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlanEntry {
    pub class: String,
    pub subject: String,
    pub hours: u32,
}

/// Weekly hours of one subgroup for a split subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubgroupPlanEntry {
    pub class: String,
    pub subject: String,
    pub subgroup: u32,
    pub hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeacherAssignment {
    pub class: String,
    pub subject: String,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubgroupTeacherAssignment {
    pub class: String,
    pub subject: String,
    pub subgroup: u32,
    pub teacher: String,
}

/// A (day, period) pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlotRef {
    pub day: String,
    pub period: u32,
}

impl SlotRef {
    pub fn new(day: impl Into<String>, period: u32) -> Self {
        Self {
            day: day.into(),
            period,
        }
    }
}

/// A slot in which a class may not have any lesson.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassSlot {
    pub class: String,
    pub day: String,
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassSlotWeight {
    pub class: String,
    pub day: String,
    pub period: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TeacherSlotWeight {
    pub teacher: String,
    pub day: String,
    pub period: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassSubjectDayWeight {
    pub class: String,
    pub subject: String,
    pub day: String,
    pub weight: f64,
}

fn default_subgroup_ids() -> Vec<u32> {
    vec![1, 2]
}

fn default_english_subject() -> String {
    "eng".to_string()
}

/// The complete input of the timetabling problem, as handed over by a loader.
///
/// Composite keys are flat records instead of tuple-keyed maps so the
/// structure survives a JSON round trip. Soft weights are signed: positive
/// values penalize, negative values reward.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableInput {
    pub days: Vec<String>,
    pub periods: Vec<u32>,
    pub classes: Vec<ClassInfo>,
    pub subjects: Vec<String>,
    pub teachers: Vec<String>,

    #[serde(default)]
    pub split_subjects: Vec<String>,
    #[serde(default = "default_subgroup_ids")]
    pub subgroup_ids: Vec<u32>,

    #[serde(default)]
    pub plan_hours: Vec<PlanEntry>,
    #[serde(default)]
    pub subgroup_plan_hours: Vec<SubgroupPlanEntry>,
    #[serde(default)]
    pub assigned_teachers: Vec<TeacherAssignment>,
    #[serde(default)]
    pub subgroup_assigned_teachers: Vec<SubgroupTeacherAssignment>,

    /// teacher -> days without lessons
    #[serde(default)]
    pub days_off: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub teacher_forbidden_slots: BTreeMap<String, Vec<SlotRef>>,
    #[serde(default)]
    pub forbidden_slots: Vec<ClassSlot>,

    /// Unordered pairs of distinct split subjects that may share a slot.
    #[serde(default)]
    pub compatible_pairs: Vec<(String, String)>,
    #[serde(default)]
    pub must_sync_split_subjects: Vec<String>,
    #[serde(default)]
    pub paired_subjects: Vec<String>,

    #[serde(default)]
    pub grade_max_lessons_per_day: BTreeMap<u32, u32>,
    #[serde(default)]
    pub subjects_not_last_lesson: BTreeMap<u32, Vec<String>>,
    #[serde(default)]
    pub elementary_english_periods: Vec<u32>,
    #[serde(default = "default_english_subject")]
    pub english_subject_name: String,
    /// grade -> subject -> maximum number of consecutive days with the subject
    #[serde(default)]
    pub grade_subject_max_consecutive_days: BTreeMap<u32, BTreeMap<String, u32>>,
    /// class -> subject -> maximum slots per day
    #[serde(default)]
    pub max_repeats_per_day: BTreeMap<String, BTreeMap<String, u32>>,

    #[serde(default)]
    pub class_slot_weights: Vec<ClassSlotWeight>,
    #[serde(default)]
    pub teacher_slot_weights: Vec<TeacherSlotWeight>,
    #[serde(default)]
    pub class_subject_day_weights: Vec<ClassSubjectDayWeight>,
}

impl Default for TimetableInput {
    fn default() -> Self {
        Self {
            days: Vec::new(),
            periods: Vec::new(),
            classes: Vec::new(),
            subjects: Vec::new(),
            teachers: Vec::new(),
            split_subjects: Vec::new(),
            subgroup_ids: default_subgroup_ids(),
            plan_hours: Vec::new(),
            subgroup_plan_hours: Vec::new(),
            assigned_teachers: Vec::new(),
            subgroup_assigned_teachers: Vec::new(),
            days_off: BTreeMap::new(),
            teacher_forbidden_slots: BTreeMap::new(),
            forbidden_slots: Vec::new(),
            compatible_pairs: Vec::new(),
            must_sync_split_subjects: Vec::new(),
            paired_subjects: Vec::new(),
            grade_max_lessons_per_day: BTreeMap::new(),
            subjects_not_last_lesson: BTreeMap::new(),
            elementary_english_periods: Vec::new(),
            english_subject_name: default_english_subject(),
            grade_subject_max_consecutive_days: BTreeMap::new(),
            max_repeats_per_day: BTreeMap::new(),
            class_slot_weights: Vec::new(),
            teacher_slot_weights: Vec::new(),
            class_subject_day_weights: Vec::new(),
        }
    }
}

/// Outcome of a solve, independent of the backend in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolveStatus {
    /// Whether the status carries a usable timetable.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A single lesson placed in the timetable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ScheduledLesson {
    pub class: String,
    pub day: String,
    pub period: u32,
    pub subject: String,
    /// `None` for whole-class lessons.
    pub subgroup: Option<u32>,
    pub teacher: Option<String>,
}

/// Lessons of a solved timetable, sorted by class, day position and period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub days: Vec<String>,
    pub periods: Vec<u32>,
    pub lessons: Vec<ScheduledLesson>,
}

impl Timetable {
    pub fn lessons_for_class<'a>(
        &'a self,
        class: &'a str,
    ) -> impl Iterator<Item = &'a ScheduledLesson> + 'a {
        self.lessons.iter().filter(move |l| l.class == class)
    }

    pub fn lessons_for_teacher<'a>(
        &'a self,
        teacher: &'a str,
    ) -> impl Iterator<Item = &'a ScheduledLesson> + 'a {
        self.lessons
            .iter()
            .filter(move |l| l.teacher.as_deref() == Some(teacher))
    }

    /// Everything a class has in one slot: one whole-class lesson or up to
    /// one lesson per subgroup.
    pub fn lessons_at(&self, class: &str, day: &str, period: u32) -> Vec<&ScheduledLesson> {
        self.lessons
            .iter()
            .filter(|l| l.class == class && l.day == day && l.period == period)
            .collect()
    }

    /// Number of slots holding `subject` for `class` (and `subgroup`, if any).
    pub fn count(&self, class: &str, subject: &str, subgroup: Option<u32>) -> usize {
        self.lessons
            .iter()
            .filter(|l| l.class == class && l.subject == subject && l.subgroup == subgroup)
            .count()
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// Statistics recomputed from the placed lessons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableStats {
    pub total_lessons: usize,
    pub total_lonely_lessons: usize,
    pub total_teacher_gaps: usize,
    pub total_class_gaps: usize,
    pub tail_lessons: usize,
}

/// Which optimisation pass produced a phase summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolvePhase {
    WeightedSum,
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSummary {
    pub phase: SolvePhase,
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
}

/// Size of the constraint model handed to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSize {
    pub variables: usize,
    pub binary_variables: usize,
    pub constraints: usize,
}

/// The final output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveReport {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// Value of the lexicographic primary term in the reported solution.
    pub primary_objective_value: Option<f64>,
    pub phases: Vec<PhaseSummary>,
    pub model_size: ModelSize,
    pub timetable: Option<Timetable>,
    pub stats: Option<TimetableStats>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}
