use thiserror::Error;

use crate::config::ConfigError;
use crate::validate::InfeasibilityReport;

/// A dangling reference or violated range/type invariant in the input data.
///
/// Raised while the indexed [`Problem`](crate::problem::Problem) is built;
/// always fatal and always names the offending key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("the {0} list is empty")]
    EmptyDomain(&'static str),

    #[error("duplicate {entity} `{key}`")]
    Duplicate { entity: &'static str, key: String },

    #[error("{context} references unknown {entity} `{key}`")]
    UnknownReference {
        context: &'static str,
        entity: &'static str,
        key: String,
    },

    #[error("class `{class}` has grade {grade}; grades start at 1")]
    InvalidGrade { class: String, grade: u32 },

    #[error("periods must be strictly increasing, found {previous} followed by {next}")]
    UnorderedPeriods { previous: u32, next: u32 },

    #[error("{context} for `{class}`/`{subject}` requires a split subject")]
    ExpectedSplitSubject {
        context: &'static str,
        class: String,
        subject: String,
    },

    #[error(
        "{context} for `{class}`/`{subject}` requires a non-split subject; \
         split subjects are planned per subgroup"
    )]
    ExpectedWholeClassSubject {
        context: &'static str,
        class: String,
        subject: String,
    },

    #[error("compatible pair (`{0}`, `{1}`) must name two distinct subjects")]
    DegeneratePair(String, String),
}

/// Top-level error of the timetabling pipeline.
///
/// Solver outcomes such as `INFEASIBLE` or `UNKNOWN` are not errors; they are
/// reported through [`SolveStatus`](crate::data::SolveStatus).
#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("invalid input data: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error(transparent)]
    Infeasible(#[from] InfeasibilityReport),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
