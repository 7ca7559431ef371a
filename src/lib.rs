//! Weekly school timetable generation as a 0/1 linear program.
//!
//! [`solver::solve`] runs the whole pipeline: the input is resolved into an
//! indexed [`Problem`], checked by the pre-validator, encoded into a
//! [`model::TimetableModel`], optimised by HiGHS and turned back into a
//! [`data::Timetable`].

pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod extract;
pub mod model;
pub mod problem;
pub mod server;
pub mod solver;
pub mod validate;

pub use config::{LexicoPrimary, OptimizationWeights};
pub use data::{SolveReport, SolveStatus, Timetable, TimetableInput};
pub use error::{DataIntegrityError, TimetableError};
pub use problem::Problem;
pub use solver::{solve, solve_with_backend};
pub use validate::{InfeasibilityReport, Violation, ViolationKind};
