use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const BIND_ADDR_ENV: &str = "TIMETABLE_BIND_ADDR";
pub const WEIGHTS_FILE_ENV: &str = "TIMETABLE_WEIGHTS";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid bind address `{0}`")]
    BindAddr(String),

    #[error("invalid weights: {0}")]
    Invalid(String),
}

/// Objective optimised first in lexicographic mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicoPrimary {
    #[default]
    TeacherWindows,
    ClassWindows,
}

/// Coefficients of the composite objective plus backend tuning.
///
/// Every field has a default so a partial JSON file is a valid configuration.
/// Compactness weights apply to the summed envelope length (first to last
/// occupied period of a day, inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizationWeights {
    /// Envelope length of class days.
    pub alpha_runs: f64,
    /// Envelope length of teacher days.
    pub alpha_runs_teacher: f64,
    /// Pull lessons towards early periods.
    pub beta_early: f64,
    /// Spread between the busiest and the lightest day of a class.
    pub gamma_balance: f64,
    /// Lessons after `last_ok_period`.
    pub delta_tail: f64,
    /// Lonely lessons of subjects that prefer double periods.
    pub epsilon_pairing: f64,
    /// Scale of the user preference tables.
    pub pref_scale: f64,
    pub last_ok_period: u32,

    pub use_lexico: bool,
    pub lexico_primary: LexicoPrimary,

    pub num_search_workers: u32,
    pub random_seed: Option<u64>,
    pub time_limit_s: Option<f64>,
    pub relative_gap_limit: f64,
}

impl Default for OptimizationWeights {
    fn default() -> Self {
        Self {
            alpha_runs: 10.0,
            alpha_runs_teacher: 2.0,
            beta_early: 1.0,
            gamma_balance: 1.0,
            delta_tail: 10.0,
            epsilon_pairing: 20.0,
            pref_scale: 1.0,
            last_ok_period: 6,
            use_lexico: false,
            lexico_primary: LexicoPrimary::TeacherWindows,
            num_search_workers: 4,
            random_seed: None,
            time_limit_s: None,
            relative_gap_limit: 0.05,
        }
    }
}

impl OptimizationWeights {
    /// Loads weights from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let weights: Self = serde_json::from_str(s)?;
        weights.validate()?;
        Ok(weights)
    }

    /// Rejects negative or non-finite coefficients and nonsensical solver limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let coefficients = [
            ("alpha_runs", self.alpha_runs),
            ("alpha_runs_teacher", self.alpha_runs_teacher),
            ("beta_early", self.beta_early),
            ("gamma_balance", self.gamma_balance),
            ("delta_tail", self.delta_tail),
            ("epsilon_pairing", self.epsilon_pairing),
            ("pref_scale", self.pref_scale),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.relative_gap_limit) {
            return Err(ConfigError::Invalid(format!(
                "relative_gap_limit must lie in [0, 1], got {}",
                self.relative_gap_limit
            )));
        }
        self.time_limit()?;
        if self.num_search_workers == 0 {
            return Err(ConfigError::Invalid(
                "num_search_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn time_limit(&self) -> Result<Option<Duration>, ConfigError> {
        let Some(limit) = self.time_limit_s else {
            return Ok(None);
        };
        if limit <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_limit_s must be positive, got {limit}"
            )));
        }
        Duration::try_from_secs_f64(limit).map(Some).map_err(|e| {
            ConfigError::Invalid(format!("time_limit_s {limit} is not a usable duration: {e}"))
        })
    }

    /// Backend settings; an unusable time limit (rejected by `validate`) is
    /// dropped here.
    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            threads: self.num_search_workers,
            time_limit: self.time_limit().ok().flatten(),
            relative_gap: self.relative_gap_limit,
            random_seed: self.random_seed,
        }
    }
}

/// Tuning parameters passed to the optimisation backend on every solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub threads: u32,
    pub time_limit: Option<Duration>,
    pub relative_gap: f64,
    pub random_seed: Option<u64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        OptimizationWeights::default().solver_settings()
    }
}

/// Settings of the HTTP service, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub weights: OptimizationWeights,
}

impl ServiceConfig {
    /// Reads `TIMETABLE_BIND_ADDR` and the optional `TIMETABLE_WEIGHTS` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .map_err(|_| ConfigError::BindAddr(addr.clone()))?;
        let weights = match std::env::var(WEIGHTS_FILE_ENV) {
            Ok(path) => OptimizationWeights::load(path)?,
            Err(_) => OptimizationWeights::default(),
        };
        Ok(Self { bind_addr, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let weights =
            OptimizationWeights::from_json_str(r#"{"alphaRuns": 3, "useLexico": true}"#).unwrap();
        assert_eq!(weights.alpha_runs, 3.0);
        assert!(weights.use_lexico);
        assert_eq!(weights.lexico_primary, LexicoPrimary::TeacherWindows);
        assert_eq!(weights.delta_tail, 10.0);
        assert_eq!(weights.last_ok_period, 6);
    }

    #[test]
    fn lexico_primary_uses_snake_case() {
        let weights =
            OptimizationWeights::from_json_str(r#"{"lexicoPrimary": "class_windows"}"#).unwrap();
        assert_eq!(weights.lexico_primary, LexicoPrimary::ClassWindows);
    }

    #[test]
    fn negative_coefficient_is_rejected() {
        let err = OptimizationWeights::from_json_str(r#"{"betaEarly": -1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("beta_early")));
    }

    #[test]
    fn oversized_time_limit_is_rejected() {
        let err = OptimizationWeights::from_json_str(r#"{"timeLimitS": 1e20}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("time_limit_s")));

        let weights = OptimizationWeights {
            time_limit_s: Some(1e20),
            ..Default::default()
        };
        assert!(weights.validate().is_err());
        assert_eq!(weights.solver_settings().time_limit, None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let weights = OptimizationWeights {
            num_search_workers: 0,
            ..Default::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn solver_settings_follow_weights() {
        let weights = OptimizationWeights {
            num_search_workers: 1,
            random_seed: Some(7),
            time_limit_s: Some(2.5),
            ..Default::default()
        };
        let settings = weights.solver_settings();
        assert_eq!(settings.threads, 1);
        assert_eq!(settings.random_seed, Some(7));
        assert_eq!(settings.time_limit, Some(Duration::from_millis(2500)));
        assert_eq!(settings.relative_gap, 0.05);
    }
}
