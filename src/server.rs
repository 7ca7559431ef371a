use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{OptimizationWeights, ServiceConfig};
use crate::data::{SolveReport, TimetableInput};
use crate::error::TimetableError;
use crate::problem::Problem;
use crate::solver;
use crate::validate::{Violation, validate};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolveRequest {
    pub data: TimetableInput,
    /// Overrides the service's configured weights for this request.
    #[serde(default)]
    pub weights: Option<OptimizationWeights>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationResponse {
    pub violations: Vec<Violation>,
}

#[derive(Clone)]
pub struct AppState {
    pub weights: Arc<OptimizationWeights>,
}

impl AppState {
    pub fn new(weights: OptimizationWeights) -> Self {
        Self {
            weights: Arc::new(weights),
        }
    }
}

fn error_response(err: TimetableError) -> (StatusCode, String) {
    let status = match &err {
        TimetableError::DataIntegrity(_) | TimetableError::Config(_) => StatusCode::BAD_REQUEST,
        TimetableError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

async fn solve_handler(
    State(state): State<AppState>,
    Json(request): Json<SolveRequest>,
) -> Result<Json<SolveReport>, (StatusCode, String)> {
    let SolveRequest { data, weights } = request;
    let weights = weights.unwrap_or_else(|| state.weights.as_ref().clone());
    // MILP solving is CPU bound; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || solver::solve(&data, &weights))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("solver task failed: {e}"),
            )
        })?;
    result.map(Json).map_err(error_response)
}

async fn validate_handler(
    Json(data): Json<TimetableInput>,
) -> Result<Json<ValidationResponse>, (StatusCode, String)> {
    let problem = Problem::from_input(&data)
        .map_err(|e| error_response(TimetableError::DataIntegrity(e)))?;
    let violations = match validate(&problem) {
        Ok(()) => Vec::new(),
        Err(report) => report.violations,
    };
    Ok(Json(ValidationResponse { violations }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/validate", post(validate_handler))
        .with_state(state)
}

pub async fn run_server(config: ServiceConfig) -> std::io::Result<()> {
    let app = router(AppState::new(config.weights));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
