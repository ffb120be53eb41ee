use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use log::{error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SchedulerConfig;
use crate::data::{FailureOutput, SchedulingInput, SchedulingOutput};
use crate::error::ScheduleError;
use crate::solver::SolverBackend;

#[derive(Clone)]
pub struct AppState {
    config: Arc<SchedulerConfig>,
    backend: Arc<dyn SolverBackend>,
}

impl AppState {
    pub fn new(config: SchedulerConfig, backend: Arc<dyn SolverBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }
}

struct ApiError(ScheduleError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScheduleError::DataIntegrity(_) | ScheduleError::Config(_) | ScheduleError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            ScheduleError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScheduleError::SolverUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScheduleError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(FailureOutput::from(&self.0))).into_response()
    }
}

/// Runs a scheduling pass on the blocking pool, abandoning it after the timeout.
///
/// An abandoned run is dropped whole; nothing partial is returned. The solver is
/// given the same deadline so an abandoned search does not hold a blocking thread.
pub async fn solve_with_timeout(
    input: SchedulingInput,
    config: Arc<SchedulerConfig>,
    backend: Arc<dyn SolverBackend>,
) -> Result<SchedulingOutput, ScheduleError> {
    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    let deadline = Instant::now() + timeout;
    let task = tokio::task::spawn_blocking(move || {
        crate::schedule_until(input, &config, backend.as_ref(), Some(deadline))
            .map(|r| r.into_output())
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ScheduleError::solver(format!(
            "scheduling task failed: {join_err}"
        ))),
        Err(_) => Err(ScheduleError::solver(format!(
            "no result within {} seconds",
            timeout.as_secs()
        ))),
    }
}

async fn solve_handler(
    State(state): State<AppState>,
    Json(input): Json<SchedulingInput>,
) -> Result<Json<SchedulingOutput>, ApiError> {
    info!("Received scheduling request for {} students", input.students.len());
    match solve_with_timeout(input, state.config.clone(), state.backend.clone()).await {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            error!("Scheduling request failed: {}", e);
            Err(ApiError(e))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/schedule/solve", post(solve_handler))
        .with_state(state)
}

pub async fn run_server(state: AppState) -> Result<(), ScheduleError> {
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(state.config.server.bind.as_str()).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
