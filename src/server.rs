use axum::{Json, Router, http::StatusCode, routing::post};
use log::{error, info};
use crate::audit::{self, Finding};
use crate::cp::HighsSolver;
use crate::data::{SolveRequest, SolveResponse};
use crate::pipeline::{Pipeline, Snapshot, Stage};

type ApiError = (StatusCode, String);

fn solve(request: SolveRequest) -> Result<SolveResponse, ApiError> {
    let SolveRequest {
        config,
        timetable,
        sections,
    } = request;
    let pipeline = match sections {
        Some(sections) => Pipeline::new(HighsSolver, vec![Stage::new("request", sections)]),
        None => Pipeline::from_config(HighsSolver, &config)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
    };

    let (snapshot, passes) = pipeline
        .run(&config, Snapshot::new(timetable))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if let Some(failed) = passes.iter().find(|p| p.outcome != "solved") {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, failed.to_string()));
    }
    Ok(SolveResponse {
        timetable: snapshot.timetable,
        passes,
    })
}

async fn solve_handler(Json(input): Json<SolveRequest>) -> Result<Json<SolveResponse>, ApiError> {
    // the solver blocks for up to the configured budget
    let output = tokio::task::spawn_blocking(move || solve(input))
        .await
        .map_err(|e| {
            error!("Solve task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })??;
    Ok(Json(output))
}

async fn audit_handler(Json(input): Json<SolveRequest>) -> Json<Vec<Finding>> {
    let sections = input.sections.unwrap_or_else(|| input.config.sections.clone());
    Json(audit::audit(&input.config, &input.timetable, &sections))
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/audit", post(audit_handler))
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}
