use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::grading::check_conversation_quality;
use crate::model::{Run, Transcript};
use crate::state::SharedState;

const DEFAULT_RUN_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub task_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RunWithTranscripts {
    #[serde(flatten)]
    pub run: Run,
    pub transcripts: Vec<Transcript>,
}

pub async fn list_runs(
    State(state): State<SharedState>,
    Query(query): Query<ListRunsQuery>,
) -> Json<Vec<Run>> {
    let limit = query.limit.unwrap_or(DEFAULT_RUN_LIMIT);
    match state.db.list_runs(query.task_id.as_deref(), limit) {
        Ok(runs) => Json(runs),
        Err(e) => {
            tracing::error!("Failed to list runs: {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RunWithTranscripts>, ServerError> {
    let run = state
        .db
        .get_run(&id)?
        .ok_or_else(|| ServerError::RunNotFound(id.clone()))?;
    let transcripts = state.db.transcripts_for_run(&id)?;
    Ok(Json(RunWithTranscripts { run, transcripts }))
}

/// Advisory conversation-quality findings for a run. Does not affect the
/// stored scores.
pub async fn run_quality(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ServerError> {
    if state.db.get_run(&id)?.is_none() {
        return Err(ServerError::RunNotFound(id));
    }
    let transcripts = state.db.transcripts_for_run(&id)?;
    Ok(Json(check_conversation_quality(&transcripts)))
}
