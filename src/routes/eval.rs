use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tokio::sync::watch;

use super::MessageResponse;
use crate::config::MAX_TRIALS_PER_BATCH;
use crate::engine::{self, EvalMode};
use crate::error::ServerError;
use crate::state::{EvalStatus, SharedState};

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub task_id: String,
    pub mode: Option<EvalMode>,
    pub trials: Option<usize>,
}

pub async fn status(State(state): State<SharedState>) -> Json<EvalStatus> {
    Json(state.eval_status().await)
}

pub async fn start(
    State(state): State<SharedState>,
    Json(body): Json<StartRequest>,
) -> Result<Json<MessageResponse>, ServerError> {
    let mode = body.mode.unwrap_or(EvalMode::Mock);
    if mode == EvalMode::Live {
        return Err(ServerError::LiveModeUnavailable);
    }

    let trials = body.trials.unwrap_or(1).clamp(1, MAX_TRIALS_PER_BATCH);

    let task = state
        .db
        .get_task(&body.task_id)?
        .ok_or_else(|| ServerError::TaskNotFound(body.task_id.clone()))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    {
        let mut eval = state.evaluation.write().await;
        if eval.running {
            return Err(ServerError::EvalInProgress);
        }
        eval.running = true;
        eval.stop_tx = Some(stop_tx);
    }

    let state_clone = state.clone();
    tokio::spawn(async move {
        engine::run_eval(state_clone, task, mode, trials, stop_rx).await;
    });

    Ok(Json(MessageResponse::ok(format!(
        "Evaluation started: task='{}', trials={}",
        body.task_id, trials
    ))))
}

pub async fn stop(State(state): State<SharedState>) -> Json<MessageResponse> {
    let mut eval = state.evaluation.write().await;
    if !eval.running {
        return Json(MessageResponse::err("No evaluation in progress"));
    }

    if let Some(tx) = eval.stop_tx.take() {
        let _ = tx.send(true);
    }

    Json(MessageResponse::ok("Stop signal sent"))
}
