use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::MessageResponse;
use crate::error::ServerError;
use crate::model::Suite;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SuiteRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

pub async fn list_suites(State(state): State<SharedState>) -> Json<Vec<Suite>> {
    match state.db.list_suites() {
        Ok(suites) => Json(suites),
        Err(e) => {
            tracing::error!("Failed to list suites: {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn create_suite(
    State(state): State<SharedState>,
    Json(body): Json<SuiteRequest>,
) -> Result<Json<Suite>, ServerError> {
    let now = Utc::now().to_rfc3339();
    let suite = Suite {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        description: body.description,
        task_ids: body.task_ids,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.insert_suite(&suite)?;
    Ok(Json(suite))
}

pub async fn update_suite(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<SuiteRequest>,
) -> Json<MessageResponse> {
    let suite = Suite {
        id: id.clone(),
        name: body.name,
        description: body.description,
        task_ids: body.task_ids,
        created_at: String::new(),
        updated_at: Utc::now().to_rfc3339(),
    };
    match state.db.update_suite(&id, &suite) {
        Ok(true) => Json(MessageResponse::ok(format!("Suite '{}' updated", id))),
        Ok(false) => Json(MessageResponse::err(format!("Suite '{}' not found", id))),
        Err(e) => Json(MessageResponse::err(format!("Failed to update: {}", e))),
    }
}

pub async fn delete_suite(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<MessageResponse> {
    match state.db.delete_suite(&id) {
        Ok(true) => Json(MessageResponse::ok(format!("Suite '{}' deleted", id))),
        Ok(false) => Json(MessageResponse::err(format!("Suite '{}' not found", id))),
        Err(e) => Json(MessageResponse::err(format!("Failed to delete: {}", e))),
    }
}
