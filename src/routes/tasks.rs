use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::MessageResponse;
use crate::error::ServerError;
use crate::model::{Task, TaskType};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub category: String,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

pub async fn list_tasks(State(state): State<SharedState>) -> Json<Vec<Task>> {
    match state.db.list_tasks() {
        Ok(tasks) => Json(tasks),
        Err(e) => {
            tracing::error!("Failed to list tasks: {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ServerError> {
    match state.db.get_task(&id)? {
        Some(task) => Ok(Json(task)),
        None => Err(ServerError::TaskNotFound(id)),
    }
}

pub async fn create_task(
    State(state): State<SharedState>,
    Json(body): Json<TaskRequest>,
) -> Result<Json<Task>, ServerError> {
    let now = Utc::now().to_rfc3339();
    let task = Task {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        description: body.description,
        task_type: body.task_type,
        category: body.category,
        system_prompt: body.system_prompt,
        checkpoints: body.checkpoints,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.insert_task(&task)?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<TaskRequest>,
) -> Result<Json<Task>, ServerError> {
    let existing = state
        .db
        .get_task(&id)?
        .ok_or_else(|| ServerError::TaskNotFound(id.clone()))?;

    let task = Task {
        id: id.clone(),
        name: body.name,
        description: body.description,
        task_type: body.task_type,
        category: body.category,
        system_prompt: body.system_prompt,
        checkpoints: body.checkpoints,
        created_at: existing.created_at,
        updated_at: Utc::now().to_rfc3339(),
    };
    state.db.update_task(&id, &task)?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<MessageResponse> {
    match state.db.delete_task(&id) {
        Ok(true) => Json(MessageResponse::ok(format!("Task '{}' deleted", id))),
        Ok(false) => Json(MessageResponse::err(format!("Task '{}' not found", id))),
        Err(e) => Json(MessageResponse::err(format!("Failed to delete: {}", e))),
    }
}
