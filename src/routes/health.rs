use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::{EvalStatus, SharedState};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub total_tasks: usize,
    pub total_runs: usize,
    pub evaluation: EvalStatus,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let total_tasks = state.db.list_tasks().map(|t| t.len()).unwrap_or(0);
    let total_runs = {
        let conn = state.db.conn();
        conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_tasks,
        total_runs,
        evaluation: state.eval_status().await,
    })
}
