use axum::extract::{Path, State};
use axum::Json;

use crate::analytics::{self, DashboardMetrics, LatencyTrendPoint};
use crate::error::ServerError;
use crate::grading::AggregateMetrics;
use crate::state::SharedState;

pub async fn dashboard(
    State(state): State<SharedState>,
) -> Result<Json<DashboardMetrics>, ServerError> {
    Ok(Json(analytics::dashboard_metrics(&state.db)?))
}

pub async fn latency(State(state): State<SharedState>) -> Json<Vec<LatencyTrendPoint>> {
    match analytics::latency_trend(&state.db) {
        Ok(trend) => Json(trend),
        Err(e) => {
            tracing::error!("Failed to compute latency trend: {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn task_reliability(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<AggregateMetrics>, ServerError> {
    if state.db.get_task(&id)?.is_none() {
        return Err(ServerError::TaskNotFound(id));
    }
    Ok(Json(analytics::task_reliability(&state.db, &id)?))
}
