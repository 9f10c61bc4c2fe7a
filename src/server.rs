use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // Tasks
        .route("/tasks", get(crate::routes::tasks::list_tasks))
        .route("/tasks", post(crate::routes::tasks::create_task))
        .route("/tasks/{id}", get(crate::routes::tasks::get_task))
        .route("/tasks/{id}", put(crate::routes::tasks::update_task))
        .route("/tasks/{id}", delete(crate::routes::tasks::delete_task))
        // Suites
        .route("/suites", get(crate::routes::suites::list_suites))
        .route("/suites", post(crate::routes::suites::create_suite))
        .route("/suites/{id}", put(crate::routes::suites::update_suite))
        .route("/suites/{id}", delete(crate::routes::suites::delete_suite))
        // Runs
        .route("/runs", get(crate::routes::runs::list_runs))
        .route("/runs/{id}", get(crate::routes::runs::get_run))
        .route("/runs/{id}/quality", get(crate::routes::runs::run_quality))
        // Evaluation control
        .route("/eval/status", get(crate::routes::eval::status))
        .route("/eval/start", post(crate::routes::eval::start))
        .route("/eval/stop", post(crate::routes::eval::stop))
        // Analytics
        .route(
            "/analytics/dashboard",
            get(crate::routes::analytics::dashboard),
        )
        .route("/analytics/latency", get(crate::routes::analytics::latency))
        .route(
            "/analytics/tasks/{id}/reliability",
            get(crate::routes::analytics::task_reliability),
        )
        // Settings
        .route("/settings", get(crate::routes::settings::get_settings))
        .route("/settings", put(crate::routes::settings::update_settings))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
