use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::MessageResponse;
use crate::settings::{save_settings, PersistentSettings};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct SettingsView {
    pub judge_url: String,
    pub judge_model: String,
    pub judge_key_configured: bool,
    pub use_model_grading: bool,
}

/// The key itself is never echoed back.
pub async fn get_settings(State(state): State<SharedState>) -> Json<SettingsView> {
    let settings = state.settings.read().await;
    Json(SettingsView {
        judge_url: settings.judge_url(),
        judge_model: settings.judge_model(),
        judge_key_configured: !settings.judge_key().is_empty(),
        use_model_grading: settings.use_model_grading.unwrap_or(false),
    })
}

pub async fn update_settings(
    State(state): State<SharedState>,
    Json(body): Json<PersistentSettings>,
) -> Json<MessageResponse> {
    save_settings(&state.config.settings_path(), &body);
    let mut settings = state.settings.write().await;
    *settings = body;
    Json(MessageResponse::ok("Settings updated"))
}
