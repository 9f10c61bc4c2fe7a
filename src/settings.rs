use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Judge/simulator endpoint configuration persisted next to the database.
/// Environment variables override whatever the file carries.
#[derive(Serialize, Deserialize, Default, Clone)]
pub struct PersistentSettings {
    pub judge_url: Option<String>,
    pub judge_key: Option<String>,
    pub judge_model: Option<String>,
    pub use_model_grading: Option<bool>,
}

impl PersistentSettings {
    pub fn judge_url(&self) -> String {
        std::env::var("JUDGE_API_URL")
            .ok()
            .or_else(|| self.judge_url.clone())
            .unwrap_or_else(|| "https://openrouter.ai/api/v1/chat/completions".to_string())
    }

    pub fn judge_key(&self) -> String {
        std::env::var("JUDGE_API_KEY")
            .ok()
            .or_else(|| self.judge_key.clone())
            .unwrap_or_default()
    }

    pub fn judge_model(&self) -> String {
        std::env::var("JUDGE_MODEL")
            .ok()
            .or_else(|| self.judge_model.clone())
            .unwrap_or_else(|| "anthropic/claude-3.5-sonnet".to_string())
    }

    /// Model grading is opt-in and only meaningful with a key configured.
    pub fn model_grading_enabled(&self) -> bool {
        self.use_model_grading.unwrap_or(false) && !self.judge_key().is_empty()
    }
}

pub fn load_settings(path: &Path) -> PersistentSettings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => PersistentSettings::default(),
    }
}

pub fn save_settings(path: &Path, settings: &PersistentSettings) {
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to save settings to {:?}: {}", path, e);
            }
        }
        Err(e) => {
            warn!("Failed to serialize settings: {}", e);
        }
    }
}
