use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

use crate::config::{ServerConfig, HTTP_POOL_MAX_IDLE_PER_HOST, HTTP_TIMEOUT_SECS};
use crate::db::EvalDb;
use crate::settings::PersistentSettings;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ServerConfig,
    pub db: Arc<EvalDb>,
    pub settings: RwLock<PersistentSettings>,
    pub evaluation: RwLock<EvaluationState>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub http_client: reqwest::Client,
}

/// Progress of the active evaluation batch, if any. Individual grading
/// calls are stateless; this only tracks the trial loop the engine runs.
#[derive(Default)]
pub struct EvaluationState {
    pub running: bool,
    pub current_run_id: Option<String>,
    pub task_id: Option<String>,
    pub current_trial: usize,
    pub total_trials: usize,
    pub stop_tx: Option<watch::Sender<bool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalStatus {
    pub running: bool,
    pub current_run_id: Option<String>,
    pub task_id: Option<String>,
    pub current_trial: usize,
    pub total_trials: usize,
}

impl AppState {
    pub fn new(config: ServerConfig, db: EvalDb, settings: PersistentSettings) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            config,
            db: Arc::new(db),
            settings: RwLock::new(settings),
            evaluation: RwLock::new(EvaluationState::default()),
            shutdown_tx,
            http_client,
        }
    }

    pub async fn eval_status(&self) -> EvalStatus {
        let eval = self.evaluation.read().await;
        EvalStatus {
            running: eval.running,
            current_run_id: eval.current_run_id.clone(),
            task_id: eval.task_id.clone(),
            current_trial: eval.current_trial,
            total_trials: eval.total_trials,
        }
    }
}
