use serde::{Deserialize, Serialize};

// ============================================================================
// Shared data model structs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Capability,
    Regression,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Capability => "capability",
            TaskType::Regression => "regression",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "capability" => Some(TaskType::Capability),
            "regression" => Some(TaskType::Regression),
            _ => None,
        }
    }
}

/// An evaluation scenario: what the agent should accomplish, and the
/// checkpoints the conversation is expected to cover. Checkpoint order is
/// significant only for display; grading treats the list as a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub category: String,
    pub system_prompt: Option<String>,
    pub checkpoints: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A named collection of tasks evaluated together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub id: String,
    pub name: String,
    pub description: String,
    pub task_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "passed" => Some(RunStatus::Passed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed)
    }
}

/// One evaluation attempt against one task.
///
/// Latencies are run-level averages written by the metrics aggregator;
/// `intent_accuracy`, `task_completion` and the three score fields are
/// written by the grading pipeline when the run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub task_id: String,
    pub suite_id: Option<String>,
    pub status: RunStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    // Metrics (ms / 0-1)
    pub asr_latency: Option<f64>,
    pub llm_ttf: Option<f64>,
    pub tts_latency: Option<f64>,
    pub e2e_latency: Option<f64>,
    pub intent_accuracy: Option<f64>,
    pub task_completion: Option<bool>,
    // Scores (0-100)
    pub code_score: Option<f64>,
    pub model_score: Option<f64>,
    pub composite_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "agent" => Some(Role::Agent),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub params: serde_json::Value,
    pub result: String,
}

/// One utterance within a run. Append-only; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub run_id: String,
    /// 0-based, strictly increasing within a run
    pub turn: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    pub audio_url: Option<String>,
    // Turn-level metrics (ms)
    pub asr_latency: Option<f64>,
    pub llm_latency: Option<f64>,
    pub tts_latency: Option<f64>,
    pub tool_calls: Option<Vec<ToolCall>>,
}
