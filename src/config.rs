use clap::Parser;
use std::path::PathBuf;

/// Voiceval server — runs and grades conversational voice agent evaluations.
#[derive(Parser, Debug, Clone)]
#[command(name = "voiceval-server")]
pub struct CliArgs {
    /// Directory for the evaluation database and settings file
    #[arg(short = 'd', long = "data-dir", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Server HTTP port
    #[arg(long = "port", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Disable model grading even if a judge is configured
    #[arg(long = "no-model-grading")]
    pub no_model_grading: bool,
}

pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub no_model_grading: bool,
}

// Port constants
pub const DEFAULT_SERVER_PORT: u16 = 9880;

// Code grader defaults
pub const DEFAULT_MAX_LATENCY_MS: f64 = 2000.0;
pub const DEFAULT_MIN_INTENT_ACCURACY: f64 = 0.8;
pub const PASS_SCORE_THRESHOLD: f64 = 70.0;
pub const CHECKPOINT_POINTS: f64 = 40.0;
pub const LATENCY_POINTS: f64 = 20.0;
pub const INTENT_POINTS: f64 = 20.0;
pub const COMPLETION_POINTS: f64 = 20.0;
// Fraction of a checkpoint's keywords that must appear in the transcript
pub const CHECKPOINT_KEYWORD_RATIO: f64 = 0.5;

// Model grader (judge) constants
pub const RUBRIC_COMPONENT_MAX: f64 = 25.0;
pub const JUDGE_TEMPERATURE: f64 = 0.1;
pub const JUDGE_MAX_TOKENS: u32 = 1000;

// Composite grader defaults
pub const DEFAULT_CODE_WEIGHT: f64 = 0.6;
pub const DEFAULT_MODEL_WEIGHT: f64 = 0.4;

// Simulator constants
pub const SIMULATOR_TEMPERATURE: f64 = 0.7;
pub const SIMULATOR_MAX_TOKENS: u32 = 200;
pub const SIMULATOR_MAX_TURNS: usize = 10;

// Engine constants
pub const MAX_TRIALS_PER_BATCH: usize = 20;

// Outbound HTTP client constants
pub const HTTP_TIMEOUT_SECS: u64 = 60;
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 4;

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Self {
        ServerConfig {
            data_dir: args.data_dir,
            port: args.port,
            no_model_grading: args.no_model_grading,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("evals.db")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}
