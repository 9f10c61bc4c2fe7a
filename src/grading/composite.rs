use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_CODE_WEIGHT, DEFAULT_MODEL_WEIGHT, PASS_SCORE_THRESHOLD};
use crate::grading::code::{grade_with_code, CodeGradingConfig, GradeResult};
use crate::grading::model::{grade_with_model, ModelGradeResult, ModelGradingConfig};
use crate::model::{Run, Transcript};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub code_weight: f64,
    pub model_weight: f64,
    pub use_model_grading: bool,
    pub code: CodeGradingConfig,
    pub model: Option<ModelGradingConfig>,
}

impl CompositeConfig {
    /// Code-only grading with the default 0.6/0.4 weights.
    pub fn code_only(code: CodeGradingConfig) -> Self {
        Self {
            code_weight: DEFAULT_CODE_WEIGHT,
            model_weight: DEFAULT_MODEL_WEIGHT,
            use_model_grading: false,
            code,
            model: None,
        }
    }

    pub fn with_model(code: CodeGradingConfig, model: ModelGradingConfig) -> Self {
        Self {
            code_weight: DEFAULT_CODE_WEIGHT,
            model_weight: DEFAULT_MODEL_WEIGHT,
            use_model_grading: true,
            code,
            model: Some(model),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeWeights {
    pub code: f64,
    pub model: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeGradeResult {
    /// Rounded, 0-100
    pub score: f64,
    pub passed: bool,
    pub code_grade: GradeResult,
    pub model_grade: Option<ModelGradeResult>,
    pub weights: GradeWeights,
}

/// Pure combination step, separated from the async judge call so the
/// weighting and gating logic is testable on its own.
///
/// Without a model grade the code score passes through unchanged; weights
/// are not renormalized. Passing requires the composite score threshold AND
/// the code grader's own verdict; the model grade's verdict is
/// informational only.
pub fn combine_grades(
    code_grade: GradeResult,
    model_grade: Option<ModelGradeResult>,
    code_weight: f64,
    model_weight: f64,
) -> CompositeGradeResult {
    let raw = match &model_grade {
        Some(model) => code_grade.score * code_weight + model.score * model_weight,
        None => code_grade.score,
    };

    let passed = raw >= PASS_SCORE_THRESHOLD && code_grade.passed;

    CompositeGradeResult {
        score: raw.round(),
        passed,
        code_grade,
        model_grade,
        weights: GradeWeights {
            code: code_weight,
            model: model_weight,
        },
    }
}

/// Grade a run with both graders. The code grader always runs; the model
/// grader runs only when enabled and configured.
pub async fn grade_composite(
    client: &reqwest::Client,
    run: &Run,
    transcripts: &[Transcript],
    config: &CompositeConfig,
) -> CompositeGradeResult {
    let code_grade = grade_with_code(run, transcripts, &config.code);

    let model_grade = match (&config.model, config.use_model_grading) {
        (Some(model_config), true) => {
            Some(grade_with_model(client, transcripts, model_config).await)
        }
        _ => None,
    };

    combine_grades(code_grade, model_grade, config.code_weight, config.model_weight)
}
