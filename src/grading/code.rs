use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{
    CHECKPOINT_KEYWORD_RATIO, CHECKPOINT_POINTS, COMPLETION_POINTS, DEFAULT_MAX_LATENCY_MS,
    DEFAULT_MIN_INTENT_ACCURACY, INTENT_POINTS, LATENCY_POINTS, PASS_SCORE_THRESHOLD,
};
use crate::model::{Role, Run, Transcript};

/// Configuration for the rule-based grader. Defaults are part of the
/// contract: 2000ms latency ceiling, 0.8 minimum intent accuracy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeGradingConfig {
    pub checkpoints: Vec<String>,
    pub max_latency_ms: f64,
    pub min_intent_accuracy: f64,
    /// Treat a missing e2e latency as a gate failure instead of a trivial
    /// pass. Off by default to match the historical behavior.
    pub strict_latency: bool,
}

impl Default for CodeGradingConfig {
    fn default() -> Self {
        Self {
            checkpoints: Vec::new(),
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
            min_intent_accuracy: DEFAULT_MIN_INTENT_ACCURACY,
            strict_latency: false,
        }
    }
}

impl CodeGradingConfig {
    pub fn for_checkpoints(checkpoints: Vec<String>) -> Self {
        Self {
            checkpoints,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeDetails {
    pub checkpoints_passed: usize,
    pub checkpoints_total: usize,
    pub intent_accuracy: f64,
    pub latency_passed: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResult {
    /// Rounded, 0-100
    pub score: f64,
    pub passed: bool,
    pub details: GradeDetails,
}

/// Decides whether a checkpoint criterion is satisfied by the conversation
/// text. The keyword heuristic lives behind this trait so a semantic
/// matcher can replace it without touching the grader.
pub trait CheckpointMatcher {
    /// `haystack` is the full lower-cased transcript text of the run.
    fn is_satisfied(&self, checkpoint: &str, haystack: &str) -> bool;
}

/// Naive keyword-overlap matcher: a checkpoint counts as covered when at
/// least half of its whitespace-split, lower-cased keywords occur as
/// substrings of the transcript. No stemming, no synonymy, no negation
/// handling.
pub struct KeywordMatcher;

impl CheckpointMatcher for KeywordMatcher {
    fn is_satisfied(&self, checkpoint: &str, haystack: &str) -> bool {
        let lowered = checkpoint.to_lowercase();
        let keywords: Vec<&str> = lowered.split_whitespace().collect();
        let matched = keywords.iter().filter(|k| haystack.contains(**k)).count();
        matched as f64 >= keywords.len() as f64 * CHECKPOINT_KEYWORD_RATIO
    }
}

fn check_checkpoints(
    matcher: &dyn CheckpointMatcher,
    transcripts: &[Transcript],
    checkpoints: &[String],
) -> (usize, usize) {
    if checkpoints.is_empty() {
        return (0, 0);
    }

    let haystack = transcripts
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let passed = checkpoints
        .iter()
        .filter(|c| matcher.is_satisfied(c, &haystack))
        .count();
    (passed, checkpoints.len())
}

/// Grade a run with the default keyword matcher.
pub fn grade_with_code(
    run: &Run,
    transcripts: &[Transcript],
    config: &CodeGradingConfig,
) -> GradeResult {
    grade_with_matcher(&KeywordMatcher, run, transcripts, config)
}

/// Deterministic rule grading. Four independent, additive components:
/// checkpoint coverage (0-40, full 40 when no checkpoints are configured),
/// latency gate (0/20), intent accuracy (0-20), task completion (0/20).
/// Passing additionally requires the completion flag regardless of score.
pub fn grade_with_matcher(
    matcher: &dyn CheckpointMatcher,
    run: &Run,
    transcripts: &[Transcript],
    config: &CodeGradingConfig,
) -> GradeResult {
    let mut issues = Vec::new();

    // 1. Checkpoint coverage
    let (checkpoints_passed, checkpoints_total) =
        check_checkpoints(matcher, transcripts, &config.checkpoints);

    // 2. Latency gate. A missing e2e latency counts as 0 and passes
    // trivially unless strict_latency is set.
    let latency_passed = if config.strict_latency {
        matches!(run.e2e_latency, Some(v) if v <= config.max_latency_ms)
    } else {
        run.e2e_latency.unwrap_or(0.0) <= config.max_latency_ms
    };
    if !latency_passed {
        match run.e2e_latency {
            Some(v) => issues.push(format!(
                "E2E latency {}ms exceeds threshold {}ms",
                v, config.max_latency_ms
            )),
            None => issues.push(format!(
                "E2E latency not measured (threshold {}ms)",
                config.max_latency_ms
            )),
        }
    }

    // 3. Intent accuracy. The threshold check only adds an issue; the
    // numeric contribution is always accuracy * 20.
    let intent_accuracy = run.intent_accuracy.unwrap_or(0.0);
    if intent_accuracy < config.min_intent_accuracy {
        issues.push(format!(
            "Intent accuracy {:.1}% below threshold {}%",
            intent_accuracy * 100.0,
            config.min_intent_accuracy * 100.0
        ));
    }

    // 4. Task completion
    let completed = run.task_completion == Some(true);
    if !completed {
        issues.push("Task was not completed".to_string());
    }

    let checkpoint_score = if checkpoints_total > 0 {
        (checkpoints_passed as f64 / checkpoints_total as f64) * CHECKPOINT_POINTS
    } else {
        CHECKPOINT_POINTS
    };
    let latency_score = if latency_passed { LATENCY_POINTS } else { 0.0 };
    let intent_score = intent_accuracy * INTENT_POINTS;
    let completion_score = if completed { COMPLETION_POINTS } else { 0.0 };

    let score = checkpoint_score + latency_score + intent_score + completion_score;
    // Completion is a hard gate on top of the additive score.
    let passed = score >= PASS_SCORE_THRESHOLD && completed;

    GradeResult {
        score: score.round(),
        passed,
        details: GradeDetails {
            checkpoints_passed,
            checkpoints_total,
            intent_accuracy,
            latency_passed,
            issues,
        },
    }
}

// Apology/error phrases that usually signal a failed exchange. Bilingual
// because the evaluated agents serve both Chinese and English callers.
const ERROR_INDICATORS: &[&str] = &["抱歉", "无法", "错误", "error", "sorry", "cannot"];

const SHORT_RESPONSE_CHARS: usize = 10;

/// Advisory transcript diagnostics: repeated agent responses, very short
/// agent responses, error indicators anywhere in the conversation. Never
/// affects score or pass/fail.
pub fn check_conversation_quality(transcripts: &[Transcript]) -> Vec<String> {
    let mut issues = Vec::new();

    let agent_responses: Vec<&str> = transcripts
        .iter()
        .filter(|t| t.role == Role::Agent)
        .map(|t| t.content.as_str())
        .collect();

    let unique: HashSet<&str> = agent_responses.iter().copied().collect();
    if agent_responses.len() > unique.len() {
        issues.push("Agent repeated the same response".to_string());
    }

    let short_count = agent_responses
        .iter()
        .filter(|r| r.chars().count() < SHORT_RESPONSE_CHARS)
        .count();
    if short_count > 0 {
        issues.push(format!(
            "{} very short agent responses detected",
            short_count
        ));
    }

    let has_errors = transcripts.iter().any(|t| {
        let lowered = t.content.to_lowercase();
        ERROR_INDICATORS.iter().any(|p| lowered.contains(p))
    });
    if has_errors {
        issues.push("Error indicators found in conversation".to_string());
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matcher_half_threshold() {
        // 2 keywords, exactly 1 present: 1 >= 2 * 0.5 passes
        let matcher = KeywordMatcher;
        assert!(matcher.is_satisfied("refund order", "i want a refund please"));
        // 0 of 2 present
        assert!(!matcher.is_satisfied("refund order", "hello there"));
        // 1 of 3 present: 1 < 1.5 fails
        assert!(!matcher.is_satisfied("refund order number", "i want a refund"));
    }

    #[test]
    fn test_keyword_matcher_is_case_insensitive() {
        let matcher = KeywordMatcher;
        assert!(matcher.is_satisfied("Refund ORDER", "please refund my order"));
    }
}
