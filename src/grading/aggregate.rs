use serde::{Deserialize, Serialize};

/// One graded trial of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub score: f64,
    pub passed: bool,
}

/// Reliability metrics over repeated trials of the same task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_runs: usize,
    pub passed_runs: usize,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub pass_at_1: f64,
    pub pass_at_3: f64,
    pub pass_at_5: f64,
    pub pass_pow_3: f64,
}

impl AggregateMetrics {
    pub fn zero() -> Self {
        Self {
            total_runs: 0,
            passed_runs: 0,
            pass_rate: 0.0,
            avg_score: 0.0,
            pass_at_1: 0.0,
            pass_at_3: 0.0,
            pass_at_5: 0.0,
            pass_pow_3: 0.0,
        }
    }
}

/// Probability that at least one of the first `min(k, N)` trials passes:
/// `1 - Π(1 - p_i)`. Trials are taken in the given order, no resampling.
///
/// The product form is kept general for per-trial pass probabilities even
/// though binary 0/1 inputs collapse it to an OR over the first k.
pub fn pass_at_k(pass_probs: &[f64], k: usize) -> f64 {
    if pass_probs.is_empty() || k == 0 {
        return 0.0;
    }
    let all_fail: f64 = pass_probs.iter().take(k).map(|p| 1.0 - p).product();
    1.0 - all_fail
}

/// Probability that all of the first `min(k, N)` trials pass: `Π p_i`.
/// Degenerates to an AND over the first k for binary inputs.
pub fn pass_pow_k(pass_probs: &[f64], k: usize) -> f64 {
    if pass_probs.is_empty() || k == 0 {
        return 0.0;
    }
    pass_probs.iter().take(k).product()
}

/// Reduce a sequence of trial outcomes (in execution order) to the standard
/// reliability report. Empty input yields all-zero metrics.
pub fn aggregate_metrics(trials: &[TrialOutcome]) -> AggregateMetrics {
    if trials.is_empty() {
        return AggregateMetrics::zero();
    }

    let pass_probs: Vec<f64> = trials
        .iter()
        .map(|t| if t.passed { 1.0 } else { 0.0 })
        .collect();
    let passed_runs = trials.iter().filter(|t| t.passed).count();
    let total = trials.len();

    AggregateMetrics {
        total_runs: total,
        passed_runs,
        pass_rate: passed_runs as f64 / total as f64,
        avg_score: trials.iter().map(|t| t.score).sum::<f64>() / total as f64,
        pass_at_1: pass_at_k(&pass_probs, 1),
        pass_at_3: pass_at_k(&pass_probs, 3),
        pass_at_5: pass_at_k(&pass_probs, 5),
        pass_pow_3: pass_pow_k(&pass_probs, 3),
    }
}
