use voiceval_server::grading::{aggregate_metrics, pass_at_k, pass_pow_k, TrialOutcome};

fn trial(score: f64, passed: bool) -> TrialOutcome {
    TrialOutcome { score, passed }
}

#[test]
fn test_pass_fail_pass_sequence() {
    let trials = vec![trial(85.0, true), trial(40.0, false), trial(90.0, true)];
    let metrics = aggregate_metrics(&trials);

    assert_eq!(metrics.total_runs, 3);
    assert_eq!(metrics.passed_runs, 2);
    assert!((metrics.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((metrics.avg_score - 71.666).abs() < 0.01);

    // First trial passed, so pass@1 = 1
    assert_eq!(metrics.pass_at_1, 1.0);
    assert_eq!(metrics.pass_at_3, 1.0);
    // Second trial failed, so pass^3 = 0
    assert_eq!(metrics.pass_pow_3, 0.0);
}

#[test]
fn test_empty_trials_all_zero() {
    let metrics = aggregate_metrics(&[]);
    assert_eq!(metrics.total_runs, 0);
    assert_eq!(metrics.passed_runs, 0);
    assert_eq!(metrics.pass_rate, 0.0);
    assert_eq!(metrics.avg_score, 0.0);
    assert_eq!(metrics.pass_at_1, 0.0);
    assert_eq!(metrics.pass_at_5, 0.0);
    assert_eq!(metrics.pass_pow_3, 0.0);
}

#[test]
fn test_first_trial_failed() {
    let trials = vec![trial(30.0, false), trial(85.0, true)];
    let metrics = aggregate_metrics(&trials);
    assert_eq!(metrics.pass_at_1, 0.0);
    assert_eq!(metrics.pass_at_3, 1.0);
    assert_eq!(metrics.pass_pow_3, 0.0);
}

#[test]
fn test_all_passing() {
    let trials = vec![trial(80.0, true); 5];
    let metrics = aggregate_metrics(&trials);
    assert_eq!(metrics.pass_rate, 1.0);
    assert_eq!(metrics.pass_at_5, 1.0);
    assert_eq!(metrics.pass_pow_3, 1.0);
}

#[test]
fn test_k_truncates_to_available_trials() {
    // Only one failing trial: pass@5 looks at just that one
    assert_eq!(pass_at_k(&[0.0], 5), 0.0);
    // One passing trial: pass^3 over a single trial is 1
    assert_eq!(pass_pow_k(&[1.0], 3), 1.0);
}

#[test]
fn test_k_zero_and_empty_inputs() {
    assert_eq!(pass_at_k(&[], 3), 0.0);
    assert_eq!(pass_at_k(&[1.0], 0), 0.0);
    assert_eq!(pass_pow_k(&[], 3), 0.0);
    assert_eq!(pass_pow_k(&[1.0], 0), 0.0);
}

#[test]
fn test_formulas_generalize_to_probabilities() {
    // The product form supports fractional per-trial pass likelihoods
    assert!((pass_at_k(&[0.5, 0.5], 2) - 0.75).abs() < 1e-9);
    assert!((pass_pow_k(&[0.5, 0.5], 2) - 0.25).abs() < 1e-9);
    // Only the first k trials are considered
    assert!((pass_at_k(&[0.5, 1.0], 1) - 0.5).abs() < 1e-9);
}
