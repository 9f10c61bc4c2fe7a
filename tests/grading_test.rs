use voiceval_server::grading::{
    check_conversation_quality, combine_grades, grade_with_code, grade_with_model,
    CodeGradingConfig, GradeDetails, GradeResult, ModelGradeResult, ModelGradingConfig,
    RubricScores,
};
use voiceval_server::model::{Role, Run, RunStatus, Transcript};

fn test_run() -> Run {
    Run {
        id: "run-1".to_string(),
        task_id: "task-1".to_string(),
        suite_id: None,
        status: RunStatus::Running,
        start_time: "2026-08-07T10:00:00Z".to_string(),
        end_time: None,
        asr_latency: Some(250.0),
        llm_ttf: Some(500.0),
        tts_latency: Some(300.0),
        e2e_latency: Some(1050.0),
        intent_accuracy: Some(0.9),
        task_completion: Some(true),
        code_score: None,
        model_score: None,
        composite_score: None,
    }
}

fn transcript(turn: i64, role: Role, content: &str) -> Transcript {
    Transcript {
        id: format!("t-{}", turn),
        run_id: "run-1".to_string(),
        turn,
        role,
        content: content.to_string(),
        timestamp: "2026-08-07T10:00:01Z".to_string(),
        audio_url: None,
        asr_latency: None,
        llm_latency: None,
        tts_latency: None,
        tool_calls: None,
    }
}

fn conversation(lines: &[(Role, &str)]) -> Vec<Transcript> {
    lines
        .iter()
        .enumerate()
        .map(|(i, (role, content))| transcript(i as i64, *role, content))
        .collect()
}

// ============================================================================
// Code grader
// ============================================================================

#[test]
fn test_empty_checkpoints_contribute_full_points() {
    let run = test_run();
    let config = CodeGradingConfig::default();

    // No checkpoints, any transcript content: 40 + 20 + 18 + 20 = 98
    let result = grade_with_code(&run, &conversation(&[(Role::User, "whatever")]), &config);
    assert_eq!(result.score, 98.0);
    assert!(result.passed);
    assert_eq!(result.details.checkpoints_total, 0);

    // Even with an empty transcript
    let result = grade_with_code(&run, &[], &config);
    assert_eq!(result.score, 98.0);
}

#[test]
fn test_checkpoint_keyword_boundary() {
    let run = test_run();
    let transcripts = conversation(&[
        (Role::User, "I want a refund for my order"),
        (Role::Agent, "Sure, let me help with that"),
    ]);

    // 2 keywords, exactly 1 matched ("refund"): 1 >= 2*0.5, passes
    let config = CodeGradingConfig::for_checkpoints(vec!["refund voucher".to_string()]);
    let result = grade_with_code(&run, &transcripts, &config);
    assert_eq!(result.details.checkpoints_passed, 1);

    // All keywords absent: never passes
    let config = CodeGradingConfig::for_checkpoints(vec!["cancel subscription".to_string()]);
    let result = grade_with_code(&run, &transcripts, &config);
    assert_eq!(result.details.checkpoints_passed, 0);
    assert_eq!(result.details.checkpoints_total, 1);
}

#[test]
fn test_partial_checkpoint_coverage_scales_score() {
    let run = test_run();
    let transcripts = conversation(&[(Role::Agent, "your refund is on its way")]);
    let config = CodeGradingConfig::for_checkpoints(vec![
        "refund".to_string(),
        "completely unrelated checkpoint words".to_string(),
    ]);

    let result = grade_with_code(&run, &transcripts, &config);
    // 1 of 2 checkpoints: 20 + 20 + 18 + 20 = 78
    assert_eq!(result.details.checkpoints_passed, 1);
    assert_eq!(result.score, 78.0);
}

#[test]
fn test_completion_gate_overrides_high_score() {
    let mut run = test_run();
    run.task_completion = Some(false);
    let config = CodeGradingConfig::default();

    // 40 + 20 + 18 + 0 = 78 >= 70, but completion is required
    let result = grade_with_code(&run, &[], &config);
    assert_eq!(result.score, 78.0);
    assert!(!result.passed);
    assert!(result
        .details
        .issues
        .iter()
        .any(|i| i.contains("not completed")));
}

#[test]
fn test_missing_completion_flag_fails_gate() {
    let mut run = test_run();
    run.task_completion = None;
    let result = grade_with_code(&run, &[], &CodeGradingConfig::default());
    assert!(!result.passed);
}

#[test]
fn test_missing_latency_passes_trivially() {
    let mut run = test_run();
    run.e2e_latency = None;
    let result = grade_with_code(&run, &[], &CodeGradingConfig::default());
    assert!(result.details.latency_passed);
}

#[test]
fn test_strict_latency_fails_on_missing_measurement() {
    let mut run = test_run();
    run.e2e_latency = None;
    let config = CodeGradingConfig {
        strict_latency: true,
        ..CodeGradingConfig::default()
    };
    let result = grade_with_code(&run, &[], &config);
    assert!(!result.details.latency_passed);
    assert!(result
        .details
        .issues
        .iter()
        .any(|i| i.contains("not measured")));
}

#[test]
fn test_intent_below_threshold_records_issue_without_score_change() {
    let mut run = test_run();
    run.intent_accuracy = Some(0.5);
    let result = grade_with_code(&run, &[], &CodeGradingConfig::default());
    // 40 + 20 + 10 + 20 = 90; the threshold check is issue-only
    assert_eq!(result.score, 90.0);
    assert!(result
        .details
        .issues
        .iter()
        .any(|i| i.contains("Intent accuracy 50.0%")));
}

#[test]
fn test_latency_over_threshold_scenario() {
    // Latency over the default threshold costs the 20 latency points and
    // records an issue, but the run can still pass on the other components.
    let mut run = test_run();
    run.e2e_latency = Some(2500.0);
    run.intent_accuracy = Some(0.9);
    run.task_completion = Some(true);

    let transcripts = conversation(&[
        (Role::User, "I need to reset my password please"),
        (Role::Agent, "I can help you reset the password for your account"),
    ]);
    let config = CodeGradingConfig::for_checkpoints(vec![
        "reset password".to_string(),
        "help account".to_string(),
    ]);

    let result = grade_with_code(&run, &transcripts, &config);
    // 40 + 0 + 18 + 20 = 78
    assert_eq!(result.score, 78.0);
    assert!(result.passed);
    assert!(!result.details.latency_passed);
    let latency_issue = result
        .details
        .issues
        .iter()
        .find(|i| i.contains("E2E latency"))
        .expect("latency issue recorded");
    assert!(latency_issue.contains("2500"));
    assert!(latency_issue.contains("2000"));
}

// ============================================================================
// Conversation quality diagnostics
// ============================================================================

#[test]
fn test_quality_flags_repeated_and_short_responses() {
    let transcripts = conversation(&[
        (Role::User, "hello, can you help me with my account"),
        (Role::Agent, "ok"),
        (Role::User, "are you there"),
        (Role::Agent, "ok"),
    ]);
    let issues = check_conversation_quality(&transcripts);
    assert!(issues.iter().any(|i| i.contains("repeated")));
    assert!(issues.iter().any(|i| i.contains("2 very short")));
}

#[test]
fn test_quality_flags_error_indicators() {
    let transcripts = conversation(&[(
        Role::Agent,
        "Sorry, I cannot process that request right now",
    )]);
    let issues = check_conversation_quality(&transcripts);
    assert!(issues.iter().any(|i| i.contains("Error indicators")));
}

#[test]
fn test_quality_clean_conversation_has_no_issues() {
    let transcripts = conversation(&[
        (Role::User, "I'd like to book an appointment"),
        (Role::Agent, "Certainly, we have slots on Tuesday and Thursday"),
        (Role::User, "Tuesday works"),
        (Role::Agent, "Booked for Tuesday at 10am. See you then!"),
    ]);
    assert!(check_conversation_quality(&transcripts).is_empty());
}

// ============================================================================
// Composite grader
// ============================================================================

fn code_grade(score: f64, passed: bool) -> GradeResult {
    GradeResult {
        score,
        passed,
        details: GradeDetails {
            checkpoints_passed: 0,
            checkpoints_total: 0,
            intent_accuracy: 0.0,
            latency_passed: true,
            issues: Vec::new(),
        },
    }
}

fn model_grade(score: f64) -> ModelGradeResult {
    ModelGradeResult {
        score,
        passed: score >= 70.0,
        rubric: RubricScores::default(),
        explanation: String::new(),
    }
}

#[test]
fn test_composite_without_model_passes_code_score_through() {
    let result = combine_grades(code_grade(78.0, true), None, 0.6, 0.4);
    // No renormalization: the code score is used unchanged
    assert_eq!(result.score, 78.0);
    assert!(result.passed);
    assert!(result.model_grade.is_none());
}

#[test]
fn test_composite_weighted_blend() {
    let result = combine_grades(code_grade(80.0, true), Some(model_grade(90.0)), 0.6, 0.4);
    // 80*0.6 + 90*0.4 = 84
    assert_eq!(result.score, 84.0);
    assert!(result.passed);
    assert_eq!(result.weights.code, 0.6);
    assert_eq!(result.weights.model, 0.4);
}

#[test]
fn test_composite_requires_code_grade_pass() {
    // 77*0.6 + 97*0.4 = 85: score clears the bar, the code gate does not
    let result = combine_grades(code_grade(77.0, false), Some(model_grade(97.0)), 0.6, 0.4);
    assert_eq!(result.score, 85.0);
    assert!(!result.passed);
}

#[test]
fn test_composite_below_threshold_fails_even_if_code_passed() {
    let result = combine_grades(code_grade(72.0, true), Some(model_grade(20.0)), 0.6, 0.4);
    // 72*0.6 + 20*0.4 = 51.2
    assert_eq!(result.score, 51.0);
    assert!(!result.passed);
}

#[test]
fn test_composite_ignores_model_grade_verdict() {
    // Model grade failed on its own terms, but the blend still passes
    let mut failing_model = model_grade(60.0);
    failing_model.passed = false;
    let result = combine_grades(code_grade(90.0, true), Some(failing_model), 0.6, 0.4);
    // 90*0.6 + 60*0.4 = 78
    assert_eq!(result.score, 78.0);
    assert!(result.passed);
}

// ============================================================================
// Model grader failure path
// ============================================================================

#[tokio::test]
async fn test_unreachable_judge_yields_zero_result() {
    let client = reqwest::Client::new();
    let config = ModelGradingConfig {
        judge_url: "http://127.0.0.1:9/chat/completions".to_string(),
        judge_key: "test-key".to_string(),
        judge_model: "test-model".to_string(),
        task_description: "test".to_string(),
        checkpoints: Vec::new(),
    };
    let transcripts = conversation(&[(Role::User, "hello")]);

    let result = grade_with_model(&client, &transcripts, &config).await;
    assert_eq!(result.score, 0.0);
    assert!(!result.passed);
    assert_eq!(result.rubric.total(), 0.0);
    assert!(result.explanation.starts_with("Grading failed"));
}
