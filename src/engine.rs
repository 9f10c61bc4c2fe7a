use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SIMULATOR_MAX_TURNS;
use crate::grading::{grade_composite, CodeGradingConfig, CompositeConfig, ModelGradingConfig};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::model::{Role, Run, RunStatus, Task, Transcript};
use crate::simulator::{
    generate_user_message, should_end_conversation, SimulatorConfig, SimulatorRole, SimulatorTurn,
};
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Canned conversation with jittered latencies
    Mock,
    /// LLM-simulated user against a placeholder agent
    Simulate,
    /// Real telephony agent (not implemented)
    Live,
}

/// Run `trials` sequential evaluations of one task, grading each as it
/// completes. Honors the stop signal between trials; a failed trial is
/// recorded and the batch moves on.
pub async fn run_eval(
    state: SharedState,
    task: Task,
    mode: EvalMode,
    trials: usize,
    stop_rx: watch::Receiver<bool>,
) {
    info!(
        "Eval batch started: task='{}', mode={:?}, trials={}",
        task.id, mode, trials
    );

    {
        let mut eval = state.evaluation.write().await;
        eval.running = true;
        eval.task_id = Some(task.id.clone());
        eval.current_trial = 0;
        eval.total_trials = trials;
    }

    for trial in 0..trials {
        if *stop_rx.borrow() {
            info!("Eval batch cancelled at trial {}/{}", trial, trials);
            break;
        }

        {
            let mut eval = state.evaluation.write().await;
            eval.current_trial = trial;
        }

        match execute_trial(&state, &task, mode).await {
            Ok(run_id) => {
                info!("Trial {}/{} graded: run={}", trial + 1, trials, run_id);
            }
            Err(e) => {
                warn!("Trial {}/{} failed: {:#}", trial + 1, trials, e);
            }
        }
    }

    {
        let mut eval = state.evaluation.write().await;
        eval.running = false;
        eval.current_run_id = None;
        eval.task_id = None;
        eval.current_trial = 0;
        eval.total_trials = 0;
        eval.stop_tx = None;
    }

    info!("Eval batch completed: task='{}'", task.id);
}

/// One full trial: create the run, produce the conversation, aggregate
/// metrics, grade, and write everything back.
pub async fn execute_trial(
    state: &SharedState,
    task: &Task,
    mode: EvalMode,
) -> anyhow::Result<String> {
    let run_id = Uuid::new_v4().to_string();

    let run = Run {
        id: run_id.clone(),
        task_id: task.id.clone(),
        suite_id: None,
        status: RunStatus::Running,
        start_time: Utc::now().to_rfc3339(),
        end_time: None,
        asr_latency: None,
        llm_ttf: None,
        tts_latency: None,
        e2e_latency: None,
        intent_accuracy: None,
        task_completion: None,
        code_score: None,
        model_score: None,
        composite_score: None,
    };
    state.db.insert_run(&run)?;

    {
        let mut eval = state.evaluation.write().await;
        eval.current_run_id = Some(run_id.clone());
    }

    let conversation = match mode {
        EvalMode::Mock => run_mock_conversation(state, &run_id, task),
        EvalMode::Simulate => run_simulated_conversation(state, &run_id, task).await,
        EvalMode::Live => Err(anyhow::anyhow!("live mode is not implemented")),
    };

    let snapshot = match conversation {
        Ok(snapshot) => snapshot,
        Err(e) => {
            state.db.mark_run_failed(&run_id)?;
            return Err(e);
        }
    };

    state.db.write_run_metrics(&run_id, &snapshot)?;

    grade_run(state, &run_id, task).await?;
    Ok(run_id)
}

/// Grade an already-recorded run and write the scores and terminal status
/// back onto it.
pub async fn grade_run(state: &SharedState, run_id: &str, task: &Task) -> anyhow::Result<()> {
    let run = state
        .db
        .get_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("run {} disappeared before grading", run_id))?;
    let transcripts = state.db.transcripts_for_run(run_id)?;

    let config = build_composite_config(state, task).await;
    let result = grade_composite(&state.http_client, &run, &transcripts, &config).await;

    let status = if result.passed {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    };
    state.db.write_run_grades(
        run_id,
        result.code_grade.score,
        result.model_grade.as_ref().map(|m| m.score),
        result.score,
        status,
    )?;
    Ok(())
}

async fn build_composite_config(state: &SharedState, task: &Task) -> CompositeConfig {
    let code = CodeGradingConfig::for_checkpoints(task.checkpoints.clone());

    let settings = state.settings.read().await;
    if settings.model_grading_enabled() && !state.config.no_model_grading {
        let model = ModelGradingConfig {
            judge_url: settings.judge_url(),
            judge_key: settings.judge_key(),
            judge_model: settings.judge_model(),
            task_description: task.description.clone(),
            checkpoints: task.checkpoints.clone(),
        };
        CompositeConfig::with_model(code, model)
    } else {
        CompositeConfig::code_only(code)
    }
}

// ============================================================================
// Mock conversation
// ============================================================================

/// Canned refund dialogue with jittered per-turn latencies. Keeps the whole
/// pipeline exercisable without any external service.
fn run_mock_conversation(
    state: &SharedState,
    run_id: &str,
    task: &Task,
) -> anyhow::Result<MetricsSnapshot> {
    let mut rng = rand::rng();

    let turns: &[(Role, &str)] = &[
        (Role::System, "Starting evaluation task"),
        (Role::User, "Hi, I have a question about a refund"),
        (
            Role::Agent,
            "Of course, I can help with that. Could you give me your order number?",
        ),
        (Role::User, "The order number is A20260108001"),
        (
            Role::Agent,
            "Found it, the order from January 8. I've submitted the refund request; it should arrive within 1-3 business days.",
        ),
        (Role::User, "Great, thank you"),
        (Role::System, "Task completed"),
    ];

    for (i, (role, content)) in turns.iter().enumerate() {
        let content = if i == 0 {
            format!("{}: {}", content, task.name)
        } else {
            (*content).to_string()
        };
        let (asr, llm, tts) = match role {
            Role::User => (Some(rng.random_range(250.0..350.0)), None, None),
            Role::Agent => (
                None,
                Some(rng.random_range(400.0..600.0)),
                Some(rng.random_range(300.0..400.0)),
            ),
            Role::System => (None, None, None),
        };
        save_transcript(state, run_id, i as i64, *role, &content, asr, llm, tts)?;
    }

    Ok(generate_mock_metrics(&mut rng))
}

/// Simulated run-level metrics: plausible stage latencies, strong intent
/// accuracy, 80% completion rate.
fn generate_mock_metrics(rng: &mut impl Rng) -> MetricsSnapshot {
    MetricsSnapshot {
        asr_latency: Some(rng.random_range(200.0..400.0)),
        llm_ttf: Some(rng.random_range(300.0..700.0)),
        tts_latency: Some(rng.random_range(150.0..350.0)),
        e2e_latency: Some(rng.random_range(800.0..1400.0)),
        intent_accuracy: Some(rng.random_range(0.7..1.0)),
        task_completion: rng.random_bool(0.8),
    }
}

// ============================================================================
// Simulated conversation
// ============================================================================

/// Drive a user-LLM conversation against a placeholder agent, collecting
/// per-turn latencies through the collector.
async fn run_simulated_conversation(
    state: &SharedState,
    run_id: &str,
    task: &Task,
) -> anyhow::Result<MetricsSnapshot> {
    let simulator = {
        let settings = state.settings.read().await;
        SimulatorConfig {
            llm_url: settings.judge_url(),
            llm_key: settings.judge_key(),
            model: settings.judge_model(),
        }
    };

    let mut collector = MetricsCollector::new();
    let mut history: Vec<SimulatorTurn> = Vec::new();
    let mut turn_index: i64 = 0;

    save_transcript(
        state,
        run_id,
        turn_index,
        Role::System,
        &format!("Starting evaluation task: {}", task.name),
        None,
        None,
        None,
    )?;
    turn_index += 1;

    for _ in 0..SIMULATOR_MAX_TURNS {
        collector.start_turn();

        let user_message =
            generate_user_message(&state.http_client, &simulator, task, &history).await?;
        // ThreadRng is not Send; it must not live across an await.
        let (asr, llm, tts) = {
            let mut rng = rand::rng();
            (
                rng.random_range(250.0..350.0),
                rng.random_range(400.0..600.0),
                rng.random_range(300.0..400.0),
            )
        };

        history.push(SimulatorTurn {
            role: SimulatorRole::User,
            content: user_message.clone(),
            timestamp: Utc::now(),
        });
        save_transcript(
            state,
            run_id,
            turn_index,
            Role::User,
            &user_message,
            Some(asr),
            None,
            None,
        )?;
        turn_index += 1;

        // Placeholder until the live agent integration lands; echoes the
        // request so checkpoint keywords can still match.
        let agent_response = format!(
            "[Simulated agent] Understood, let me take care of that: {}",
            truncate_chars(&user_message, 60)
        );
        history.push(SimulatorTurn {
            role: SimulatorRole::Assistant,
            content: agent_response.clone(),
            timestamp: Utc::now(),
        });
        save_transcript(
            state,
            run_id,
            turn_index,
            Role::Agent,
            &agent_response,
            None,
            Some(llm),
            Some(tts),
        )?;
        turn_index += 1;

        collector.end_turn(Some(asr), Some(llm), Some(tts));

        if should_end_conversation(&history, None) {
            break;
        }
    }

    save_transcript(
        state,
        run_id,
        turn_index,
        Role::System,
        "Evaluation completed",
        None,
        None,
        None,
    )?;

    let mut snapshot = collector.average_metrics();
    // The placeholder agent always works through the request; completion
    // is asserted here, intent accuracy stays unmeasured.
    snapshot.task_completion = true;
    Ok(snapshot)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[allow(clippy::too_many_arguments)]
fn save_transcript(
    state: &SharedState,
    run_id: &str,
    turn: i64,
    role: Role,
    content: &str,
    asr_latency: Option<f64>,
    llm_latency: Option<f64>,
    tts_latency: Option<f64>,
) -> anyhow::Result<()> {
    let transcript = Transcript {
        id: Uuid::new_v4().to_string(),
        run_id: run_id.to_string(),
        turn,
        role,
        content: content.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        audio_url: None,
        asr_latency,
        llm_latency,
        tts_latency,
        tool_calls: None,
    };
    state.db.insert_transcript(&transcript)
}
