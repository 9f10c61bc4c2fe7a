use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::EvalDb;
use crate::grading::{aggregate_metrics, AggregateMetrics, TrialOutcome};
use crate::model::{RunStatus, TaskType};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_tasks: usize,
    pub capability_tasks: usize,
    pub regression_tasks: usize,
    pub total_runs: usize,
    /// Percentage, one decimal
    pub avg_pass_rate: f64,
    /// Mean e2e latency over runs that measured one, rounded to ms
    pub avg_latency_ms: f64,
    pub suites: Vec<SuiteHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteHealth {
    pub id: String,
    pub name: String,
    pub description: String,
    pub task_count: usize,
    /// Percentage, rounded
    pub pass_rate: f64,
    pub last_run: Option<String>,
    pub status: SuiteStatus,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    Healthy,
    Warning,
    /// Pass rate so high the suite no longer discriminates
    Saturated,
}

fn suite_status(pass_rate_pct: f64) -> SuiteStatus {
    if pass_rate_pct >= 95.0 {
        SuiteStatus::Saturated
    } else if pass_rate_pct >= 80.0 {
        SuiteStatus::Healthy
    } else {
        SuiteStatus::Warning
    }
}

/// Headline numbers for the dashboard, plus per-suite health.
pub fn dashboard_metrics(db: &EvalDb) -> anyhow::Result<DashboardMetrics> {
    let tasks = db.list_tasks()?;
    let suites = db.list_suites()?;

    // (task_id, status, e2e_latency, start_time) for every run
    let runs: Vec<(String, RunStatus, Option<f64>, String)> = {
        let conn = db.conn();
        let mut stmt =
            conn.prepare("SELECT task_id, status, e2e_latency, start_time FROM runs")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        rows.filter_map(|r| r.ok())
            .filter_map(|(task_id, status, e2e, start)| {
                RunStatus::parse(&status).map(|s| (task_id, s, e2e, start))
            })
            .collect()
    };

    let passed = runs
        .iter()
        .filter(|(_, status, _, _)| *status == RunStatus::Passed)
        .count();
    let avg_pass_rate = if runs.is_empty() {
        0.0
    } else {
        (passed as f64 / runs.len() as f64) * 100.0
    };

    let latencies: Vec<f64> = runs.iter().filter_map(|(_, _, e2e, _)| *e2e).collect();
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        (latencies.iter().sum::<f64>() / latencies.len() as f64).round()
    };

    let suite_health = suites
        .into_iter()
        .map(|suite| {
            let suite_runs: Vec<_> = runs
                .iter()
                .filter(|(task_id, _, _, _)| suite.task_ids.contains(task_id))
                .collect();
            let suite_passed = suite_runs
                .iter()
                .filter(|(_, status, _, _)| *status == RunStatus::Passed)
                .count();
            let pass_rate = if suite_runs.is_empty() {
                0.0
            } else {
                ((suite_passed as f64 / suite_runs.len() as f64) * 100.0).round()
            };
            let last_run = suite_runs
                .iter()
                .map(|(_, _, _, start)| start.clone())
                .max();

            SuiteHealth {
                id: suite.id,
                name: suite.name,
                description: suite.description,
                task_count: suite.task_ids.len(),
                pass_rate,
                last_run,
                status: suite_status(pass_rate),
            }
        })
        .collect();

    Ok(DashboardMetrics {
        total_tasks: tasks.len(),
        capability_tasks: tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Capability)
            .count(),
        regression_tasks: tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Regression)
            .count(),
        total_runs: runs.len(),
        avg_pass_rate: (avg_pass_rate * 10.0).round() / 10.0,
        avg_latency_ms,
        suites: suite_health,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyTrendPoint {
    pub date: String,
    pub asr: f64,
    pub llm: f64,
    pub tts: f64,
}

/// Per-day stage latency averages over the last 7 days, oldest first.
pub fn latency_trend(db: &EvalDb) -> anyhow::Result<Vec<LatencyTrendPoint>> {
    let cutoff = Utc::now() - Duration::days(7);

    let rows: Vec<(String, Option<f64>, Option<f64>, Option<f64>)> = {
        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT start_time, asr_latency, llm_ttf, tts_latency FROM runs")?;
        let mapped = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?;
        mapped.filter_map(|r| r.ok()).collect()
    };

    let mut by_date: BTreeMap<String, (Vec<f64>, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (start_time, asr, llm, tts) in rows {
        let Ok(parsed) = DateTime::parse_from_rfc3339(&start_time) else {
            continue;
        };
        if parsed.with_timezone(&Utc) < cutoff {
            continue;
        }
        let day = parsed.format("%Y-%m-%d").to_string();
        let entry = by_date.entry(day).or_default();
        if let Some(v) = asr {
            entry.0.push(v);
        }
        if let Some(v) = llm {
            entry.1.push(v);
        }
        if let Some(v) = tts {
            entry.2.push(v);
        }
    }

    let avg = |samples: &[f64]| {
        if samples.is_empty() {
            0.0
        } else {
            (samples.iter().sum::<f64>() / samples.len() as f64).round()
        }
    };

    Ok(by_date
        .into_iter()
        .map(|(date, (asr, llm, tts))| LatencyTrendPoint {
            date,
            asr: avg(&asr),
            llm: avg(&llm),
            tts: avg(&tts),
        })
        .collect())
}

/// Reliability report for one task: its graded runs in execution order,
/// reduced to pass@k / pass^k metrics.
pub fn task_reliability(db: &EvalDb, task_id: &str) -> anyhow::Result<AggregateMetrics> {
    let runs = db.graded_runs_for_task(task_id)?;
    let trials: Vec<TrialOutcome> = runs
        .iter()
        .map(|run| TrialOutcome {
            score: run.composite_score.or(run.code_score).unwrap_or(0.0),
            passed: run.status == RunStatus::Passed,
        })
        .collect();
    Ok(aggregate_metrics(&trials))
}
