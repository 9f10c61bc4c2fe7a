use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Averaged latency snapshot for a whole run.
///
/// `intent_accuracy` and `task_completion` are always left at their defaults
/// here; graders fill them in, never the latency pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// ASR processing time (ms)
    pub asr_latency: Option<f64>,
    /// LLM time to first token (ms)
    pub llm_ttf: Option<f64>,
    /// TTS processing time (ms)
    pub tts_latency: Option<f64>,
    /// End-to-end latency (ms), modeled as ASR + LLM + TTS
    pub e2e_latency: Option<f64>,
    /// Intent recognition accuracy (0-1)
    pub intent_accuracy: Option<f64>,
    pub task_completion: bool,
}

impl MetricsSnapshot {
    pub fn empty() -> Self {
        Self {
            asr_latency: None,
            llm_ttf: None,
            tts_latency: None,
            e2e_latency: None,
            intent_accuracy: None,
            task_completion: false,
        }
    }
}

/// Latencies measured for a single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub turn_index: usize,
    pub asr_latency: Option<f64>,
    pub llm_latency: Option<f64>,
    pub tts_latency: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Reduce per-turn latencies to a run-level snapshot.
///
/// Each field averages only the turns that actually supplied a sample; a
/// field with no samples stays `None`. E2E is the serial sum of the three
/// stage averages and is only defined when all three are.
pub fn average_metrics(turns: &[TurnMetrics]) -> MetricsSnapshot {
    if turns.is_empty() {
        return MetricsSnapshot::empty();
    }

    let asr: Vec<f64> = turns.iter().filter_map(|t| t.asr_latency).collect();
    let llm: Vec<f64> = turns.iter().filter_map(|t| t.llm_latency).collect();
    let tts: Vec<f64> = turns.iter().filter_map(|t| t.tts_latency).collect();

    let asr_avg = mean(&asr);
    let llm_avg = mean(&llm);
    let tts_avg = mean(&tts);

    let e2e = match (asr_avg, llm_avg, tts_avg) {
        (Some(a), Some(l), Some(t)) => Some(a + l + t),
        _ => None,
    };

    MetricsSnapshot {
        asr_latency: asr_avg,
        llm_ttf: llm_avg,
        tts_latency: tts_avg,
        e2e_latency: e2e,
        intent_accuracy: None,
        task_completion: false,
    }
}

/// Collects turn metrics for one run via an explicit start/end protocol.
///
/// Sequential and stateful: one collector per run, never shared across
/// concurrent runs. Out-of-order calls (double start, end without start)
/// are misuse; they warn and skip instead of corrupting accumulated turns.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    turns: Vec<TurnMetrics>,
    current_turn_start: Option<DateTime<Utc>>,
    next_turn_index: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_turn(&mut self) {
        if self.current_turn_start.is_some() {
            warn!("start_turn called while a turn is already in progress; ignoring");
            return;
        }
        self.current_turn_start = Some(Utc::now());
    }

    pub fn end_turn(
        &mut self,
        asr_latency: Option<f64>,
        llm_latency: Option<f64>,
        tts_latency: Option<f64>,
    ) {
        let Some(start) = self.current_turn_start.take() else {
            warn!("end_turn called without start_turn; ignoring");
            return;
        };
        self.turns.push(TurnMetrics {
            turn_index: self.next_turn_index,
            asr_latency,
            llm_latency,
            tts_latency,
            start_time: start,
            end_time: Utc::now(),
        });
        self.next_turn_index += 1;
    }

    pub fn turns(&self) -> &[TurnMetrics] {
        &self.turns
    }

    pub fn average_metrics(&self) -> MetricsSnapshot {
        average_metrics(&self.turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(asr: Option<f64>, llm: Option<f64>, tts: Option<f64>) -> TurnMetrics {
        let now = Utc::now();
        TurnMetrics {
            turn_index: 0,
            asr_latency: asr,
            llm_latency: llm,
            tts_latency: tts,
            start_time: now,
            end_time: now,
        }
    }

    #[test]
    fn test_empty_turns_all_null() {
        let snapshot = average_metrics(&[]);
        assert_eq!(snapshot, MetricsSnapshot::empty());
    }

    #[test]
    fn test_averages_skip_missing_samples() {
        let turns = vec![
            turn(Some(200.0), Some(400.0), None),
            turn(Some(300.0), None, Some(100.0)),
            turn(None, Some(600.0), Some(300.0)),
        ];
        let snapshot = average_metrics(&turns);
        assert_eq!(snapshot.asr_latency, Some(250.0));
        assert_eq!(snapshot.llm_ttf, Some(500.0));
        assert_eq!(snapshot.tts_latency, Some(200.0));
        // all three present, so e2e is their sum
        assert_eq!(snapshot.e2e_latency, Some(950.0));
    }

    #[test]
    fn test_e2e_null_when_any_stage_missing() {
        // no tts samples anywhere
        let turns = vec![
            turn(Some(200.0), Some(400.0), None),
            turn(Some(300.0), Some(500.0), None),
        ];
        let snapshot = average_metrics(&turns);
        assert_eq!(snapshot.asr_latency, Some(250.0));
        assert!(snapshot.e2e_latency.is_none());
    }

    #[test]
    fn test_e2e_defined_for_zero_averages() {
        // a 0ms average is a real sample, not a missing one
        let turns = vec![turn(Some(0.0), Some(0.0), Some(0.0))];
        let snapshot = average_metrics(&turns);
        assert_eq!(snapshot.e2e_latency, Some(0.0));
    }

    #[test]
    fn test_collector_records_turns_in_order() {
        let mut collector = MetricsCollector::new();
        collector.start_turn();
        collector.end_turn(Some(250.0), Some(400.0), Some(300.0));
        collector.start_turn();
        collector.end_turn(Some(350.0), Some(600.0), Some(100.0));

        let turns = collector.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].turn_index, 0);
        assert_eq!(turns[1].turn_index, 1);

        let snapshot = collector.average_metrics();
        assert_eq!(snapshot.asr_latency, Some(300.0));
        assert_eq!(snapshot.e2e_latency, Some(1000.0));
    }

    #[test]
    fn test_collector_end_without_start_is_skipped() {
        let mut collector = MetricsCollector::new();
        collector.end_turn(Some(250.0), None, None);
        assert!(collector.turns().is_empty());
    }

    #[test]
    fn test_collector_double_start_keeps_first_turn() {
        let mut collector = MetricsCollector::new();
        collector.start_turn();
        collector.start_turn();
        collector.end_turn(Some(100.0), None, None);
        assert_eq!(collector.turns().len(), 1);

        // collector is usable again after the misuse
        collector.start_turn();
        collector.end_turn(Some(200.0), None, None);
        assert_eq!(collector.turns().len(), 2);
    }
}
