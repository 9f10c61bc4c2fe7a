use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{
    JUDGE_MAX_TOKENS, JUDGE_TEMPERATURE, PASS_SCORE_THRESHOLD, RUBRIC_COMPONENT_MAX,
};
use crate::model::{Role, Transcript};

/// Connection and context for the external judge service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGradingConfig {
    /// OpenAI-compatible chat completions endpoint
    pub judge_url: String,
    pub judge_key: String,
    pub judge_model: String,
    pub task_description: String,
    pub checkpoints: Vec<String>,
}

/// The four rubric components, each 0-25.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RubricScores {
    pub task_completion: f64,
    pub conversation_quality: f64,
    pub empathy: f64,
    pub efficiency: f64,
}

impl RubricScores {
    pub fn total(&self) -> f64 {
        self.task_completion + self.conversation_quality + self.empathy + self.efficiency
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGradeResult {
    /// 0-100, sum of the rubric components
    pub score: f64,
    pub passed: bool,
    pub rubric: RubricScores,
    pub explanation: String,
}

impl ModelGradeResult {
    /// Deterministic fallback for judge failures: zero everywhere, with the
    /// reason carried in the explanation.
    pub fn zero(explanation: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            passed: false,
            rubric: RubricScores::default(),
            explanation: explanation.into(),
        }
    }
}

const GRADING_SYSTEM_PROMPT: &str = r#"You are an expert evaluator for voice AI agent conversations.
Grade the conversation based on the following rubric:

1. Task Completion (0-25): Did the agent successfully complete the user's request?
2. Conversation Quality (0-25): Was the conversation natural, coherent, and appropriate?
3. Empathy (0-25): Did the agent show appropriate emotional intelligence and understanding?
4. Efficiency (0-25): Was the conversation efficient without unnecessary back-and-forth?

Respond in JSON format:
{
  "task_completion": <0-25>,
  "conversation_quality": <0-25>,
  "empathy": <0-25>,
  "efficiency": <0-25>,
  "explanation": "<brief explanation of the scores>"
}"#;

/// Build the user message for the judge: task context, enumerated
/// checkpoints, and the conversation with system turns stripped.
pub fn build_grading_prompt(transcripts: &[Transcript], config: &ModelGradingConfig) -> String {
    let conversation = transcripts
        .iter()
        .filter(|t| t.role != Role::System)
        .map(|t| {
            let speaker = if t.role == Role::User { "User" } else { "Agent" };
            format!("{}: {}", speaker, t.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let checkpoints = if config.checkpoints.is_empty() {
        "None specified".to_string()
    } else {
        config
            .checkpoints
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "## Task Description\n{}\n\n## Checkpoints\n{}\n\n## Conversation\n{}\n\nPlease evaluate this conversation.",
        config.task_description, checkpoints, conversation
    )
}

/// Single request to the judge, no retries. Failures surface as `Err` so
/// the zero-result fallback in `grade_with_model` is an explicit branch.
async fn call_judge(
    client: &reqwest::Client,
    config: &ModelGradingConfig,
    prompt: &str,
) -> anyhow::Result<String> {
    let resp = client
        .post(&config.judge_url)
        .bearer_auth(&config.judge_key)
        .json(&serde_json::json!({
            "model": config.judge_model,
            "messages": [
                { "role": "system", "content": GRADING_SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": JUDGE_MAX_TOKENS,
            "temperature": JUDGE_TEMPERATURE,
        }))
        .send()
        .await?;

    if !resp.status().is_success() {
        anyhow::bail!("judge API returned {}", resp.status());
    }

    let body: serde_json::Value = resp.json().await?;
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    Ok(content)
}

/// Grade a conversation via the LLM judge. Never fails: network errors and
/// unparseable responses both degrade to a zero result with an explanation.
pub async fn grade_with_model(
    client: &reqwest::Client,
    transcripts: &[Transcript],
    config: &ModelGradingConfig,
) -> ModelGradeResult {
    let prompt = build_grading_prompt(transcripts, config);

    match call_judge(client, config, &prompt).await {
        Ok(raw) => parse_grading_response(&raw),
        Err(e) => {
            warn!("Model grading failed: {:#}", e);
            ModelGradeResult::zero(format!("Grading failed: {}", e))
        }
    }
}

/// Extract the first balanced-brace `{...}` object from the raw judge
/// output. Judges often wrap the JSON in prose or markdown fences.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the judge's text into rubric scores, clamping each component into
/// [0, 25]. Missing fields count as 0.
pub fn parse_grading_response(raw: &str) -> ModelGradeResult {
    let Some(json_str) = extract_json_object(raw) else {
        // char-based truncation: judge output may be non-ASCII
        let preview: String = raw.chars().take(200).collect();
        warn!("No JSON object in judge response: {}", preview);
        return ModelGradeResult::zero("Failed to parse grading response");
    };

    let parsed: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid JSON in judge response: {}", e);
            return ModelGradeResult::zero("Failed to parse grading response");
        }
    };

    let component = |key: &str| -> f64 {
        parsed
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, RUBRIC_COMPONENT_MAX)
    };

    let rubric = RubricScores {
        task_completion: component("task_completion"),
        conversation_quality: component("conversation_quality"),
        empathy: component("empathy"),
        efficiency: component("efficiency"),
    };

    let score = rubric.total();
    ModelGradeResult {
        score,
        passed: score >= PASS_SCORE_THRESHOLD,
        rubric,
        explanation: parsed
            .get("explanation")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let raw = r#"{"task_completion": 20, "conversation_quality": 22, "empathy": 18, "efficiency": 21, "explanation": "Solid handling"}"#;
        let result = parse_grading_response(raw);
        assert_eq!(result.score, 81.0);
        assert!(result.passed);
        assert_eq!(result.rubric.task_completion, 20.0);
        assert_eq!(result.explanation, "Solid handling");
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let raw = r#"Here is my evaluation:
```json
{"task_completion": 15, "conversation_quality": 15, "empathy": 10, "efficiency": 10, "explanation": "ok"}
```
Let me know if you need more detail."#;
        let result = parse_grading_response(raw);
        assert_eq!(result.score, 50.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_parse_clamps_out_of_range_components() {
        let raw = r#"{"task_completion": 30, "conversation_quality": -5, "empathy": 25, "efficiency": 20, "explanation": ""}"#;
        let result = parse_grading_response(raw);
        assert_eq!(result.rubric.task_completion, 25.0);
        assert_eq!(result.rubric.conversation_quality, 0.0);
        assert_eq!(result.score, 70.0);
        assert!(result.passed);
    }

    #[test]
    fn test_parse_missing_fields_count_as_zero() {
        let raw = r#"{"task_completion": 25, "explanation": "partial"}"#;
        let result = parse_grading_response(raw);
        assert_eq!(result.score, 25.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_no_json_yields_zero_result() {
        let result = parse_grading_response("The conversation went well, I'd say 8/10.");
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
        assert_eq!(result.explanation, "Failed to parse grading response");
    }

    #[test]
    fn test_extract_json_handles_braces_in_strings() {
        let raw = r#"note {"explanation": "uses {braces} inside", "task_completion": 5} trailing"#;
        let json = extract_json_object(raw).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["task_completion"], 5);
    }
}
