use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SIMULATOR_MAX_TOKENS, SIMULATOR_MAX_TURNS, SIMULATOR_TEMPERATURE};
use crate::model::Task;

/// Endpoint for the user-side LLM. Shares the judge's OpenAI-compatible
/// wire shape but its own sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub llm_url: String,
    pub llm_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorRole {
    User,
    Assistant,
}

impl SimulatorRole {
    fn as_str(&self) -> &'static str {
        match self {
            SimulatorRole::User => "user",
            SimulatorRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorTurn {
    pub role: SimulatorRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ask the simulator LLM for the next user utterance given the conversation
/// so far. Unlike grading, a simulator failure is a real error — without a
/// user message the conversation cannot continue.
pub async fn generate_user_message(
    client: &reqwest::Client,
    config: &SimulatorConfig,
    task: &Task,
    history: &[SimulatorTurn],
) -> anyhow::Result<String> {
    let system_prompt = build_simulator_prompt(task, history);

    let mut messages = vec![serde_json::json!({ "role": "system", "content": system_prompt })];
    for turn in history {
        messages.push(serde_json::json!({
            "role": turn.role.as_str(),
            "content": turn.content,
        }));
    }
    messages.push(serde_json::json!({
        "role": "user",
        "content": "Generate the next user message.",
    }));

    let resp = client
        .post(&config.llm_url)
        .bearer_auth(&config.llm_key)
        .json(&serde_json::json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": SIMULATOR_MAX_TOKENS,
            "temperature": SIMULATOR_TEMPERATURE,
        }))
        .send()
        .await?;

    if !resp.status().is_success() {
        anyhow::bail!("simulator API returned {}", resp.status());
    }

    let body: serde_json::Value = resp.json().await?;
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    if content.is_empty() {
        anyhow::bail!("simulator returned an empty message");
    }
    Ok(content)
}

fn build_simulator_prompt(task: &Task, history: &[SimulatorTurn]) -> String {
    let user_turns = history
        .iter()
        .filter(|t| t.role == SimulatorRole::User)
        .count();

    let checkpoints = if task.checkpoints.is_empty() {
        "None specified".to_string()
    } else {
        task.checkpoints
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let opening_instruction = if user_turns == 0 {
        "Start the conversation with your initial request"
    } else {
        "Continue the conversation naturally based on the agent's response"
    };

    format!(
        r#"You are simulating a user in a voice agent evaluation scenario.

## Task: {name}
{description}

## Checkpoints to cover:
{checkpoints}

## Your role:
- Act as a realistic user interacting with a voice AI agent
- Be natural and conversational (this is a spoken dialogue)
- Keep responses brief (1-2 sentences typical for voice)
- {opening_instruction}
- Try to cover the checkpoints through the conversation
- If the task seems complete, you can end with a brief acknowledgment

## Important:
- Output ONLY the user's spoken message, nothing else
- Do not include quotation marks or role labels
- Be concise - this is voice, not text chat"#,
        name = task.name,
        description = task.description,
    )
}

// Closing phrases that signal the agent is wrapping up. Bilingual, same
// rationale as the grader's error indicators.
const ENDING_PHRASES: &[&str] = &[
    "再见",
    "感谢",
    "祝您",
    "还有其他",
    "需要帮助",
    "goodbye",
    "anything else",
];

/// End once the user turn budget is spent, or after the agent used a
/// closing phrase and the user already got a final word in.
pub fn should_end_conversation(history: &[SimulatorTurn], max_turns: Option<usize>) -> bool {
    let max_turns = max_turns.unwrap_or(SIMULATOR_MAX_TURNS);
    let user_turns = history
        .iter()
        .filter(|t| t.role == SimulatorRole::User)
        .count();
    if user_turns >= max_turns {
        return true;
    }

    let last_agent_idx = history
        .iter()
        .rposition(|t| t.role == SimulatorRole::Assistant);
    let last_user_idx = history.iter().rposition(|t| t.role == SimulatorRole::User);

    if let Some(agent_idx) = last_agent_idx {
        let agent_msg = &history[agent_idx].content.to_lowercase();
        let is_closing = ENDING_PHRASES.iter().any(|p| agent_msg.contains(p));
        if is_closing {
            if let Some(user_idx) = last_user_idx {
                if user_idx > agent_idx {
                    return true;
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: SimulatorRole, content: &str) -> SimulatorTurn {
        SimulatorTurn {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_ends_at_max_turns() {
        let history: Vec<SimulatorTurn> = (0..10)
            .flat_map(|_| {
                vec![
                    turn(SimulatorRole::User, "hi"),
                    turn(SimulatorRole::Assistant, "hello"),
                ]
            })
            .collect();
        assert!(should_end_conversation(&history, None));
    }

    #[test]
    fn test_ends_after_closing_phrase_and_user_reply() {
        let history = vec![
            turn(SimulatorRole::User, "thanks for the help"),
            turn(SimulatorRole::Assistant, "Is there anything else I can do? Goodbye!"),
            turn(SimulatorRole::User, "no, that's all"),
        ];
        assert!(should_end_conversation(&history, None));
    }

    #[test]
    fn test_waits_for_user_reply_after_closing_phrase() {
        let history = vec![
            turn(SimulatorRole::User, "thanks for the help"),
            turn(SimulatorRole::Assistant, "Goodbye!"),
        ];
        assert!(!should_end_conversation(&history, None));
    }

    #[test]
    fn test_continues_mid_conversation() {
        let history = vec![
            turn(SimulatorRole::User, "I'd like a refund"),
            turn(SimulatorRole::Assistant, "Sure, what's your order number?"),
        ];
        assert!(!should_end_conversation(&history, None));
    }
}
