//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the meeting assistant LLM.
//! It implements the `GenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use kova_core::{
    domain::Goal,
    ports::{GenerationService, PortError, PortResult},
};

/// Upper bound on goals taken from one suggestion reply.
pub const MAX_SUGGESTED_GOALS: usize = 5;

const SUGGEST_SYSTEM_PROMPT: &str = "You help two entrepreneurs plan a short video meeting. \
Given a topic, reply with three to five concrete, short meeting goals, one per line, \
with no numbering, no bullets and no extra commentary.";

const SUMMARY_SYSTEM_PROMPT: &str = "You write brief recaps of meetings between entrepreneurs. \
Using the goals (with their completion state) and the notes provided, write a friendly summary \
of two to four sentences followed by a short list of suggested next steps.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    suggest_model: String,
    summary_model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, suggest_model: String, summary_model: String) -> Self {
        Self {
            client,
            suggest_model,
            summary_model,
        }
    }

    async fn complete(&self, model: &str, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| match e {
                OpenAIError::Reqwest(inner) => PortError::Network(inner.to_string()),
                other => PortError::Unexpected(other.to_string()),
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("LLM response contained no text content.".to_string())
            })
    }
}

/// Turns a reply into goal texts, dropping list markers the model adds anyway.
pub fn parse_goal_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', '-', '*', '•'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTED_GOALS)
        .collect()
}

/// The user message for the recap request.
pub fn summary_prompt(goals: &[Goal], notes: &str) -> String {
    let mut prompt = String::from("GOALS:\n");
    if goals.is_empty() {
        prompt.push_str("(none set)\n");
    }
    for goal in goals {
        let mark = if goal.completed { "x" } else { " " };
        prompt.push_str(&format!("[{}] {}\n", mark, goal.text));
    }
    prompt.push_str("\nNOTES:\n");
    if notes.trim().is_empty() {
        prompt.push_str("(no notes)");
    } else {
        prompt.push_str(notes.trim());
    }
    prompt
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn suggest_goals(&self, topic: &str) -> PortResult<Vec<String>> {
        let reply = self
            .complete(
                &self.suggest_model,
                SUGGEST_SYSTEM_PROMPT,
                format!("TOPIC: {}", topic.trim()),
            )
            .await?;
        Ok(parse_goal_lines(&reply))
    }

    async fn summarize(&self, goals: &[Goal], notes: &str) -> PortResult<String> {
        self.complete(
            &self.summary_model,
            SUMMARY_SYSTEM_PROMPT,
            summary_prompt(goals, notes),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn list_markers_are_stripped() {
        let reply = "1. Agree on pilot scope\n- Share metrics\n\n* Pick a date\n2) Intro the CTO";
        assert_eq!(
            parse_goal_lines(reply),
            vec![
                "Agree on pilot scope",
                "Share metrics",
                "Pick a date",
                "Intro the CTO"
            ]
        );
    }

    #[test]
    fn suggestions_are_capped() {
        let reply = (1..=8).map(|i| format!("Goal {i}\n")).collect::<String>();
        assert_eq!(parse_goal_lines(&reply).len(), MAX_SUGGESTED_GOALS);
    }

    #[test]
    fn summary_prompt_marks_completed_goals() {
        let goals = vec![
            Goal {
                id: Uuid::new_v4(),
                text: "Ship beta".into(),
                completed: true,
            },
            Goal {
                id: Uuid::new_v4(),
                text: "Hire designer".into(),
                completed: false,
            },
        ];
        let prompt = summary_prompt(&goals, "  Follow up Friday ");
        assert!(prompt.contains("[x] Ship beta"));
        assert!(prompt.contains("[ ] Hire designer"));
        assert!(prompt.ends_with("Follow up Friday"));
        assert!(summary_prompt(&[], "").contains("(no notes)"));
    }
}
