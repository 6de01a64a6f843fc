//! LLM-assisted task drafting against an OpenAI-compatible endpoint.
//!
//! The endpoint and model come from the settings store. The reply is
//! expected to contain a single JSON task draft, possibly wrapped in a
//! markdown code fence; the draft is returned to the caller, not persisted.

use crate::error::ApiError;
use crate::types::TaskDraft;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fallback endpoint when the setting is missing.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234";

/// Fallback model when the setting is missing.
pub const DEFAULT_MODEL: &str = "google/gemma-3n-e4b";

const SYSTEM_PROMPT: &str = "You are a task-creation assistant. From the user's \
description, produce a single task as JSON: {\"title\": \"...\", \"description\": \
\"...\", \"priority\": \"low|medium|high\", \"xp\": 10, \"deadline\": \"YYYY-MM-DD\"}. \
Pick priority and xp from the task's difficulty. Respond with the JSON object only.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for one chat-completion round-trip.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl LlmClient {
    /// Build a client for the given endpoint and model. The timeout bounds
    /// the whole request so a dead endpoint cannot wedge its caller.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(ApiError::llm_unavailable)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Ask the LLM to draft a task from a free-form prompt.
    pub async fn generate_task(&self, prompt: &str) -> Result<TaskDraft, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: 200,
            temperature: 0.7,
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::llm_unavailable)?;

        if !response.status().is_success() {
            return Err(ApiError::llm_unavailable(format!(
                "LLM endpoint returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response.json().await.map_err(ApiError::llm_parse)?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| ApiError::llm_parse("response contained no choices"))?;

        parse_task_json(content)
    }
}

/// Extract the task JSON from an LLM reply, tolerating a markdown code
/// fence around it, and parse it into a draft.
pub fn parse_task_json(reply: &str) -> Result<TaskDraft, ApiError> {
    let mut payload = reply.trim();

    if let Ok(fence) = regex_lite::Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```")
        && let Some(captures) = fence.captures(payload)
        && let Some(inner) = captures.get(1)
    {
        payload = inner.as_str();
    }

    let draft: TaskDraft = serde_json::from_str(payload).map_err(ApiError::llm_parse)?;
    if draft.title.trim().is_empty() {
        return Err(ApiError::llm_parse("generated task has an empty title"));
    }

    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    #[test]
    fn parses_bare_json() {
        let draft =
            parse_task_json(r#"{"title": "Write report", "priority": "high", "xp": 30}"#).unwrap();
        assert_eq!(draft.title, "Write report");
        assert_eq!(draft.priority, Some(Priority::High));
        assert_eq!(draft.xp, Some(30));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Here is your task:\n```json\n{\"title\": \"Buy milk\", \"deadline\": \"2026-08-10\"}\n```";
        let draft = parse_task_json(reply).unwrap();
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.deadline.as_deref(), Some("2026-08-10"));
    }

    #[test]
    fn parses_fence_without_language_tag() {
        let reply = "```\n{\"title\": \"Stretch\"}\n```";
        let draft = parse_task_json(reply).unwrap();
        assert_eq!(draft.title, "Stretch");
    }

    #[test]
    fn rejects_non_json_reply() {
        let err = parse_task_json("Sorry, I can't help with that.").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::LlmParseError);
    }

    #[test]
    fn rejects_empty_title() {
        let err = parse_task_json(r#"{"title": "  "}"#).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::LlmParseError);
    }
}
