use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use rollcall_core::ActionSet;
use rollcall_core::dates::DateRef;
use rollcall_core::validate::validate_action_set;

use crate::prompt;

/// Context handed to the parser for one message.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub contact_id: String,
    pub message: String,
    /// Rendered weekly timetable, one line per slot.
    pub timetable_summary: String,
    /// Date phrases extracted from the message, already resolved.
    pub date_refs: Vec<DateRef>,
}

/// Seam between the conversation engine and the language model. Tests
/// script it; production uses [`GroqClient`].
pub trait IntentParser {
    fn parse(&self, req: &IntentRequest) -> impl Future<Output = Result<ActionSet>> + Send;
}

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for an OpenAI-compatible chat-completions endpoint with
/// structured JSON-schema output.
#[derive(Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different OpenAI-compatible endpoint (self-hosted, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl IntentParser for GroqClient {
    fn parse(&self, req: &IntentRequest) -> impl Future<Output = Result<ActionSet>> + Send {
        async move {
            let body = serde_json::json!({
                "model": self.model,
                "messages": prompt::build_messages(req),
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "action_set",
                        "schema": prompt::action_set_schema(),
                    },
                },
            });

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .context("sending intent extraction request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                bail!("intent extraction failed: HTTP {status}: {text}");
            }

            let completion: ChatCompletion =
                resp.json().await.context("decoding chat completion")?;
            let content = completion
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .ok_or_else(|| anyhow::anyhow!("chat completion had no choices"))?;

            let set: ActionSet = serde_json::from_str(content)
                .context("model output did not match the action-set schema")?;
            if let Err(errors) = validate_action_set(&set) {
                let joined = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                bail!("model output failed validation: {joined}");
            }

            tracing::debug!(
                contact_id = %req.contact_id,
                actions = set.actions.len(),
                "parsed action set"
            );
            Ok(set)
        }
    }
}
