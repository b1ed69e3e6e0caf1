//! Gateway to the generative-model endpoint.
//!
//! Owns prompt construction, the outbound HTTP call with its retry
//! policy, markdown fence stripping, and strict parsing of the model's
//! JSON reply. Raw model output only ever reaches the server log, never
//! a client response.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::PipelineError;
use crate::core::project::FileOperation;
use crate::infra::config::GatewayConfig;

/// Instruction used when the caller provides no prompt. An empty prompt
/// means "general cleanup", not a validation failure.
const DEFAULT_INSTRUCTION: &str = "No specific command provided. Perform a general analysis, \
     fix any obvious bugs or logical errors, and improve code quality.";

const SYSTEM_DIRECTIVE: &str = "You are a highly precise AI code modification engine. Your only \
     function is to execute a user's command on the given code and return a JSON object. You \
     must not deviate from the user's command.";

/// Parsed shape of a model reply. Both fields must be present and be
/// arrays; anything else is rejected upstream.
#[derive(Debug, Deserialize)]
pub struct ModelReply {
    pub file_operations: Vec<FileOperation>,
    pub suggested_changes: Vec<String>,
}

/// Bounded retry with a fixed delay, applied to transport failures only.
/// Application-level errors (HTTP status, malformed body) never retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Fixed delay regardless of attempt number.
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Connection-level failures are worth retrying; anything that made
    /// it to the application layer is final.
    pub fn is_retryable(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout() || (err.status().is_none() && err.is_request())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(2) }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct AiGateway {
    client: Client,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl AiGateway {
    /// Build a gateway from configuration. The request timeout must be
    /// generous: large bundles plus model latency routinely take minutes.
    pub fn new(api_key: String, cfg: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build HTTP client for the model endpoint")?;

        Ok(Self {
            client,
            api_key,
            model: cfg.model.clone(),
            retry: RetryPolicy {
                max_attempts: cfg.max_attempts,
                delay: Duration::from_secs(cfg.retry_delay_secs),
            },
        })
    }

    /// One refinement round: send the bundle plus instruction, parse the
    /// reply into file operations and suggestions.
    pub async fn complete(
        &self,
        bundle: &str,
        instruction: &str,
    ) -> Result<ModelReply, PipelineError> {
        let prompt = build_prompt(bundle, instruction);

        tracing::info!(
            model = %self.model,
            prompt_bytes = prompt.len(),
            "sending fix request to model endpoint"
        );

        let raw = self.generate(&prompt).await?;
        parse_reply(&raw)
    }

    /// Issue the HTTP call, retrying transient transport failures with a
    /// fixed delay. Returns the text of the first candidate.
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let payload = serde_json::json!({
            "systemInstruction": {
                "parts": [{"text": SYSTEM_DIRECTIVE}]
            },
            "contents": [
                {"parts": [{"text": prompt}]}
            ],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let mut attempt = 1u32;
        loop {
            match self.client.post(&url).json(&payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(PipelineError::AiRequest(format!(
                            "model endpoint returned status {status}"
                        )));
                    }

                    let body: Value = response.json().await.map_err(|e| {
                        PipelineError::AiRequest(format!(
                            "failed to read model response body: {e}"
                        ))
                    })?;

                    return candidate_text(&body);
                }
                Err(err) if attempt < self.retry.max_attempts && RetryPolicy::is_retryable(&err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "transient failure calling model endpoint, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(PipelineError::AiRequest(format!(
                        "model request failed after {attempt} attempt(s): {err}"
                    )));
                }
            }
        }
    }
}

/// Pull the first candidate's text out of the response envelope.
fn candidate_text(body: &Value) -> Result<String, PipelineError> {
    body.get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::AiRequest("model response contained no text candidate".to_string())
        })
}

/// Assemble the full prompt around the bundle. The response-format rules
/// are the load-bearing part: the reply is parsed strictly, so the model
/// must emit exactly two arrays and escape `content` as a single-line
/// JSON string.
pub fn build_prompt(bundle: &str, instruction: &str) -> String {
    let command = if instruction.trim().is_empty() {
        DEFAULT_INSTRUCTION
    } else {
        instruction
    };

    format!(
        r#"--- YOUR DIRECTIVE ---
You have one critical task: analyze the "USER'S COMMAND" and execute it on the provided "PROJECT FILES".

--- OPERATING PROCEDURE ---
1. Read the "USER'S COMMAND" carefully and understand its intent.
2. Perform the requested operation on the relevant file(s) from the "PROJECT FILES" section.
3. Verify your work: before generating the final JSON, check that the new code directly accomplishes what the user asked for. This verification step is mandatory.
4. Generate a response in the specified JSON format.

--- USER'S COMMAND ---
{command}
--- END USER'S COMMAND ---

--- RESPONSE FORMAT ---
Your output must be a single, valid JSON object with this exact structure:
{{
  "file_operations": [
    {{
      "filename": "path/to/file.ext",
      "content": "...",
      "action": "modified" | "created",
      "explanation": "A concise, one-sentence summary of what you did."
    }}
  ],
  "suggested_changes": [
    "A clear, actionable suggestion for a future improvement."
  ]
}}

RULES:
- ABSOLUTE PRIORITY: the "USER'S COMMAND" overrides any other impulse.
- EFFICIENCY: the "file_operations" array MUST ONLY contain files that were 'modified' or 'created'. Never echo unchanged files back.
- ESCAPING: the "content" field MUST be a single-line JSON string with all special characters (quote, backslash, newline, tab) properly escaped.

--- PROJECT FILES ---
{bundle}
--- END PROJECT FILES ---
"#
    )
}

/// Strip one leading/trailing triple-backtick fence, optionally tagged
/// `json`. Models wrap JSON in fences often enough that this is part of
/// the wire format.
pub fn strip_code_fence(text: &str) -> &str {
    static FENCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("static fence pattern")
    });

    let trimmed = text.trim();
    match FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

/// Strictly parse a model reply. On failure the raw text goes to the
/// server log for diagnosis; the caller only sees the error category.
pub fn parse_reply(raw: &str) -> Result<ModelReply, PipelineError> {
    let body = strip_code_fence(raw);

    match serde_json::from_str::<ModelReply>(body) {
        Ok(reply) => {
            tracing::info!(
                operations = reply.file_operations.len(),
                suggestions = reply.suggested_changes.len(),
                "parsed model reply"
            );
            Ok(reply)
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                raw = %log_excerpt(raw),
                "model returned a malformed reply"
            );
            Err(PipelineError::AiResponseFormat(format!(
                "model reply did not match the expected JSON shape: {err}"
            )))
        }
    }
}

/// Bounded excerpt of raw model output for log lines.
fn log_excerpt(raw: &str) -> &str {
    const MAX: usize = 512;
    match raw.char_indices().nth(MAX) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
