//! OpenAI Responses API client for the `computer_use_preview` tool, with
//! automatic retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
use super::{ComputerCall, ContextItem, ModelClient, ModelContext, ModelResponse, Reply, TokenUsage};
use crate::action::Action;
use crate::config::Config;
use crate::safety::SafetyCheck;

pub struct OpenAiResponsesClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    tool: ComputerTool,
    retry_config: RetryConfig,
}

impl OpenAiResponsesClient {
    /// Build a client from explicit configuration. The key is never read from
    /// the environment here.
    pub fn new(api_key: String, config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: format!("{}/responses", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            tool: ComputerTool {
                tool_type: "computer_use_preview",
                display_width: config.display_width,
                display_height: config.display_height,
                environment: config.environment.clone(),
            },
            retry_config: config.retry_config(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(body.to_string(), retry_after),
            LlmErrorKind::ServerError => LlmError::server_error(status_code, body.to_string()),
            _ => LlmError::client_error(status_code, body.to_string()),
        }
    }

    fn build_request(&self, context: &ModelContext) -> ResponsesRequest {
        ResponsesRequest {
            model: self.model.clone(),
            tools: vec![self.tool.clone()],
            input: context.items.iter().map(to_input_item).collect(),
            truncation: "auto",
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &ResponsesRequest) -> Result<ModelResponse, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body, retry_after));
        }

        let parsed: ResponsesBody = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        Ok(interpret(parsed))
    }

    async fn execute_with_retry(&self, request: &ResponsesRequest) -> Result<ModelResponse, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Request succeeded after {} retries (total time: {:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = self.retry_config.should_retry(&error)
                        && attempt < self.retry_config.max_retries;
                    if !should_retry {
                        if attempt > 0 {
                            tracing::error!(
                                "Request failed after {} retries (total time: {:?}): {}",
                                attempt,
                                start.elapsed(),
                                error
                            );
                        } else {
                            tracing::error!("Request failed: {}", error);
                        }
                        return Err(error);
                    }

                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error
                        .suggested_delay(attempt, self.retry_config.base_delay)
                        .min(remaining);
                    if delay.is_zero() {
                        tracing::warn!(
                            "Retry attempt {} failed, no time remaining: {}",
                            attempt + 1,
                            error
                        );
                        return Err(error);
                    }

                    tracing::warn!(
                        "Retry attempt {} failed with {}, retrying in {:?}: {}",
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiResponsesClient {
    async fn send(&self, context: &ModelContext) -> Result<ModelResponse, LlmError> {
        let request = self.build_request(context);
        tracing::debug!(
            model = %self.model,
            items = request.input.len(),
            "Sending request to Responses API"
        );
        self.execute_with_retry(&request).await
    }
}

fn to_input_item(item: &ContextItem) -> Value {
    match item {
        ContextItem::Task { text, observation } => json!({
            "role": "user",
            "content": [
                { "type": "input_text", "text": text },
                { "type": "input_image", "image_url": observation.data_url() },
            ],
        }),
        ContextItem::Provider(value) => value.clone(),
        ContextItem::CallOutput {
            call_id,
            observation,
            acknowledged_safety_checks,
        } => json!({
            "type": "computer_call_output",
            "call_id": call_id,
            "acknowledged_safety_checks": acknowledged_safety_checks,
            "output": {
                "type": "input_image",
                "image_url": observation.data_url(),
            },
        }),
    }
}

/// Classify the output items of a Responses API reply.
fn interpret(body: ResponsesBody) -> ModelResponse {
    let usage = body
        .usage
        .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens));
    let output = body.output.unwrap_or_default();

    if output.is_empty() {
        let detail = match body.status {
            Some(status) => format!("response with status '{}' carried no output items", status),
            None => "response carried no output items".to_string(),
        };
        return ModelResponse {
            reply: Reply::Unrecognized { detail },
            echo: Vec::new(),
            usage,
        };
    }

    let calls: Vec<ComputerCall> = output
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("computer_call"))
        .map(parse_call)
        .collect();

    let reply = if calls.is_empty() {
        Reply::Completion {
            text: output_text(&output),
        }
    } else {
        Reply::Actions(calls)
    };

    ModelResponse {
        reply,
        echo: output,
        usage,
    }
}

fn parse_call(item: &Value) -> ComputerCall {
    let pending_safety_checks = item
        .get("pending_safety_checks")
        .cloned()
        .and_then(|v| serde_json::from_value::<Vec<SafetyCheck>>(v).ok())
        .unwrap_or_default();
    ComputerCall {
        call_id: item
            .get("call_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        action: item
            .get("action")
            .map(Action::from_value)
            .unwrap_or(Action::Unrecognized {
                kind: String::new(),
            }),
        pending_safety_checks,
    }
}

/// Concatenate the `output_text` parts of message items.
fn output_text(output: &[Value]) -> Option<String> {
    let parts: Vec<&str> = output
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

#[derive(Debug, Clone, Serialize)]
struct ComputerTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    display_width: u32,
    display_height: u32,
    environment: String,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    tools: Vec<ComputerTool>,
    input: Vec<Value>,
    truncation: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Option<Vec<Value>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u64,
    output_tokens: u64,
}
