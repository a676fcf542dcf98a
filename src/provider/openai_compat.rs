//! OpenAI-compatible chat-completions client
//!
//! Works with OpenAI, Azure-style gateways, OpenRouter, Groq and any other
//! service speaking the chat-completions protocol. Uses a long-lived
//! reqwest::Client for connection pooling.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ChatCompletion, ChatProvider, ChatRequest, TokenStream};
use crate::config::ProviderConfig;
use crate::error::OrchestrationError;
use crate::models::{ConversationTurn, Role, ToolInvocation};
use crate::Result;

pub struct OpenAiCompatProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(turn_to_message).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": stream,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        if !self.is_configured() {
            return Err(OrchestrationError::ProviderUnavailable(
                "LLM_API_KEY is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Provider request failed: {}", e);
                OrchestrationError::ProviderUnavailable(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Provider error response: {}", error_text);
            return Err(OrchestrationError::ProviderUnavailable(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let body = self.build_request_body(&request, false);
        info!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling provider"
        );

        let response = self.send(&body).await?;
        let data: ApiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse provider response: {}", e);
            OrchestrationError::ProviderResponse(format!("parse error: {}", e))
        })?;

        parse_completion(data)
    }

    async fn stream(&self, request: ChatRequest) -> Result<TokenStream> {
        let body = self.build_request_body(&request, true);
        info!(
            model = %self.config.model,
            messages = request.messages.len(),
            "Calling provider (streaming)"
        );

        let response = self.send(&body).await?;
        Ok(sse_content_stream(response.bytes_stream().boxed()))
    }
}

//
// ================= Wire types =================
//

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

//
// ================= Conversion helpers =================
//

fn turn_to_message(turn: &ConversationTurn) -> Value {
    let role = match turn.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let mut message = json!({
        "role": role,
        "content": turn.content,
    });

    if let Some(id) = &turn.tool_call_id {
        message["tool_call_id"] = json!(id);
    }

    if !turn.tool_invocations.is_empty() {
        if turn.content.is_empty() {
            message["content"] = Value::Null;
        }
        let calls: Vec<Value> = turn
            .tool_invocations
            .iter()
            .map(|invocation| {
                json!({
                    "id": invocation.id,
                    "type": "function",
                    "function": {
                        "name": invocation.name,
                        "arguments": invocation.arguments,
                    }
                })
            })
            .collect();
        message["tool_calls"] = json!(calls);
    }

    message
}

fn parse_completion(data: ApiResponse) -> Result<ChatCompletion> {
    let choice = data.choices.into_iter().next().ok_or_else(|| {
        OrchestrationError::ProviderResponse("no choices in response".to_string())
    })?;

    let tool_invocations = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolInvocation {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(ChatCompletion {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_invocations,
    })
}

enum SseEvent {
    Content(Vec<String>),
    Failed(String),
    Done,
}

fn read_event(data: &str) -> SseEvent {
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(event) if event.get("error").is_some() => {
            let message = event["error"]["message"]
                .as_str()
                .or_else(|| event["error"].as_str())
                .unwrap_or("error during streaming");
            SseEvent::Failed(message.to_string())
        }
        Ok(event) => match serde_json::from_value::<StreamChunk>(event) {
            Ok(chunk) => SseEvent::Content(
                chunk
                    .choices
                    .into_iter()
                    .filter_map(|choice| choice.delta.content.filter(|c| !c.is_empty()))
                    .collect(),
            ),
            Err(e) => {
                debug!("Skipping unrecognised stream chunk: {} - {}", e, data);
                SseEvent::Content(Vec::new())
            }
        },
        Err(e) => {
            debug!("Failed to parse stream chunk: {} - Raw data: {}", e, data);
            SseEvent::Content(Vec::new())
        }
    }
}

/// Turn a server-sent-events byte stream into narrative deltas
fn sse_content_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let events = bytes.eventsource();

    stream::unfold(Some(events), |events| async move {
        let mut events = events?;
        loop {
            match events.next().await {
                Some(Ok(event)) => match read_event(&event.data) {
                    SseEvent::Content(parts) if parts.is_empty() => continue,
                    SseEvent::Content(parts) => {
                        let items: Vec<Result<String>> = parts.into_iter().map(Ok).collect();
                        return Some((items, Some(events)));
                    }
                    SseEvent::Failed(message) => {
                        let failure = Err(OrchestrationError::ProviderUnavailable(message));
                        return Some((vec![failure], None));
                    }
                    SseEvent::Done => return None,
                },
                Some(Err(e)) => {
                    error!("Error reading stream: {}", e);
                    let failure = Err(OrchestrationError::ProviderUnavailable(format!(
                        "stream interrupted: {}",
                        e
                    )));
                    return Some((vec![failure], None));
                }
                None => return None,
            }
        }
    })
    .flat_map(stream::iter)
    .boxed()
}
