//! OpenAI-compatible chat-completions client backing [`ModelLayer`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use quarry_core::config::LlmConfig;
use quarry_core::domain::SkillSummary;
use quarry_core::errors::LlmError;
use quarry_core::model::{AgentSummary, ModelLayer, QueryAnalysis, SqlGeneration};

use crate::prompts;

const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    #[serde(default)]
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

/// A function call the model asked for, with its arguments still JSON-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl RequestedToolCall {
    /// The assistant-message form the model expects to see echoed back.
    pub fn to_message_entry(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {"name": self.name, "arguments": self.arguments}
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<RequestedToolCall>,
}

/// Free-form chat with optional tools; the model decides whether to call them.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[Value],
        tools: &[Value],
    ) -> Result<AssistantTurn, LlmError>;
}

pub struct OpenAiModel {
    client: Client,
    config: LlmConfig,
}

impl OpenAiModel {
    pub fn new(config: LlmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, config })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, messages: Value, tool: Option<(Value, &str)>) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.config.model.clone()));
        body.insert("messages".to_string(), messages);
        if self.config.is_reasoning_model() {
            body.insert(
                "reasoning_effort".to_string(),
                Value::String(self.config.reasoning_effort.as_str().to_string()),
            );
        } else {
            body.insert("temperature".to_string(), json!(self.config.temperature.unwrap_or(0.0)));
        }
        if let Some((schema, name)) = tool {
            body.insert("tools".to_string(), Value::Array(vec![schema]));
            body.insert("tool_choice".to_string(), prompts::forced_tool_choice(name));
        }
        Value::Object(body)
    }

    async fn chat(&self, body: &Value) -> Result<ChoiceMessage, String> {
        let url = format!("{}/chat/completions", self.config.endpoint());
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let mut request = self.client.post(&url).json(body);
            if let Some(api_key) = &self.config.api_key {
                request = request.bearer_auth(api_key.expose_secret());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let parsed: ChatResponse = response
                        .json()
                        .await
                        .map_err(|error| format!("invalid completion payload: {error}"))?;
                    return parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.message)
                        .ok_or_else(|| "completion returned no choices".to_string());
                }
                Ok(response) => {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    last_error = format!("model endpoint returned {status}: {detail}");
                    if !is_retryable(status) {
                        return Err(last_error);
                    }
                }
                Err(error) => {
                    last_error = format!("model request failed: {error}");
                }
            }

            if attempt < attempts {
                warn!(
                    event_name = "system.llm.retry",
                    attempt,
                    attempts,
                    error = %last_error,
                    "retrying model request"
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)))
                    .await;
            }
        }

        Err(last_error)
    }

    async fn forced_tool_call(
        &self,
        messages: Value,
        schema: Value,
        name: &str,
    ) -> Result<Value, String> {
        let body = self.request_body(messages, Some((schema, name)));
        let message = self.chat(&body).await?;
        let call = message
            .tool_calls
            .into_iter()
            .find(|call| call.function.name == name)
            .ok_or_else(|| format!("model did not call {name}"))?;
        serde_json::from_str(&call.function.arguments)
            .map_err(|error| format!("invalid {name} arguments: {error}"))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn complete(
        &self,
        messages: &[Value],
        tools: &[Value],
    ) -> Result<AssistantTurn, LlmError> {
        let mut body = self.request_body(Value::Array(messages.to_vec()), None);
        if let Some(fields) = body.as_object_mut().filter(|_| !tools.is_empty()) {
            fields.insert("tools".to_string(), Value::Array(tools.to_vec()));
            fields.insert("tool_choice".to_string(), Value::String("auto".to_string()));
        }
        let message = self.chat(&body).await.map_err(LlmError::Chat)?;

        debug!(
            event_name = "system.llm.chat_completed",
            messages = messages.len(),
            tool_calls = message.tool_calls.len(),
            "chat turn completed"
        );
        Ok(AssistantTurn {
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|call| RequestedToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ModelLayer for OpenAiModel {
    async fn generate_sql(
        &self,
        user_query: &str,
        system_prompt: &str,
        schema_description: &str,
    ) -> Result<SqlGeneration, LlmError> {
        let messages = json!([
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": prompts::sql_user_message(schema_description, user_query)},
        ]);
        let arguments = self
            .forced_tool_call(messages, prompts::execute_sql_tool(), prompts::EXECUTE_SQL_TOOL)
            .await
            .map_err(LlmError::GenerateSql)?;
        let generation: SqlGeneration = serde_json::from_value(arguments)
            .map_err(|error| LlmError::GenerateSql(error.to_string()))?;

        info!(
            event_name = "system.llm.sql_generated",
            query = truncate(user_query, 50),
            sql = truncate(&generation.sql, 100),
            "generated sql"
        );
        Ok(generation)
    }

    async fn analyze_query(
        &self,
        user_query: &str,
        available_skills: &[SkillSummary],
    ) -> Result<QueryAnalysis, LlmError> {
        let messages = json!([
            {"role": "system", "content": prompts::ROUTER_SYSTEM_PROMPT},
            {"role": "user", "content": prompts::routing_user_message(available_skills, user_query)},
        ]);
        let arguments = self
            .forced_tool_call(messages, prompts::route_query_tool(), prompts::ROUTE_QUERY_TOOL)
            .await
            .map_err(LlmError::AnalyzeQuery)?;
        let analysis: QueryAnalysis = serde_json::from_value(arguments)
            .map_err(|error| LlmError::AnalyzeQuery(error.to_string()))?;

        info!(
            event_name = "system.llm.query_analyzed",
            query = truncate(user_query, 50),
            skills = ?analysis.skill_mappings.iter().map(|mapping| mapping.skill_id.as_str()).collect::<Vec<_>>(),
            cross_join = analysis.requires_cross_join,
            "analyzed query"
        );
        Ok(analysis)
    }

    async fn synthesize_response(
        &self,
        original_query: &str,
        agent_results: &[AgentSummary],
    ) -> Result<String, LlmError> {
        let messages = json!([
            {"role": "system", "content": prompts::SYNTHESIS_SYSTEM_PROMPT},
            {"role": "user", "content": prompts::synthesis_user_message(agent_results, original_query)},
        ]);
        let body = self.request_body(messages, None);
        let message = self.chat(&body).await.map_err(LlmError::SynthesizeResponse)?;

        debug!(event_name = "system.llm.synthesized", sources = agent_results.len(), "synthesized");
        Ok(message
            .content
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| prompts::EMPTY_SYNTHESIS_FALLBACK.to_string()))
    }
}
