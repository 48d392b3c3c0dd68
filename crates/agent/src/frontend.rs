//! Conversational front end: the model sees every discovered data agent as a tool and decides
//! which ones to call, looping until it answers in plain text.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use quarry_core::config::AppConfig;
use quarry_core::domain::DiscoveredAgent;
use quarry_core::errors::LlmError;

use crate::discovery::{AgentDirectory, DiscoveryService};
use crate::dispatch::A2aClient;
use crate::llm::ChatModel;
use crate::tools::{ToolError, ToolRegistry};

pub const MAX_TOOL_ROUNDS: usize = 5;
pub const CAPABILITIES_PLACEHOLDER: &str = "${AGENT_CAPABILITIES}";
pub const ROUND_LIMIT_RESPONSE: &str = "I apologize, but I wasn't able to complete the analysis. \
Please try rephrasing your question.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolStep {
    pub tool: String,
    pub input: Value,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontendReply {
    pub response: String,
    pub intermediate_steps: Vec<ToolStep>,
}

struct Toolbox {
    directory: AgentDirectory,
    registry: ToolRegistry,
}

pub struct FrontendAgent {
    model: Arc<dyn ChatModel>,
    discovery: DiscoveryService,
    client: A2aClient,
    agent_urls: Vec<String>,
    router_prompt: Option<String>,
    toolbox: RwLock<Option<Arc<Toolbox>>>,
}

impl FrontendAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        agent_urls: Vec<String>,
        discovery_timeout: Duration,
        dispatch_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            model,
            discovery: DiscoveryService::new(discovery_timeout)?,
            client: A2aClient::new(dispatch_timeout)?,
            agent_urls,
            router_prompt: None,
            toolbox: RwLock::new(None),
        })
    }

    pub fn from_config(
        config: &AppConfig,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self, reqwest::Error> {
        let agent = Self::new(
            model,
            config.discovery.agent_urls.clone(),
            Duration::from_secs(config.discovery.timeout_secs),
            Duration::from_secs(config.orchestrator.dispatch_timeout_secs),
        )?;
        Ok(match config.orchestrator.router_prompt.as_deref() {
            Some(template) => agent.with_router_prompt(template),
            None => agent,
        })
    }

    pub fn with_router_prompt(mut self, template: impl Into<String>) -> Self {
        self.router_prompt = Some(template.into());
        self
    }

    /// Agents the model can currently call. Discovers on first use.
    pub async fn agents(&self) -> Vec<DiscoveredAgent> {
        self.toolbox().await.directory.agents().to_vec()
    }

    // Unlike the orchestrator, an empty discovery is not fatal: the model can still chat.
    async fn toolbox(&self) -> Arc<Toolbox> {
        if let Some(toolbox) = self.toolbox.read().await.as_ref() {
            return Arc::clone(toolbox);
        }

        let mut slot = self.toolbox.write().await;
        if let Some(toolbox) = slot.as_ref() {
            return Arc::clone(toolbox);
        }
        let directory = match self.discovery.discover_all(&self.agent_urls).await {
            Ok(directory) => directory,
            Err(error) => {
                warn!(
                    event_name = "system.frontend.no_agents",
                    error = %error,
                    "continuing without data agent tools"
                );
                AgentDirectory::default()
            }
        };
        let registry = ToolRegistry::from_directory(&directory, &self.client);
        info!(
            event_name = "system.frontend.initialized",
            agents = directory.len(),
            tools = ?registry.names(),
            "front end bound data agent tools"
        );
        let toolbox = Arc::new(Toolbox { directory, registry });
        *slot = Some(Arc::clone(&toolbox));
        toolbox
    }

    pub fn system_prompt(&self, directory: &AgentDirectory) -> String {
        let capabilities = directory.capabilities_summary();
        match self.router_prompt.as_deref() {
            Some(template) if template.contains(CAPABILITIES_PLACEHOLDER) => {
                template.replace(CAPABILITIES_PLACEHOLDER, &capabilities)
            }
            _ => default_system_prompt(&capabilities),
        }
    }

    /// Answers `input` in the context of `history`, calling data agent tools as the model asks.
    /// Gives up with a fixed apology after [`MAX_TOOL_ROUNDS`] rounds of tool calls.
    pub async fn query(
        &self,
        input: &str,
        history: &[ChatTurn],
    ) -> Result<FrontendReply, LlmError> {
        let toolbox = self.toolbox().await;
        let definitions = toolbox.registry.definitions();

        let mut messages =
            vec![json!({"role": "system", "content": self.system_prompt(&toolbox.directory)})];
        messages.extend(
            history.iter().map(|turn| json!({"role": turn.role, "content": turn.content})),
        );
        messages.push(json!({"role": "user", "content": input}));

        let mut steps = Vec::new();
        for round in 1..=MAX_TOOL_ROUNDS {
            let turn = self.model.complete(&messages, &definitions).await?;
            if turn.tool_calls.is_empty() {
                return Ok(FrontendReply {
                    response: turn.content.unwrap_or_default(),
                    intermediate_steps: steps,
                });
            }

            let requested: Vec<Value> =
                turn.tool_calls.iter().map(|call| call.to_message_entry()).collect();
            messages.push(json!({
                "role": "assistant",
                "content": turn.content,
                "tool_calls": requested
            }));

            for call in &turn.tool_calls {
                let input: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                info!(
                    event_name = "system.frontend.tool_call",
                    tool = %call.name,
                    round,
                    "model requested a tool"
                );
                let output = match toolbox.registry.execute(&call.name, input.clone()).await {
                    Ok(output) => output,
                    Err(ToolError::Unknown(name)) => format!("Tool {name} not found"),
                    Err(error) => error.to_string(),
                };
                messages.push(json!({"role": "tool", "tool_call_id": call.id, "content": output}));
                steps.push(ToolStep { tool: call.name.clone(), input, output });
            }
        }

        warn!(
            event_name = "system.frontend.round_limit",
            rounds = MAX_TOOL_ROUNDS,
            tool_calls = steps.len(),
            "model kept calling tools"
        );
        Ok(FrontendReply { response: ROUND_LIMIT_RESPONSE.to_string(), intermediate_steps: steps })
    }
}

fn default_system_prompt(capabilities: &str) -> String {
    format!(
        "You are a helpful business intelligence assistant.

You have access to the following data agents that can answer questions about business data:

{capabilities}

When a user asks a question:
1. Determine which agent(s) can best answer the question
2. Use the appropriate tool to query the agent
3. Synthesize the results into a clear, helpful answer

If a question requires data from multiple sources, query each relevant agent \
and combine the results.
Always provide specific numbers and insights when available.
If you cannot answer a question, explain what information is missing."
    )
}
