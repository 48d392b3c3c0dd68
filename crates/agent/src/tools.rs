use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use quarry_core::domain::{AgentResult, DiscoveredAgent};

use crate::discovery::AgentDirectory;
use crate::dispatch::A2aClient;

const FULL_LISTING_LIMIT: usize = 10;
const PREVIEW_ROWS: usize = 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    Unknown(String),
    #[error("tool `{tool}` requires a string `{argument}` argument")]
    MissingArgument { tool: String, argument: &'static str },
}

/// A function the model may call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<String, ToolError>;
}

/// Wraps one discovered data agent as a `query_<agent>` tool.
pub struct AgentQueryTool {
    name: String,
    description: String,
    agent: DiscoveredAgent,
    client: A2aClient,
}

impl AgentQueryTool {
    pub fn new(agent: DiscoveredAgent, client: A2aClient) -> Self {
        Self { name: tool_name(&agent.name), description: tool_description(&agent), agent, client }
    }

    pub fn agent(&self) -> &DiscoveredAgent {
        &self.agent
    }

    pub async fn query(&self, query: &str) -> String {
        format_result_for_model(&self.client.dispatch(&self.agent, query).await)
    }
}

#[async_trait]
impl Tool for AgentQueryTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language query for this data source"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let query = input.get("query").and_then(Value::as_str).ok_or_else(|| {
            ToolError::MissingArgument { tool: self.name.clone(), argument: "query" }
        })?;
        Ok(self.query(query).await)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn from_directory(directory: &AgentDirectory, client: &A2aClient) -> Self {
        let mut registry = Self::default();
        for agent in directory.agents() {
            registry.register(AgentQueryTool::new(agent.clone(), client.clone()));
        }
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Function definitions in the chat-completions `tools` shape.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters()
                    }
                })
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.execute(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub fn tool_name(agent_name: &str) -> String {
    format!("query_{}", agent_name.to_lowercase().replace([' ', '-'], "_"))
}

fn tool_description(agent: &DiscoveredAgent) -> String {
    let skills: Vec<&str> = agent.skills.iter().take(3).map(|skill| skill.display_name()).collect();
    format!(
        "Query the {}. {} Capabilities include: {}.",
        agent.name,
        agent.description,
        skills.join(", ")
    )
}

/// Renders an agent result as plain text for a model's tool-call reply.
pub fn format_result_for_model(result: &AgentResult) -> String {
    if !result.success {
        return format!(
            "Error from {}: {}",
            result.agent_name,
            result.error.as_deref().unwrap_or("Unknown error")
        );
    }

    let mut lines = Vec::new();
    if !result.text.is_empty() {
        lines.push(result.text.clone());
    }

    if let Some(rows) = result.data.as_ref().filter(|rows| !rows.is_empty()) {
        if rows.len() <= FULL_LISTING_LIMIT {
            lines.push(format!("Data ({} rows):", rows.len()));
            lines.extend(rows.iter().map(|row| format!("  {}", Value::Object(row.clone()))));
        } else {
            lines.push(format!("Data ({} rows, showing first {PREVIEW_ROWS}):", rows.len()));
            lines.extend(
                rows.iter().take(PREVIEW_ROWS).map(|row| format!("  {}", Value::Object(row.clone()))),
            );
            lines.push("  ...".to_string());
        }
    }

    if lines.is_empty() {
        "No results returned".to_string()
    } else {
        lines.join("\n")
    }
}
