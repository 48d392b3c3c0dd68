//! Agents for the quarry BI router.
//!
//! - `data_agent`: answers one table's questions by generating, validating and running SQL.
//! - `discovery` and `dispatch`: the client side of the agent card and `tasks/send` protocol.
//! - `orchestrator`: plans a question across data agents and merges their answers.
//! - `llm`: the OpenAI-compatible `ModelLayer`.
//! - `tools`: exposes discovered agents as model-callable tools.
//! - `frontend`: a chat agent that lets the model call those tools itself.

pub mod data_agent;
pub mod discovery;
pub mod frontend;
pub mod dispatch;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod tools;

pub use data_agent::DataAgent;
pub use discovery::{AgentDirectory, DiscoveryService};
pub use dispatch::A2aClient;
pub use frontend::{ChatTurn, FrontendAgent, FrontendReply};
pub use llm::{ChatModel, OpenAiModel};
pub use orchestrator::Orchestrator;
pub use tools::{AgentQueryTool, Tool, ToolRegistry};
