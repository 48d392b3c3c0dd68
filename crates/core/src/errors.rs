use thiserror::Error;

/// Raised by the SQL validator. Never retried; the message becomes the query's failure text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SqlInjectionError {
    message: String,
}

impl SqlInjectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Query failed: {0}")]
pub struct QueryExecutionError(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("No agents discovered (attempted {} url(s))", attempted.len())]
pub struct AgentDiscoveryError {
    pub attempted: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentCommunicationError {
    #[error("Request to {agent} timed out")]
    Timeout { agent: String },
    #[error("Failed to query {agent}: {detail}")]
    Transport { agent: String, detail: String },
    #[error("Failed to query {agent}: HTTP status {status}")]
    Status { agent: String, status: u16 },
    #[error("Failed to query {agent}: malformed response: {detail}")]
    Decode { agent: String, detail: String },
}

impl AgentCommunicationError {
    pub fn agent(&self) -> &str {
        match self {
            Self::Timeout { agent }
            | Self::Transport { agent, .. }
            | Self::Status { agent, .. }
            | Self::Decode { agent, .. } => agent,
        }
    }

    /// Timeouts are the one transport failure a caller may reasonably retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Failed to generate SQL: {0}")]
    GenerateSql(String),
    #[error("Failed to analyze query: {0}")]
    AnalyzeQuery(String),
    #[error("Failed to synthesize response: {0}")]
    SynthesizeResponse(String),
    #[error("Failed to complete chat: {0}")]
    Chat(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error(transparent)]
    Discovery(#[from] AgentDiscoveryError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}
