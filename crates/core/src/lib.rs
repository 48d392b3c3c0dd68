pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod datastore;
pub mod domain;
pub mod errors;
pub mod model;
pub mod protocol;
pub mod sql_validator;

pub use aggregator::ResultAggregator;
pub use catalog::{ColumnSpec, DataAgentConfig, TableSchema};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use datastore::{QueryExecutor, SqlParam};
pub use domain::{
    AgentCard, AgentResult, AggregatedResult, DiscoveredAgent, QueryPlan, QueryResult, Row,
    SkillDescriptor, SkillSummary,
};
pub use errors::{
    AgentCommunicationError, AgentDiscoveryError, LlmError, OrchestratorError,
    QueryExecutionError, SqlInjectionError,
};
pub use model::{AgentSummary, ModelLayer, QueryAnalysis, SkillMapping, SqlGeneration};
pub use sql_validator::SqlValidator;
