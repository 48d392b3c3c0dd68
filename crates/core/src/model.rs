use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::SkillSummary;
use crate::errors::LlmError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SqlGeneration {
    pub sql: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub explanation: String,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillMapping {
    pub skill_id: String,
    #[serde(default)]
    pub sub_query: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(default)]
    pub skill_mappings: Vec<SkillMapping>,
    #[serde(default)]
    pub requires_cross_join: bool,
    #[serde(default)]
    pub join_strategy: Option<String>,
}

/// Compact per-agent summary handed to response synthesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub agent: String,
    pub text: String,
    pub row_count: usize,
}

/// The language-model backend as seen by agents, orchestrator and aggregator.
#[async_trait]
pub trait ModelLayer: Send + Sync {
    async fn generate_sql(
        &self,
        user_query: &str,
        system_prompt: &str,
        schema_description: &str,
    ) -> Result<SqlGeneration, LlmError>;

    async fn analyze_query(
        &self,
        user_query: &str,
        available_skills: &[SkillSummary],
    ) -> Result<QueryAnalysis, LlmError>;

    async fn synthesize_response(
        &self,
        original_query: &str,
        agent_results: &[AgentSummary],
    ) -> Result<String, LlmError>;
}
