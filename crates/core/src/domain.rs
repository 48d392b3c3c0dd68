use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row keyed by column name, in the order the datastore returned the columns.
pub type Row = Map<String, Value>;

pub const DEFAULT_MODES: &[&str] = &["text/plain", "application/json"];

fn default_modes() -> Vec<String> {
    DEFAULT_MODES.iter().map(|mode| (*mode).to_string()).collect()
}

fn default_agent_name() -> String {
    "Unknown".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_modes")]
    pub input_modes: Vec<String>,
    #[serde(default = "default_modes")]
    pub output_modes: Vec<String>,
}

impl SkillDescriptor {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
}

/// Capability descriptor served at the well-known card path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_modes")]
    pub default_input_modes: Vec<String>,
    #[serde(default = "default_modes")]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredAgent {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub skills: Vec<SkillDescriptor>,
    pub is_healthy: bool,
}

impl DiscoveredAgent {
    /// `base_url` is the address the card was fetched from, not the URL the card advertises.
    pub fn from_card(base_url: &str, card: AgentCard) -> Self {
        Self {
            name: card.name,
            description: card.description,
            base_url: base_url.trim_end_matches('/').to_string(),
            skills: card.skills,
            is_healthy: true,
        }
    }

    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skills.iter().any(|skill| skill.id == skill_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.skills.iter().any(|skill| skill.tags.iter().any(|candidate| candidate == tag))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkillSummary {
    pub agent: String,
    pub skill_id: String,
    pub skill_name: String,
    pub description: String,
    pub examples: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedDispatch {
    pub agent: DiscoveredAgent,
    pub sub_query: String,
}

/// Targets and their sub-queries are stored as pairs so the two can never drift apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    targets: Vec<PlannedDispatch>,
    pub join_strategy: Option<String>,
    pub original_query: String,
}

impl QueryPlan {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self { targets: Vec::new(), join_strategy: None, original_query: original_query.into() }
    }

    /// Adds a target unless an agent with the same name is already planned.
    pub fn add_target(&mut self, agent: DiscoveredAgent, sub_query: impl Into<String>) -> bool {
        if self.targets.iter().any(|planned| planned.agent.name == agent.name) {
            return false;
        }
        self.targets.push(PlannedDispatch { agent, sub_query: sub_query.into() });
        true
    }

    pub fn targets(&self) -> &[PlannedDispatch] {
        &self.targets
    }

    pub fn target_agents(&self) -> Vec<&DiscoveredAgent> {
        self.targets.iter().map(|planned| &planned.agent).collect()
    }

    pub fn sub_queries(&self) -> Vec<&str> {
        self.targets.iter().map(|planned| planned.sub_query.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

/// What a Data Agent's query handler returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub text: String,
    pub data: Option<Vec<Row>>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn success(text: impl Into<String>, data: Vec<Row>) -> Self {
        Self { success: true, text: text.into(), data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, text: String::new(), data: None, error: Some(error.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub success: bool,
    pub text: String,
    pub data: Option<Vec<Row>>,
    pub error: Option<String>,
}

impl AgentResult {
    pub fn success(
        agent_name: impl Into<String>,
        text: impl Into<String>,
        data: Option<Vec<Row>>,
    ) -> Self {
        Self { agent_name: agent_name.into(), success: true, text: text.into(), data, error: None }
    }

    pub fn failure(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            text: String::new(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.data.as_ref().map(Vec::len).unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub success: bool,
    pub response_text: String,
    pub combined_data: Option<Vec<Row>>,
    pub source_agents: Vec<String>,
}
