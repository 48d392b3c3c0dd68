//! Front door for user questions: discovers data agents once, plans which of them to ask,
//! fans the sub-queries out concurrently and merges what comes back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use quarry_core::aggregator::ResultAggregator;
use quarry_core::config::AppConfig;
use quarry_core::domain::{
    AgentCapabilities, AgentCard, AgentResult, AggregatedResult, QueryPlan, SkillDescriptor,
    DEFAULT_MODES,
};
use quarry_core::errors::{LlmError, OrchestratorError};
use quarry_core::model::ModelLayer;

use crate::discovery::{AgentDirectory, DiscoveryService};
use crate::dispatch::A2aClient;

pub const ORCHESTRATOR_NAME: &str = "BI Orchestrator Agent";
const ORCHESTRATOR_DESCRIPTION: &str = "Frontend orchestrator for conversational BI. \
Coordinates multiple data agents to answer complex business questions.";

pub struct Orchestrator {
    model: Arc<dyn ModelLayer>,
    discovery: DiscoveryService,
    client: A2aClient,
    aggregator: ResultAggregator,
    agent_urls: Vec<String>,
    directory: RwLock<Option<Arc<AgentDirectory>>>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelLayer>,
        agent_urls: Vec<String>,
        discovery_timeout: Duration,
        dispatch_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            aggregator: ResultAggregator::new(Arc::clone(&model)),
            model,
            discovery: DiscoveryService::new(discovery_timeout)?,
            client: A2aClient::new(dispatch_timeout)?,
            agent_urls,
            directory: RwLock::new(None),
        })
    }

    pub fn from_config(
        config: &AppConfig,
        model: Arc<dyn ModelLayer>,
    ) -> Result<Self, reqwest::Error> {
        Self::new(
            model,
            config.discovery.agent_urls.clone(),
            Duration::from_secs(config.discovery.timeout_secs),
            Duration::from_secs(config.orchestrator.dispatch_timeout_secs),
        )
    }

    pub fn agent_urls(&self) -> &[String] {
        &self.agent_urls
    }

    pub fn client(&self) -> &A2aClient {
        &self.client
    }

    /// Runs discovery on first use and returns the cached directory afterwards.
    pub async fn initialize(&self) -> Result<Arc<AgentDirectory>, OrchestratorError> {
        if let Some(directory) = self.directory.read().await.as_ref() {
            return Ok(Arc::clone(directory));
        }

        let mut slot = self.directory.write().await;
        if let Some(directory) = slot.as_ref() {
            return Ok(Arc::clone(directory));
        }
        let directory = Arc::new(self.discovery.discover_all(&self.agent_urls).await?);
        info!(
            event_name = "system.orchestrator.initialized",
            agents = directory.len(),
            skills = directory.get_all_skills().len(),
            "orchestrator discovered data agents"
        );
        *slot = Some(Arc::clone(&directory));
        Ok(directory)
    }

    /// Forgets the directory; the next query re-discovers from scratch.
    pub async fn reset(&self) {
        self.directory.write().await.take();
    }

    pub async fn plan(
        &self,
        query: &str,
        directory: &AgentDirectory,
    ) -> Result<QueryPlan, LlmError> {
        let analysis = self.model.analyze_query(query, &directory.get_all_skills()).await?;

        let mut plan = QueryPlan::new(query);
        for mapping in &analysis.skill_mappings {
            let Some(agent) = directory.get_agent_for_skill(&mapping.skill_id) else {
                warn!(
                    event_name = "system.orchestrator.unknown_skill",
                    skill_id = %mapping.skill_id,
                    "model routed to a skill no agent advertises"
                );
                continue;
            };
            let sub_query = match mapping.sub_query.trim() {
                "" => query,
                _ => mapping.sub_query.as_str(),
            };
            plan.add_target(agent.clone(), sub_query);
        }

        if plan.is_empty() {
            info!(
                event_name = "system.orchestrator.fallback_broadcast",
                agents = directory.len(),
                "no skill resolved; asking every agent"
            );
            for agent in directory.agents() {
                plan.add_target(agent.clone(), query);
            }
        }

        if analysis.requires_cross_join {
            plan.join_strategy =
                analysis.join_strategy.filter(|key| !key.trim().is_empty());
        }
        Ok(plan)
    }

    /// One concurrent request per target. Results come back in plan order whatever order the
    /// agents answer in.
    pub async fn dispatch(&self, plan: &QueryPlan) -> Vec<AgentResult> {
        let requests = plan
            .targets()
            .iter()
            .map(|target| self.client.dispatch(&target.agent, &target.sub_query));
        join_all(requests).await
    }

    pub async fn process_query(&self, query: &str) -> Result<AggregatedResult, OrchestratorError> {
        let started = Instant::now();
        let directory = self.initialize().await?;
        let plan = self.plan(query, &directory).await?;
        info!(
            event_name = "system.orchestrator.planned",
            targets = plan.len(),
            joined = plan.join_strategy.is_some(),
            "query plan ready"
        );

        let results = self.dispatch(&plan).await;
        let aggregated = self
            .aggregator
            .aggregate(&results, &plan.original_query, plan.join_strategy.as_deref())
            .await?;

        info!(
            event_name = "system.orchestrator.query_completed",
            success = aggregated.success,
            sources = aggregated.source_agents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query answered"
        );
        Ok(aggregated)
    }

    pub fn agent_card(base_url: &str) -> AgentCard {
        AgentCard {
            name: ORCHESTRATOR_NAME.to_string(),
            description: ORCHESTRATOR_DESCRIPTION.to_string(),
            url: format!("{}/", base_url.trim_end_matches('/')),
            version: "1.0.0".to_string(),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: DEFAULT_MODES.iter().map(|mode| (*mode).to_string()).collect(),
            capabilities: AgentCapabilities::default(),
            skills: vec![
                orchestrator_skill(
                    "natural_language_query",
                    "Natural Language Query",
                    "Answer business questions in natural language",
                    &["query", "bi", "analytics"],
                    &[
                        "What is our total revenue this month?",
                        "How many customers do we have in Europe?",
                        "Show me the top 10 products by sales",
                    ],
                ),
                orchestrator_skill(
                    "cross_table_analysis",
                    "Cross-Table Analysis",
                    "Analyze data across multiple tables",
                    &["join", "cross-table", "analytics"],
                    &[
                        "Which customer segment generates the most revenue?",
                        "What products are most popular in Europe?",
                    ],
                ),
            ],
        }
    }
}

fn orchestrator_skill(
    id: &str,
    name: &str,
    description: &str,
    tags: &[&str],
    examples: &[&str],
) -> SkillDescriptor {
    SkillDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        examples: examples.iter().map(|example| (*example).to_string()).collect(),
        input_modes: vec!["text/plain".to_string()],
        output_modes: DEFAULT_MODES.iter().map(|mode| (*mode).to_string()).collect(),
    }
}
