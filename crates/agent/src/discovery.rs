//! Agent-card discovery and the immutable directory built from it.

use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use quarry_core::domain::{AgentCard, DiscoveredAgent, SkillSummary};
use quarry_core::errors::AgentDiscoveryError;
use quarry_core::protocol::{AGENT_CARD_PATH, HEALTH_PATH};

/// Name-indexed snapshot of discovered agents. Never mutated; re-discovery builds a new one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentDirectory {
    agents: Vec<DiscoveredAgent>,
}

impl AgentDirectory {
    /// Later duplicates replace earlier ones in place.
    pub fn from_agents(agents: impl IntoIterator<Item = DiscoveredAgent>) -> Self {
        let mut unique: Vec<DiscoveredAgent> = Vec::new();
        for agent in agents {
            match unique.iter_mut().find(|existing| existing.name == agent.name) {
                Some(existing) => *existing = agent,
                None => unique.push(agent),
            }
        }
        Self { agents: unique }
    }

    pub fn agents(&self) -> &[DiscoveredAgent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DiscoveredAgent> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn get_agent_for_skill(&self, skill_id: &str) -> Option<&DiscoveredAgent> {
        self.agents.iter().find(|agent| agent.has_skill(skill_id))
    }

    pub fn get_agents_by_tag(&self, tag: &str) -> Vec<&DiscoveredAgent> {
        self.agents.iter().filter(|agent| agent.has_tag(tag)).collect()
    }

    pub fn get_all_skills(&self) -> Vec<SkillSummary> {
        self.agents
            .iter()
            .flat_map(|agent| {
                agent.skills.iter().map(|skill| SkillSummary {
                    agent: agent.name.clone(),
                    skill_id: skill.id.clone(),
                    skill_name: skill.display_name().to_string(),
                    description: skill.description.clone(),
                    examples: skill.examples.clone(),
                })
            })
            .collect()
    }

    pub fn capabilities_summary(&self) -> String {
        let mut lines = Vec::new();
        for agent in &self.agents {
            lines.push(format!("**{}**: {}", agent.name, agent.description));
            for skill in &agent.skills {
                lines.push(format!("  - {}: {}", skill.display_name(), skill.description));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

#[derive(Clone)]
pub struct DiscoveryService {
    client: Client,
}

impl DiscoveryService {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self { client: Client::builder().timeout(timeout).build()? })
    }

    /// Fetches every card concurrently. Failing URLs are logged and skipped; only an empty
    /// result is an error.
    pub async fn discover_all(
        &self,
        agent_urls: &[String],
    ) -> Result<AgentDirectory, AgentDiscoveryError> {
        let fetches = agent_urls.iter().map(|url| self.fetch_agent(url));
        let outcomes = join_all(fetches).await;

        let mut discovered = Vec::new();
        for (url, outcome) in agent_urls.iter().zip(outcomes) {
            match outcome {
                Ok(agent) => {
                    info!(
                        event_name = "system.discovery.agent_discovered",
                        agent = %agent.name,
                        url = %url,
                        skills = agent.skills.len(),
                        "agent discovered"
                    );
                    discovered.push(agent);
                }
                Err(error) => {
                    warn!(
                        event_name = "system.discovery.agent_failed",
                        url = %url,
                        error = %error,
                        "agent discovery failed"
                    );
                }
            }
        }

        let directory = AgentDirectory::from_agents(discovered);
        if directory.is_empty() {
            return Err(AgentDiscoveryError { attempted: agent_urls.to_vec() });
        }
        info!(
            event_name = "system.discovery.completed",
            agents = directory.len(),
            attempted = agent_urls.len(),
            "discovery pass completed"
        );
        Ok(directory)
    }

    async fn fetch_agent(&self, base_url: &str) -> Result<DiscoveredAgent, String> {
        let card_url = format!("{}{AGENT_CARD_PATH}", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&card_url)
            .send()
            .await
            .map_err(|error| error.to_string())?;
        if !response.status().is_success() {
            return Err(format!("agent card endpoint returned {}", response.status()));
        }
        let card: AgentCard =
            response.json().await.map_err(|error| format!("malformed agent card: {error}"))?;
        Ok(DiscoveredAgent::from_card(base_url, card))
    }

    /// Checks each agent's health endpoint and returns a directory with refreshed flags.
    pub async fn check_health(&self, directory: &AgentDirectory) -> AgentDirectory {
        let checks = directory.agents().iter().map(|agent| async move {
            let url = format!("{}{HEALTH_PATH}", agent.base_url);
            let healthy = matches!(
                self.client.get(&url).send().await,
                Ok(response) if response.status().is_success()
            );
            if !healthy {
                warn!(
                    event_name = "system.discovery.agent_unhealthy",
                    agent = %agent.name,
                    "health check failed"
                );
            }
            DiscoveredAgent { is_healthy: healthy, ..agent.clone() }
        });
        AgentDirectory { agents: join_all(checks).await }
    }
}
