use std::time::Duration;

use quarry_agent::{A2aClient, AgentDirectory, DiscoveryService, ToolRegistry};

use crate::commands::{load_config, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("agents") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("agents") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let timeout = Duration::from_secs(config.discovery.timeout_secs);
        let discovery = DiscoveryService::new(timeout)
            .map_err(|error| ("runtime_init", error.to_string(), 3u8))?;
        let client =
            A2aClient::new(timeout).map_err(|error| ("runtime_init", error.to_string(), 3u8))?;
        let directory = discovery
            .discover_all(&config.discovery.agent_urls)
            .await
            .map_err(|error| ("agent_discovery", error.to_string(), 4u8))?;
        let directory = discovery.check_health(&directory).await;
        let registry = ToolRegistry::from_directory(&directory, &client);
        Ok::<_, (&'static str, String, u8)>(render(&directory, &registry))
    });

    match result {
        Ok(listing) => CommandResult::success("agents", listing),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("agents", error_class, message, exit_code)
        }
    }
}

fn render(directory: &AgentDirectory, registry: &ToolRegistry) -> String {
    let mut lines = vec![format!("discovered {} agent(s)", directory.len())];
    for agent in directory.agents() {
        let health = if agent.is_healthy { "healthy" } else { "unhealthy" };
        lines.push(format!("{} [{health}] {}", agent.name, agent.base_url));
        for skill in &agent.skills {
            lines.push(format!("  - {} ({}): {}", skill.id, skill.display_name(), skill.description));
        }
    }
    lines.push(format!("model tools: {}", registry.names().join(", ")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quarry_agent::{A2aClient, AgentDirectory, ToolRegistry};
    use quarry_core::domain::{DiscoveredAgent, SkillDescriptor};

    use super::render;

    #[test]
    fn listing_shows_health_skills_and_tools() {
        let directory = AgentDirectory::from_agents(vec![DiscoveredAgent {
            name: "Orders Data Agent".to_string(),
            description: String::new(),
            base_url: "http://localhost:8002".to_string(),
            skills: vec![SkillDescriptor {
                id: "revenue_total".to_string(),
                name: "Revenue Totals".to_string(),
                description: "Total revenue".to_string(),
                tags: Vec::new(),
                examples: Vec::new(),
                input_modes: Vec::new(),
                output_modes: Vec::new(),
            }],
            is_healthy: false,
        }]);
        let client = A2aClient::new(Duration::from_secs(1)).expect("client");
        let registry = ToolRegistry::from_directory(&directory, &client);

        assert_eq!(
            render(&directory, &registry),
            "discovered 1 agent(s)\n\
Orders Data Agent [unhealthy] http://localhost:8002\n  \
- revenue_total (Revenue Totals): Total revenue\n\
model tools: query_orders_data_agent"
        );
    }
}
