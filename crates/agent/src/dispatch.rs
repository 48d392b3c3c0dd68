use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use quarry_core::domain::{AgentResult, DiscoveredAgent};
use quarry_core::errors::AgentCommunicationError;
use quarry_core::protocol::{RpcResponse, TaskRequest, TASKS_SEND_PATH};

/// Client half of the `tasks/send` protocol. Each request carries its own timeout.
#[derive(Clone)]
pub struct A2aClient {
    client: Client,
}

impl A2aClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self { client: Client::builder().timeout(timeout).build()? })
    }

    /// Application-level failures come back as `Ok` with a failed result; only transport
    /// problems are `Err`.
    pub async fn send_task(
        &self,
        agent: &DiscoveredAgent,
        text: &str,
    ) -> Result<AgentResult, AgentCommunicationError> {
        let endpoint = format!("{}{TASKS_SEND_PATH}", agent.base_url.trim_end_matches('/'));
        let request = TaskRequest::new(Value::String(Uuid::new_v4().to_string()), text);

        let response =
            self.client.post(&endpoint).json(&request).send().await.map_err(|error| {
                if error.is_timeout() {
                    AgentCommunicationError::Timeout { agent: agent.name.clone() }
                } else {
                    AgentCommunicationError::Transport {
                        agent: agent.name.clone(),
                        detail: error.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentCommunicationError::Status {
                agent: agent.name.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: RpcResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                AgentCommunicationError::Timeout { agent: agent.name.clone() }
            } else {
                AgentCommunicationError::Decode {
                    agent: agent.name.clone(),
                    detail: error.to_string(),
                }
            }
        })?;

        let result = envelope.into_agent_result(&agent.name);
        debug!(
            event_name = "system.dispatch.completed",
            agent = %agent.name,
            success = result.success,
            rows = result.row_count(),
            "agent responded"
        );
        Ok(result)
    }

    /// Never fails: transport errors become a failed result carrying the error text.
    pub async fn dispatch(&self, agent: &DiscoveredAgent, text: &str) -> AgentResult {
        match self.send_task(agent, text).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "system.dispatch.failed",
                    agent = %agent.name,
                    timeout = error.is_timeout(),
                    error = %error,
                    "agent request failed"
                );
                AgentResult::failure(agent.name.clone(), error.to_string())
            }
        }
    }
}
