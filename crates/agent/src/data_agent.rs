//! One generic table agent, configured by data rather than by type.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{error, info};

use quarry_core::catalog::DataAgentConfig;
use quarry_core::datastore::{QueryExecutor, SqlParam};
use quarry_core::domain::{AgentCapabilities, AgentCard, QueryResult, Row, DEFAULT_MODES};
use quarry_core::model::ModelLayer;
use quarry_core::sql_validator::SqlValidator;

use crate::prompts;

pub struct DataAgent {
    config: DataAgentConfig,
    validator: SqlValidator,
    system_prompt: String,
    model: Arc<dyn ModelLayer>,
    executor: Arc<dyn QueryExecutor>,
}

impl DataAgent {
    pub fn new(
        config: DataAgentConfig,
        model: Arc<dyn ModelLayer>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        let validator =
            SqlValidator::new(Some(config.allowed_tables()), Some(config.allowed_columns()));
        let template = config.prompt_template.clone().unwrap_or_else(prompts::default_sql_template);
        let system_prompt = template
            .replace(prompts::TABLE_PLACEHOLDER, &config.table.name.to_uppercase())
            .replace(prompts::COLUMN_INFO_PLACEHOLDER, &config.table.column_info());
        Self { config, validator, system_prompt, model, executor }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DataAgentConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn card(&self, base_url: &str) -> AgentCard {
        let modes: Vec<String> = DEFAULT_MODES.iter().map(|mode| (*mode).to_string()).collect();
        AgentCard {
            name: self.config.name.clone(),
            description: if self.config.description.is_empty() {
                format!("Data agent for {}", self.config.table.name)
            } else {
                self.config.description.clone()
            },
            url: format!("{}/", base_url.trim_end_matches('/')),
            version: self.config.version.clone(),
            default_input_modes: modes.clone(),
            default_output_modes: modes,
            capabilities: AgentCapabilities::default(),
            skills: self.config.skills.clone(),
        }
    }

    pub fn schema_description(&self) -> String {
        self.schema_description_on(Local::now().date_naive())
    }

    pub fn schema_description_on(&self, today: NaiveDate) -> String {
        let mut lines = vec![
            format!("Table: {}", self.config.table.name),
            format!("Today's date: {}", today.format("%Y-%m-%d")),
            String::new(),
            "Columns:".to_string(),
        ];
        for column in &self.config.table.columns {
            let mut line = format!("- {}: {}", column.name, column.sql_type);
            if let Some(description) = column.description.as_deref().filter(|text| !text.is_empty())
            {
                line.push_str(&format!(" - {description}"));
            }
            if !column.allowed_values.is_empty() {
                line.push_str(&format!(" [Values: {}]", column.allowed_values.join(", ")));
            }
            lines.push(line);
        }
        lines.push(String::new());
        lines.push("Use $1, $2, etc. for parameter placeholders.".to_string());
        lines.push(
            "Parameters must be literal values (e.g., '2025-11-01'), NOT SQL expressions."
                .to_string(),
        );
        lines.push("Always use aggregate functions (COUNT, SUM, AVG) for summary queries.".to_string());
        lines.join("\n")
    }

    /// Generate, validate, execute and format. Every failure becomes a failed result.
    pub async fn process_query(&self, user_query: &str) -> QueryResult {
        info!(
            event_name = "system.agent.query_received",
            agent = %self.config.key,
            query_chars = user_query.chars().count(),
            "processing query"
        );

        match self.answer(user_query).await {
            Ok(result) => result,
            Err(message) => {
                error!(
                    event_name = "system.agent.query_failed",
                    agent = %self.config.key,
                    error = %message,
                    "query failed"
                );
                QueryResult::failure(message)
            }
        }
    }

    async fn answer(&self, user_query: &str) -> Result<QueryResult, String> {
        let generation = self
            .model
            .generate_sql(user_query, &self.system_prompt, &self.schema_description())
            .await
            .map_err(|error| error.to_string())?;

        self.validator.validate(&generation.sql).map_err(|error| error.to_string())?;

        let params: Vec<SqlParam> = generation.parameters.iter().map(SqlParam::infer).collect();
        let rows = self
            .executor
            .execute(&generation.sql, &params)
            .await
            .map_err(|error| error.to_string())?;

        let text = format_response(&rows, &generation.explanation);
        info!(
            event_name = "system.agent.query_completed",
            agent = %self.config.key,
            rows = rows.len(),
            "query answered"
        );
        Ok(QueryResult::success(text, rows))
    }
}

pub fn format_response(rows: &[Row], explanation: &str) -> String {
    match rows {
        [] => "No results found.".to_string(),
        [only] if only.len() <= 3 => {
            let values = only
                .iter()
                .map(|(key, value)| format!("{key}: {}", display_value(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Result: {values}")
        }
        _ => format!("Found {} results. {explanation}", rows.len()),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
