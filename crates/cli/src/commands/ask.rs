use std::sync::Arc;

use quarry_agent::{OpenAiModel, Orchestrator};
use quarry_core::domain::AggregatedResult;
use quarry_core::model::ModelLayer;
use serde_json::Value;

use crate::commands::{load_config, runtime, CommandResult};

const PREVIEW_ROWS: usize = 10;

pub fn run(question: &str, json_output: bool) -> CommandResult {
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let model: Arc<dyn ModelLayer> = Arc::new(
            OpenAiModel::new(config.llm.clone())
                .map_err(|error| ("runtime_init", error.to_string(), 3u8))?,
        );
        let orchestrator = Orchestrator::from_config(&config, model)
            .map_err(|error| ("runtime_init", error.to_string(), 3u8))?;
        orchestrator
            .process_query(question)
            .await
            .map_err(|error| ("query_execution", error.to_string(), 5u8))
    });

    match result {
        Ok(aggregated) if json_output => {
            let exit_code = if aggregated.success { 0 } else { 5 };
            let output = serde_json::to_string_pretty(&aggregated)
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"));
            CommandResult { exit_code, output }
        }
        Ok(aggregated) if aggregated.success => CommandResult::success("ask", render(&aggregated)),
        Ok(aggregated) => CommandResult::failure("ask", "all_sources_failed", render(&aggregated), 5),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

fn render(result: &AggregatedResult) -> String {
    let mut lines = vec![result.response_text.clone()];
    if !result.source_agents.is_empty() {
        lines.push(format!("sources: {}", result.source_agents.join(", ")));
    }
    if let Some(rows) = result.combined_data.as_ref() {
        lines.push(format!("rows: {}", rows.len()));
        lines.extend(
            rows.iter().take(PREVIEW_ROWS).map(|row| format!("  {}", Value::Object(row.clone()))),
        );
        if rows.len() > PREVIEW_ROWS {
            lines.push(format!("  ... {} more", rows.len() - PREVIEW_ROWS));
        }
    }
    lines.join("\n")
}
