//! Prompt text and tool schemas sent to the model.

use serde_json::{json, Value};

use quarry_core::domain::SkillSummary;
use quarry_core::model::AgentSummary;

pub const COLUMN_INFO_PLACEHOLDER: &str = "${COLUMN_INFO}";
pub const TABLE_PLACEHOLDER: &str = "${TABLE}";

pub const BASE_SQL_PROMPT: &str = "You are a SQL expert. Generate PostgreSQL queries to answer business questions.

Rules:
1. Only generate SELECT queries - no modifications allowed
2. Use parameterized queries with $1, $2, etc. for any user-provided values
3. Use appropriate aggregate functions (COUNT, SUM, AVG, MIN, MAX) for summary queries
4. Include ORDER BY for sorted results
5. Use LIMIT for \"top N\" queries
6. Always alias tables in JOINs
7. Format dates using PostgreSQL functions (DATE_TRUNC, EXTRACT, etc.) in the SQL itself

IMPORTANT - Parameter values:
- Parameters must be LITERAL values only (strings, numbers, dates)
- NEVER pass SQL expressions or functions as parameters (e.g., \"now() - interval '3 months'\" is WRONG)
- For relative date queries (e.g., \"last 3 months\"), compute the actual date and pass it as ISO 8601 format (YYYY-MM-DD)
- Today's date is provided in the query context - use it to calculate relative dates
- Example: For \"orders in the last 3 months\" with today being 2026-02-01, pass \"2025-11-01\" as the parameter

Output format:
- Return the SQL query and parameter values
- Date parameters must be ISO 8601 format strings (e.g., \"2025-10-01\" or \"2025-10-01T00:00:00Z\")
";

pub const ROUTER_SYSTEM_PROMPT: &str = "You are a query router for a BI system. Analyze the user's question \
and determine which data agents/skills are needed to answer it.

Consider:
1. Which tables/data sources are needed
2. Whether data from multiple sources needs to be joined
3. What the appropriate join key would be

Return your analysis as a structured response.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a BI assistant. Synthesize the data results \
into a clear, concise natural language response. Include key numbers and insights. Be direct and factual.";

pub const EMPTY_SYNTHESIS_FALLBACK: &str = "Unable to generate response.";

pub const EXECUTE_SQL_TOOL: &str = "execute_sql";
pub const ROUTE_QUERY_TOOL: &str = "route_query";

/// Template used when a data agent does not configure its own.
pub fn default_sql_template() -> String {
    format!(
        "{BASE_SQL_PROMPT}\nYou are querying the {TABLE_PLACEHOLDER} table with these columns:\n{COLUMN_INFO_PLACEHOLDER}\n"
    )
}

pub fn sql_user_message(schema_description: &str, user_query: &str) -> String {
    format!("Table Schema:\n{schema_description}\n\nQuestion: {user_query}")
}

pub fn routing_user_message(skills: &[SkillSummary], user_query: &str) -> String {
    let skills_context = skills
        .iter()
        .map(|skill| format!("- {} ({}): {}", skill.skill_id, skill.agent, skill.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Available skills:\n{skills_context}\n\nQuestion: {user_query}")
}

pub fn synthesis_user_message(results: &[AgentSummary], original_query: &str) -> String {
    let results_context = results
        .iter()
        .map(|result| format!("- {}: {} ({} rows)", result.agent, result.text, result.row_count))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Question: {original_query}\n\nResults:\n{results_context}")
}

pub fn execute_sql_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": EXECUTE_SQL_TOOL,
            "description": "Execute a SQL query against the database",
            "parameters": {
                "type": "object",
                "properties": {
                    "sql": {"type": "string", "description": "The SQL SELECT query to execute"},
                    "parameters": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Parameter values for $1, $2, etc."
                    },
                    "explanation": {
                        "type": "string",
                        "description": "Brief explanation of what the query does"
                    }
                },
                "required": ["sql", "parameters"]
            }
        }
    })
}

pub fn route_query_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": ROUTE_QUERY_TOOL,
            "description": "Route query to appropriate data agents",
            "parameters": {
                "type": "object",
                "properties": {
                    "skill_mappings": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "skill_id": {"type": "string"},
                                "sub_query": {"type": "string"},
                                "confidence": {"type": "number"}
                            }
                        }
                    },
                    "requires_cross_join": {"type": "boolean"},
                    "join_strategy": {
                        "type": "string",
                        "description": "Join key if cross-join needed"
                    }
                },
                "required": ["skill_mappings", "requires_cross_join"]
            }
        }
    })
}

pub fn forced_tool_choice(name: &str) -> Value {
    json!({"type": "function", "function": {"name": name}})
}

#[cfg(test)]
mod tests {
    use quarry_core::domain::SkillSummary;
    use quarry_core::model::AgentSummary;

    use super::{default_sql_template, routing_user_message, synthesis_user_message};

    #[test]
    fn routing_message_lists_skill_with_owner() {
        let skills = vec![SkillSummary {
            agent: "Orders Data Agent".to_owned(),
            skill_id: "revenue_total".to_owned(),
            skill_name: "Revenue Totals".to_owned(),
            description: "Total revenue by period".to_owned(),
            examples: Vec::new(),
        }];

        let message = routing_user_message(&skills, "What is revenue?");

        assert_eq!(
            message,
            "Available skills:\n- revenue_total (Orders Data Agent): Total revenue by period\n\nQuestion: What is revenue?"
        );
    }

    #[test]
    fn synthesis_message_includes_row_counts() {
        let results = vec![AgentSummary {
            agent: "Customers Data Agent".to_owned(),
            text: "Result: count: 42".to_owned(),
            row_count: 1,
        }];

        assert!(synthesis_user_message(&results, "How many?")
            .ends_with("Results:\n- Customers Data Agent: Result: count: 42 (1 rows)"));
    }

    #[test]
    fn default_template_carries_both_placeholders() {
        let template = default_sql_template();

        assert!(template.contains("${TABLE}"));
        assert!(template.contains("${COLUMN_INFO}"));
        assert!(template.starts_with("You are a SQL expert."));
    }
}
