use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{AgentResult, AggregatedResult, Row};
use crate::errors::LlmError;
use crate::model::{AgentSummary, ModelLayer};

pub const ALL_SOURCES_FAILED: &str = "All data sources failed to respond.";

/// Merges per-agent results into one answer.
#[derive(Clone)]
pub struct ResultAggregator {
    model: Arc<dyn ModelLayer>,
}

impl ResultAggregator {
    pub fn new(model: Arc<dyn ModelLayer>) -> Self {
        Self { model }
    }

    pub async fn aggregate(
        &self,
        results: &[AgentResult],
        original_query: &str,
        join_strategy: Option<&str>,
    ) -> Result<AggregatedResult, LlmError> {
        let successful: Vec<&AgentResult> = results.iter().filter(|result| result.success).collect();

        if successful.is_empty() {
            info!(
                event_name = "system.aggregate.all_failed",
                attempted = results.len(),
                "every dispatched agent failed"
            );
            return Ok(AggregatedResult {
                success: false,
                response_text: ALL_SOURCES_FAILED.to_string(),
                combined_data: None,
                source_agents: results.iter().map(|result| result.agent_name.clone()).collect(),
            });
        }

        if let [only] = successful.as_slice() {
            debug!(
                event_name = "system.aggregate.single_source",
                agent = %only.agent_name,
                "returning single agent result without synthesis"
            );
            return Ok(AggregatedResult {
                success: true,
                response_text: only.text.clone(),
                combined_data: only.data.clone(),
                source_agents: vec![only.agent_name.clone()],
            });
        }

        let combined_data = successful.iter().any(|result| result.data.is_some()).then(|| {
            match join_strategy {
                Some(key) => join_on_key(&successful, key),
                None => concatenate(&successful),
            }
        });

        let summaries: Vec<AgentSummary> = successful
            .iter()
            .map(|result| AgentSummary {
                agent: result.agent_name.clone(),
                text: result.text.clone(),
                row_count: result.row_count(),
            })
            .collect();
        let response_text = self.model.synthesize_response(original_query, &summaries).await?;

        info!(
            event_name = "system.aggregate.merged",
            sources = successful.len(),
            rows = combined_data.as_ref().map(Vec::len).unwrap_or(0),
            joined = join_strategy.is_some(),
            "aggregated multi-agent result"
        );

        Ok(AggregatedResult {
            success: true,
            response_text,
            combined_data,
            source_agents: successful.iter().map(|result| result.agent_name.clone()).collect(),
        })
    }
}

fn concatenate(results: &[&AgentResult]) -> Vec<Row> {
    results.iter().filter_map(|result| result.data.as_ref()).flatten().cloned().collect()
}

/// Inner join on `key` across the non-empty datasets. Rows without the key are dropped and
/// later fields overwrite earlier ones. A lone dataset is returned unchanged.
fn join_on_key(results: &[&AgentResult], key: &str) -> Vec<Row> {
    let datasets: Vec<&Vec<Row>> = results
        .iter()
        .filter_map(|result| result.data.as_ref())
        .filter(|rows| !rows.is_empty())
        .collect();

    let (seed, rest) = match datasets.as_slice() {
        [] => return Vec::new(),
        [only] => return (*only).clone(),
        [seed, rest @ ..] => (seed, rest),
    };

    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Row> = HashMap::new();
    for row in seed.iter() {
        let Some(join_value) = key_of(row, key) else {
            continue;
        };
        if !merged.contains_key(&join_value) {
            order.push(join_value.clone());
        }
        merged.insert(join_value, row.clone());
    }

    for rows in rest {
        let mut matched: HashSet<String> = HashSet::new();
        for row in rows.iter() {
            let Some(join_value) = key_of(row, key) else {
                continue;
            };
            if let Some(existing) = merged.get_mut(&join_value) {
                for (field, value) in row {
                    existing.insert(field.clone(), value.clone());
                }
                matched.insert(join_value);
            }
        }
        merged.retain(|join_value, _| matched.contains(join_value));
        order.retain(|join_value| matched.contains(join_value));
    }

    order.into_iter().filter_map(|join_value| merged.remove(&join_value)).collect()
}

// JSON text is the equality key so `1` and `"1"` stay distinct.
fn key_of(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{ResultAggregator, ALL_SOURCES_FAILED};
    use crate::domain::{AgentResult, Row, SkillSummary};
    use crate::errors::LlmError;
    use crate::model::{AgentSummary, ModelLayer, QueryAnalysis, SqlGeneration};

    #[derive(Default)]
    struct CountingModel {
        synth_calls: AtomicUsize,
        seen: Mutex<Vec<AgentSummary>>,
        fail: bool,
    }

    #[async_trait]
    impl ModelLayer for CountingModel {
        async fn generate_sql(&self, _: &str, _: &str, _: &str) -> Result<SqlGeneration, LlmError> {
            Err(LlmError::GenerateSql("not used".to_owned()))
        }

        async fn analyze_query(
            &self,
            _: &str,
            _: &[SkillSummary],
        ) -> Result<QueryAnalysis, LlmError> {
            Err(LlmError::AnalyzeQuery("not used".to_owned()))
        }

        async fn synthesize_response(
            &self,
            _: &str,
            agent_results: &[AgentSummary],
        ) -> Result<String, LlmError> {
            self.synth_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::SynthesizeResponse("upstream 500".to_owned()));
            }
            self.seen.lock().expect("lock").extend(agent_results.iter().cloned());
            Ok("combined answer".to_owned())
        }
    }

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).expect("rows")
    }

    fn aggregator(model: &Arc<CountingModel>) -> ResultAggregator {
        ResultAggregator::new(model.clone())
    }

    #[tokio::test]
    async fn all_failed_reports_every_attempted_agent() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::failure("Orders Data Agent", "Request to Orders Data Agent timed out"),
            AgentResult::failure("Customers Data Agent", "Query failed: boom"),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", None).await.expect("aggregate");

        assert!(!aggregated.success);
        assert_eq!(aggregated.response_text, ALL_SOURCES_FAILED);
        assert_eq!(aggregated.source_agents, vec!["Orders Data Agent", "Customers Data Agent"]);
        assert!(aggregated.combined_data.is_none());
        assert_eq!(model.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_success_short_circuits_without_model_call() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success("Orders Data Agent", "Found 5", Some(rows(json!([{"a": 1}])))),
            AgentResult::failure("Products Data Agent", "Request to Products Data Agent timed out"),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", None).await.expect("aggregate");

        assert!(aggregated.success);
        assert_eq!(aggregated.response_text, "Found 5");
        assert_eq!(aggregated.combined_data, Some(rows(json!([{"a": 1}]))));
        assert_eq!(aggregated.source_agents, vec!["Orders Data Agent"]);
        assert_eq!(model.synth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn join_keeps_only_keys_present_in_every_dataset() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success(
                "A",
                "two rows",
                Some(rows(json!([{"id": 1, "x": "a"}, {"id": 2, "x": "b"}]))),
            ),
            AgentResult::success(
                "B",
                "two rows",
                Some(rows(json!([{"id": 1, "y": "p"}, {"id": 3, "y": "q"}]))),
            ),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", Some("id")).await.expect("aggregate");

        assert_eq!(aggregated.combined_data, Some(rows(json!([{"id": 1, "x": "a", "y": "p"}]))));
        assert_eq!(aggregated.response_text, "combined answer");
        assert_eq!(model.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn join_without_shared_keys_is_empty_not_absent() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success("A", "", Some(rows(json!([{"id": 1}])))),
            AgentResult::success("B", "", Some(rows(json!([{"id": 2}])))),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", Some("id")).await.expect("aggregate");

        assert_eq!(aggregated.combined_data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn join_drops_seed_rows_missed_by_any_later_dataset() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success("A", "", Some(rows(json!([{"id": 1, "a": 1}, {"id": 2, "a": 2}])))),
            AgentResult::success("B", "", Some(rows(json!([{"id": 1, "b": 1}, {"id": 2, "b": 2}])))),
            AgentResult::success("C", "", Some(rows(json!([{"id": 2, "c": 2}])))),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", Some("id")).await.expect("aggregate");

        assert_eq!(
            aggregated.combined_data,
            Some(rows(json!([{"id": 2, "a": 2, "b": 2, "c": 2}])))
        );
    }

    #[tokio::test]
    async fn join_with_one_dataset_keeps_it_verbatim() {
        let model = Arc::new(CountingModel::default());
        let only = rows(json!([{"id": 1, "v": "a"}, {"id": 1, "v": "b"}, {"v": "keyless"}]));
        let results = vec![
            AgentResult::success("A", "three rows", Some(only.clone())),
            AgentResult::success("B", "text only", None),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", Some("id")).await.expect("aggregate");

        assert_eq!(aggregated.combined_data, Some(only));
        assert_eq!(model.synth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn join_drops_rows_without_key_and_overwrites_shared_fields() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success(
                "A",
                "",
                Some(rows(json!([{"id": 1, "v": "old"}, {"v": "keyless"}, {"id": null}]))),
            ),
            AgentResult::success("B", "", Some(rows(json!([{"id": 1, "v": "new"}])))),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", Some("id")).await.expect("aggregate");

        assert_eq!(aggregated.combined_data, Some(rows(json!([{"id": 1, "v": "new"}]))));
    }

    #[tokio::test]
    async fn concatenation_preserves_dispatch_order() {
        let model = Arc::new(CountingModel::default());
        let results = vec![
            AgentResult::success("first", "one", Some(rows(json!([{"n": 1}])))),
            AgentResult::failure("middle", "Request to middle timed out"),
            AgentResult::success("last", "two", Some(rows(json!([{"n": 2}, {"n": 3}])))),
        ];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", None).await.expect("aggregate");

        assert_eq!(aggregated.combined_data, Some(rows(json!([{"n": 1}, {"n": 2}, {"n": 3}]))));
        assert_eq!(aggregated.source_agents, vec!["first", "last"]);
        let seen = model.seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].row_count, 2);
    }

    #[tokio::test]
    async fn multi_source_without_rows_has_no_combined_data() {
        let model = Arc::new(CountingModel::default());
        let results =
            vec![AgentResult::success("a", "text only", None), AgentResult::success("b", "", None)];

        let aggregated =
            aggregator(&model).aggregate(&results, "q", None).await.expect("aggregate");

        assert!(aggregated.success);
        assert!(aggregated.combined_data.is_none());
    }

    #[tokio::test]
    async fn synthesis_failure_propagates() {
        let model = Arc::new(CountingModel { fail: true, ..CountingModel::default() });
        let results =
            vec![AgentResult::success("a", "x", None), AgentResult::success("b", "y", None)];

        let error = aggregator(&model).aggregate(&results, "q", None).await.expect_err("fails");

        assert!(error.to_string().starts_with("Failed to synthesize response"));
    }
}
