//! JSON-RPC task envelopes exchanged between the orchestrator and data agents.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::domain::{AgentResult, QueryResult, Row};

pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";
pub const TASKS_SEND_PATH: &str = "/a2a/tasks/send";
pub const HEALTH_PATH: &str = "/health";
pub const JSONRPC_VERSION: &str = "2.0";
pub const TASKS_SEND_METHOD: &str = "tasks/send";

const RESULT_ARTIFACT_ID: &str = "result";
const RESULT_ARTIFACT_NAME: &str = "Query Result";
const ERROR_PREFIX: &str = "Error: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params: no text found",
            Self::InternalError => "Internal error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    Unsupported,
}

// Parts are read loosely: `kind` is accepted for `type` and missing payloads default.
impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match part_tag(&value) {
            Some("text") => Self::Text {
                text: value.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            },
            Some("data") => Self::Data { data: value.get("data").cloned().unwrap_or(Value::Null) },
            _ => Self::Unsupported,
        })
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        Self::Data { data: json!({ "rows": rows }) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    pub message: Message,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: TaskParams,
}

impl TaskRequest {
    pub fn new(id: impl Into<Value>, text: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: TASKS_SEND_METHOD.to_string(),
            params: TaskParams {
                message: Message { role: "user".to_string(), parts: vec![Part::text(text)] },
            },
        }
    }
}

/// Handled results always go out as `completed`; failure is carried by an `Error: ` part.
/// Peers may still report `failed` or an in-progress state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl TaskResult {
    /// Text part if present, rows if present, then an `Error: ` part if the handler reported one.
    pub fn from_query_result(result: QueryResult) -> Self {
        let mut parts = Vec::new();
        if !result.text.is_empty() {
            parts.push(Part::text(result.text));
        }
        if let Some(rows) = result.data.filter(|rows| !rows.is_empty()) {
            parts.push(Part::rows(rows));
        }
        if let Some(error) = result.error {
            parts.push(Part::text(format!("{ERROR_PREFIX}{error}")));
        }

        Self {
            status: TaskStatus::Completed,
            artifacts: vec![Artifact {
                artifact_id: RESULT_ARTIFACT_ID.to_string(),
                name: RESULT_ARTIFACT_NAME.to_string(),
                parts,
            }],
        }
    }

    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.artifacts.iter().flat_map(|artifact| artifact.parts.iter())
    }

    pub fn first_text(&self) -> Option<&str> {
        self.parts().find_map(|part| match part {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    fn error_text(&self) -> Option<&str> {
        self.parts().find_map(|part| match part {
            Part::Text { text } => text.strip_prefix(ERROR_PREFIX),
            _ => None,
        })
    }

    /// True when the only content is an `Error: ` part, which is how a handled failure travels.
    fn reports_failure(&self) -> bool {
        if self.status == TaskStatus::Failed {
            return true;
        }
        let mut saw_error = false;
        for part in self.parts() {
            match part {
                Part::Text { text } if text.starts_with(ERROR_PREFIX) => saw_error = true,
                Part::Text { text } if text.is_empty() => {}
                Part::Text { .. } | Part::Data { .. } => return false,
                Part::Unsupported => {}
            }
        }
        saw_error
    }

    /// Rows from every data part, or `None` when no data part was sent.
    pub fn rows(&self) -> Option<Vec<Row>> {
        let mut saw_data = false;
        let mut rows = Vec::new();
        for part in self.parts() {
            if let Part::Data { data } = part {
                saw_data = true;
                if let Some(Value::Array(items)) = data.get("rows") {
                    rows.extend(items.iter().filter_map(|item| item.as_object().cloned()));
                }
            }
        }
        saw_data.then_some(rows)
    }

    pub fn into_agent_result(self, agent_name: &str) -> AgentResult {
        if self.reports_failure() {
            let error = self
                .error_text()
                .or_else(|| self.first_text().filter(|text| !text.is_empty()))
                .unwrap_or("Unknown error")
                .to_string();
            return AgentResult::failure(agent_name, error);
        }
        AgentResult::success(
            agent_name,
            self.first_text().unwrap_or_default().to_string(),
            self.rows(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcOutcome {
    Result(TaskResult),
    Error(RpcError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn result(id: Value, result: TaskResult) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, outcome: RpcOutcome::Result(result) }
    }

    pub fn error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: RpcOutcome::Error(RpcError { code: code.code(), message: message.into() }),
        }
    }

    pub fn standard_error(id: Value, code: ErrorCode) -> Self {
        Self::error(id, code, code.default_message())
    }

    /// Client-side view of the envelope. A JSON-RPC error becomes a failed result carrying its message.
    pub fn into_agent_result(self, agent_name: &str) -> AgentResult {
        match self.outcome {
            RpcOutcome::Result(result) => result.into_agent_result(agent_name),
            RpcOutcome::Error(error) => AgentResult::failure(agent_name, error.message),
        }
    }
}

/// A `tasks/send` call that passed envelope validation.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingTask {
    pub id: Value,
    pub text: String,
}

/// Server-side envelope validation. On failure the returned response is ready to send.
pub fn parse_task_request(body: &[u8]) -> Result<IncomingTask, RpcResponse> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| RpcResponse::standard_error(Value::Null, ErrorCode::ParseError))?;
    let Some(envelope) = value.as_object() else {
        return Err(RpcResponse::standard_error(Value::Null, ErrorCode::InvalidRequest));
    };

    let id = envelope.get("id").cloned().unwrap_or(Value::Null);

    if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(RpcResponse::standard_error(id, ErrorCode::InvalidRequest));
    }
    if envelope.get("method").and_then(Value::as_str) != Some(TASKS_SEND_METHOD) {
        return Err(RpcResponse::standard_error(id, ErrorCode::MethodNotFound));
    }

    let text = envelope
        .get("params")
        .and_then(|params| params.get("message"))
        .and_then(|message| message.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find(|part| is_text_part(part)))
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());

    match text {
        Some(text) => Ok(IncomingTask { id, text: text.to_string() }),
        None => Err(RpcResponse::standard_error(id, ErrorCode::InvalidParams)),
    }
}

fn is_text_part(part: &Value) -> bool {
    part_tag(part) == Some("text")
}

// Older peers tag parts with `kind` instead of `type`.
fn part_tag(part: &Value) -> Option<&str> {
    ["type", "kind"].iter().find_map(|key| part.get(*key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        parse_task_request, ErrorCode, RpcOutcome, RpcResponse, TaskRequest, TaskResult,
        TaskStatus,
    };
    use crate::domain::QueryResult;

    fn rows(value: Value) -> Vec<serde_json::Map<String, Value>> {
        serde_json::from_value(value).expect("rows")
    }

    fn error_code(body: Value) -> (i64, Value) {
        let bytes = serde_json::to_vec(&body).expect("body");
        match parse_task_request(&bytes) {
            Ok(task) => panic!("expected rejection, got {task:?}"),
            Err(RpcResponse { id, outcome: RpcOutcome::Error(error), .. }) => (error.code, id),
            Err(other) => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = TaskRequest::new("req-1", "How many customers?");

        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({
                "jsonrpc": "2.0",
                "id": "req-1",
                "method": "tasks/send",
                "params": {"message": {"role": "user", "parts": [{"type": "text", "text": "How many customers?"}]}}
            })
        );
    }

    #[test]
    fn rejects_wrong_version_method_and_missing_text() {
        let base = |jsonrpc: &str, method: &str, parts: Value| {
            json!({"jsonrpc": jsonrpc, "id": 7, "method": method, "params": {"message": {"role": "user", "parts": parts}}})
        };

        assert_eq!(error_code(base("1.0", "tasks/send", json!([]))), (-32600, json!(7)));
        assert_eq!(error_code(base("2.0", "other", json!([]))), (-32601, json!(7)));
        assert_eq!(error_code(base("2.0", "tasks/send", json!([]))), (-32602, json!(7)));
        assert_eq!(
            error_code(base("2.0", "tasks/send", json!([{"type": "data", "data": {}}]))),
            (-32602, json!(7))
        );
    }

    #[test]
    fn malformed_body_is_parse_error_with_null_id() {
        match parse_task_request(b"{not json") {
            Err(RpcResponse { id, outcome: RpcOutcome::Error(error), .. }) => {
                assert_eq!(error.code, ErrorCode::ParseError.code());
                assert_eq!(error.message, "Parse error");
                assert_eq!(id, Value::Null);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_kind_tagged_text_part() {
        let body = json!({
            "jsonrpc": "2.0", "id": "a", "method": "tasks/send",
            "params": {"message": {"role": "user", "parts": [{"kind": "data"}, {"kind": "text", "text": "revenue"}]}}
        });
        let task = parse_task_request(&serde_json::to_vec(&body).expect("body")).expect("task");

        assert_eq!(task.text, "revenue");
        assert_eq!(task.id, json!("a"));
    }

    #[test]
    fn success_envelope_matches_wire_format() {
        let result = QueryResult::success("Found 2 results.", rows(json!([{"n": 1}, {"n": 2}])));
        let response = RpcResponse::result(json!("x"), TaskResult::from_query_result(result));

        assert_eq!(
            serde_json::to_value(&response).expect("serialize"),
            json!({
                "jsonrpc": "2.0",
                "id": "x",
                "result": {
                    "status": "completed",
                    "artifacts": [{
                        "artifactId": "result",
                        "name": "Query Result",
                        "parts": [
                            {"type": "text", "text": "Found 2 results."},
                            {"type": "data", "data": {"rows": [{"n": 1}, {"n": 2}]}}
                        ]
                    }]
                }
            })
        );
    }

    #[test]
    fn error_envelope_round_trips_into_failed_agent_result() {
        let wire = json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32603, "message": "boom"}});
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("Orders Data Agent");

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn handled_failure_travels_as_completed_error_part() {
        let task = TaskResult::from_query_result(QueryResult::failure("Table 'orders' not allowed"));
        assert_eq!(
            serde_json::to_value(&task).expect("serialize"),
            json!({
                "status": "completed",
                "artifacts": [{
                    "artifactId": "result",
                    "name": "Query Result",
                    "parts": [{"type": "text", "text": "Error: Table 'orders' not allowed"}]
                }]
            })
        );

        let result = task.into_agent_result("Customers Data Agent");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Table 'orders' not allowed"));
        assert!(result.data.is_none());
    }

    #[test]
    fn client_takes_first_text_and_all_rows() {
        let wire = json!({
            "jsonrpc": "2.0", "id": "1",
            "result": {"status": "completed", "artifacts": [
                {"artifactId": "result", "name": "Query Result", "parts": [
                    {"type": "text", "text": "first"},
                    {"type": "data", "data": {"rows": [{"a": 1}]}},
                    {"type": "file", "uri": "ignored"}
                ]},
                {"artifactId": "extra", "name": "More", "parts": [
                    {"type": "text", "text": "second"},
                    {"type": "data", "data": {"rows": [{"a": 2}]}}
                ]}
            ]}
        });
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("agent");

        assert!(result.success);
        assert_eq!(result.text, "first");
        assert_eq!(result.data, Some(rows(json!([{"a": 1}, {"a": 2}]))));
    }

    #[test]
    fn failed_status_from_peer_is_a_failure() {
        let wire = json!({
            "jsonrpc": "2.0", "id": "1",
            "result": {"status": "failed", "artifacts": [
                {"artifactId": "result", "parts": [{"type": "text", "text": "Error: no table"}]}
            ]}
        });
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("agent");

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no table"));
    }

    #[test]
    fn partial_output_with_error_note_stays_successful() {
        let partial = QueryResult {
            success: true,
            text: "Found 1 result.".to_owned(),
            data: Some(rows(json!([{"n": 1}]))),
            error: Some("truncated".to_owned()),
        };
        let result = TaskResult::from_query_result(partial).into_agent_result("agent");

        assert!(result.success);
        assert_eq!(result.text, "Found 1 result.");
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn artifact_without_name_or_id_still_decodes() {
        let wire = json!({
            "jsonrpc": "2.0", "id": "1",
            "result": {"status": "completed", "artifacts": [
                {"parts": [{"type": "text", "text": "3 customers"}]}
            ]}
        });
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("agent");

        assert!(result.success);
        assert_eq!(result.text, "3 customers");
    }

    #[test]
    fn kind_tagged_parts_are_read_like_type_tagged_ones() {
        let wire = json!({
            "jsonrpc": "2.0", "id": "1",
            "result": {"status": "completed", "artifacts": [{"name": "Query Result", "parts": [
                {"kind": "text", "text": "two rows"},
                {"kind": "data", "data": {"rows": [{"a": 1}, {"a": 2}]}}
            ]}]}
        });
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("agent");

        assert_eq!(result.text, "two rows");
        assert_eq!(result.data, Some(rows(json!([{"a": 1}, {"a": 2}]))));
    }

    #[test]
    fn unknown_status_and_missing_fields_fall_back_to_success() {
        let wire = json!({
            "jsonrpc": "2.0", "id": "1",
            "result": {"status": "working", "artifacts": [{"parts": [
                {"type": "text"},
                {"type": "data", "data": {"rows": [{"a": 1}]}}
            ]}]}
        });
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let RpcOutcome::Result(task) = &response.outcome else {
            panic!("expected a result envelope");
        };
        assert_eq!(task.status, TaskStatus::Other);

        let result = response.into_agent_result("agent");
        assert!(result.success);
        assert_eq!(result.text, "");
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn result_without_artifacts_decodes_to_empty_success() {
        let wire = json!({"jsonrpc": "2.0", "id": "1", "result": {}});
        let response: RpcResponse = serde_json::from_value(wire).expect("parse");
        let result = response.into_agent_result("agent");

        assert!(result.success);
        assert!(result.data.is_none());
    }

    #[test]
    fn completed_task_without_data_part_has_no_rows() {
        let task = TaskResult::from_query_result(QueryResult::success("No results found.", vec![]));
        let result = task.into_agent_result("agent");

        assert_eq!(result.text, "No results found.");
        assert_eq!(result.data, None);
    }
}
