use std::io::{self, BufRead, Write};
use std::sync::Arc;

use quarry_agent::{ChatModel, ChatTurn, FrontendAgent, FrontendReply, OpenAiModel};
use quarry_core::config::AppConfig;
use tokio::runtime::Runtime;

use crate::commands::{load_config, runtime, CommandResult};

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

/// One question with `question`, otherwise an interactive session on stdin.
pub fn run(question: Option<&str>, json_output: bool) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let frontend = match build(&config) {
        Ok(frontend) => frontend,
        Err(message) => return CommandResult::failure("chat", "runtime_init", message, 3),
    };

    let Some(question) = question else {
        let stdin = io::stdin();
        let stdout = io::stdout();
        return match session(&runtime, &frontend, stdin.lock(), stdout.lock()) {
            Ok(answered) => {
                CommandResult::success("chat", format!("chat ended after {answered} answer(s)"))
            }
            Err(error) => CommandResult::failure("chat", "io", error.to_string(), 3),
        };
    };

    match runtime.block_on(frontend.query(question, &[])) {
        Ok(reply) if json_output => CommandResult {
            exit_code: 0,
            output: serde_json::to_string_pretty(&reply)
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}")),
        },
        Ok(reply) => CommandResult::success("chat", render(&reply)),
        Err(error) => CommandResult::failure("chat", "query_execution", error.to_string(), 5),
    }
}

fn build(config: &AppConfig) -> Result<FrontendAgent, String> {
    let model: Arc<dyn ChatModel> =
        Arc::new(OpenAiModel::new(config.llm.clone()).map_err(|error| error.to_string())?);
    FrontendAgent::from_config(config, model).map_err(|error| error.to_string())
}

/// Reads one question per line and keeps the conversation as history. Returns answers given.
fn session<R, W>(
    runtime: &Runtime,
    frontend: &FrontendAgent,
    input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let agents = runtime.block_on(frontend.agents());
    writeln!(output, "connected to {} data agent(s); type `exit` to leave", agents.len())?;

    let mut history: Vec<ChatTurn> = Vec::new();
    let mut answered = 0;
    for line in input.lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question) {
            break;
        }

        match runtime.block_on(frontend.query(question, &history)) {
            Ok(reply) => {
                writeln!(output, "{}", render(&reply))?;
                history.push(ChatTurn::user(question));
                history.push(ChatTurn::assistant(reply.response));
                answered += 1;
            }
            Err(error) => writeln!(output, "error: {error}")?,
        }
        output.flush()?;
    }
    Ok(answered)
}

fn render(reply: &FrontendReply) -> String {
    let mut lines: Vec<String> = reply
        .intermediate_steps
        .iter()
        .map(|step| format!("[{}] {}", step.tool, step.input))
        .collect();
    lines.push(reply.response.clone());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use quarry_agent::llm::AssistantTurn;
    use quarry_agent::{ChatModel, FrontendAgent, FrontendReply};
    use quarry_core::LlmError;
    use serde_json::{json, Value};

    use super::{render, session};

    /// Answers with how many messages it was sent.
    struct CountingModel;

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn complete(
            &self,
            messages: &[Value],
            _: &[Value],
        ) -> Result<AssistantTurn, LlmError> {
            Ok(AssistantTurn {
                content: Some(format!("seen {} messages", messages.len())),
                tool_calls: Vec::new(),
            })
        }
    }

    fn frontend() -> FrontendAgent {
        FrontendAgent::new(
            Arc::new(CountingModel),
            vec!["http://127.0.0.1:9".to_owned()],
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .expect("frontend")
    }

    #[test]
    fn session_carries_history_and_stops_on_exit() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let mut output = Vec::new();

        let answered = session(
            &runtime,
            &frontend(),
            "first question\n\n   \nsecond question\nexit\nnever asked\n".as_bytes(),
            &mut output,
        )
        .expect("session");

        let transcript = String::from_utf8(output).expect("utf8");
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(answered, 2);
        assert_eq!(lines[0], "connected to 0 data agent(s); type `exit` to leave");
        // system + question, then system + two history turns + question
        assert_eq!(lines[1], "seen 2 messages");
        assert_eq!(lines[2], "seen 4 messages");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn render_lists_tool_steps_before_the_answer() {
        let reply: FrontendReply = FrontendReply {
            response: "Revenue grew 4%.".to_owned(),
            intermediate_steps: vec![quarry_agent::frontend::ToolStep {
                tool: "orders_data_agent".to_owned(),
                input: json!({"query": "revenue by month"}),
                output: "ok".to_owned(),
            }],
        };

        assert_eq!(
            render(&reply),
            "[orders_data_agent] {\"query\":\"revenue by month\"}\nRevenue grew 4%."
        );
    }
}
