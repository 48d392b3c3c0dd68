pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quarry",
    about = "Quarry operator CLI",
    long_about = "Operate the quarry BI router: inspect config, check readiness, prepare the database, \
list data agents, ask questions or chat.",
    after_help = "Examples:\n  quarry doctor --json\n  quarry seed --customers 200\n  quarry ask \"What was revenue last month?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM credentials, DB connectivity and agent reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo customers, products and orders")]
    Seed {
        #[arg(long, help = "Number of customers to generate (default 100)")]
        customers: Option<usize>,
        #[arg(long, help = "Number of orders to generate (default 500)")]
        orders: Option<usize>,
    },
    #[command(about = "Discover data agents and list their skills")]
    Agents,
    #[command(about = "Answer a question through the orchestrator pipeline")]
    Ask {
        question: String,
        #[arg(long, help = "Print the aggregated result as JSON")]
        json: bool,
    },
    #[command(about = "Chat with a model that calls data agents as tools (interactive by default)")]
    Chat {
        question: Option<String>,
        #[arg(long, help = "Print the reply and tool steps as JSON")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            let (output, passed) = commands::doctor::run(json);
            commands::CommandResult { exit_code: if passed { 0 } else { 4 }, output }
        }
        Command::Migrate => commands::migrate::run(),
        Command::Seed { customers, orders } => commands::seed::run(customers, orders),
        Command::Agents => commands::agents::run(),
        Command::Ask { question, json } => commands::ask::run(&question, json),
        Command::Chat { question, json } => commands::chat::run(question.as_deref(), json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn seed_and_ask_arguments_parse() {
        let cli = Cli::parse_from(["quarry", "seed", "--customers", "10"]);
        assert!(matches!(cli.command, Command::Seed { customers: Some(10), orders: None }));

        let cli = Cli::parse_from(["quarry", "ask", "--json", "How many customers?"]);
        match cli.command {
            Command::Ask { question, json } => {
                assert_eq!(question, "How many customers?");
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chat_question_is_optional() {
        let cli = Cli::parse_from(["quarry", "chat"]);
        assert!(matches!(cli.command, Command::Chat { question: None, json: false }));

        let cli = Cli::parse_from(["quarry", "chat", "--json", "Top products?"]);
        match cli.command {
            Command::Chat { question, json } => {
                assert_eq!(question.as_deref(), Some("Top products?"));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
