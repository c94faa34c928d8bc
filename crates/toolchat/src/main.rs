//! Interactive function-calling chat over an OpenAI-compatible endpoint.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable. Each
//! line of input is one turn; `quit`/`exit`/`bye`, `save` and `stats` are
//! control commands.
//!
//! # Examples
//!
//! ```sh
//! toolchat --model gpt-4 --project demo
//! RUST_LOG=toolchat=debug toolchat --system "You are a terse assistant."
//! ```

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use toolchat::agent::orchestrator::DEFAULT_SYSTEM_PROMPT;
use toolchat::prelude::*;
use toolchat::tools::demo::register_demo_tools;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Interactive function-calling chat with cost tracking.
#[derive(Parser)]
#[command(name = "toolchat", version)]
struct Cli {
    /// Model to use for completions.
    #[arg(long, default_value = toolchat::DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Maximum tokens per model response.
    #[arg(long, default_value_t = 1000)]
    max_tokens: u32,

    /// System prompt (persona).
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system: String,

    /// Project label attached to cost records.
    #[arg(long)]
    project: Option<String>,

    /// Cost log location.
    #[arg(long, default_value = toolchat::agent::config::DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,

    /// Directory for saved conversations.
    #[arg(long, default_value = ".")]
    save_dir: PathBuf,

    /// Truncate the transcript once it reaches this many messages.
    #[arg(long, default_value_t = 50)]
    max_messages: usize,

    /// Message count to truncate back to.
    #[arg(long, default_value_t = 30)]
    truncate_to: usize,

    /// Total attempts per model call (1 disables retries).
    #[arg(long, default_value_t = 5)]
    attempts: u32,

    /// Do not advertise the demo tools.
    #[arg(long)]
    no_tools: bool,

    /// Skip JSON Schema validation of tool arguments.
    #[arg(long)]
    no_arg_validation: bool,

    /// Fail tool calls that run longer than this many seconds.
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// Chat-completions endpoint URL.
    #[arg(long, default_value = toolchat::OPENAI_CHAT_URL)]
    api_url: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("Error: OPENAI_API_KEY environment variable is not set");
            std::process::exit(1);
        }
    };

    let client = match ChatClient::with_url(api_key, &cli.api_url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            std::process::exit(1);
        }
    };

    let mut config = ChatConfig::default()
        .with_model(&cli.model)
        .with_temperature(cli.temperature)
        .with_max_tokens(cli.max_tokens)
        .with_retry(RetryConfig::with_attempts(cli.attempts))
        .with_context_window(cli.max_messages, cli.truncate_to)
        .with_ledger_path(&cli.ledger)
        .with_tool_arg_validation(!cli.no_arg_validation)
        .with_tool_timeout(cli.tool_timeout.map(Duration::from_secs));
    if let Some(project) = &cli.project {
        config = config.with_project(project);
    }

    let mut tools = ToolRegistry::new();
    if !cli.no_tools
        && let Err(e) = register_demo_tools(&mut tools)
    {
        eprintln!("Error: failed to register tools: {e}");
        std::process::exit(1);
    }

    let ledger = match CostLedger::open(&config.ledger_path) {
        Ok(l) => l,
        Err(e) => {
            eprintln!(
                "Error: failed to open cost log {}: {e}",
                config.ledger_path.display()
            );
            std::process::exit(1);
        }
    };

    let mut orchestrator =
        Orchestrator::new(client, tools, ledger, config).with_system_prompt(&cli.system);
    let session = Session::new();
    let interactive = std::io::stdin().is_terminal();

    println!("{}", "=".repeat(70));
    println!("TOOLCHAT ({})", cli.model);
    println!("{}", "=".repeat(70));
    if !orchestrator.tools().is_empty() {
        println!("Tools: {}", orchestrator.tools().names().join(", "));
    }
    println!("Commands: 'quit' to exit, 'save' to save conversation, 'stats' for info\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("You: ");
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read input: {e}");
                break;
            }
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => {
                println!("\nAI: Goodbye! It was nice chatting with you!");
                break;
            }
            Command::Save => save(&session, &orchestrator, &cli.save_dir),
            Command::Stats => print_stats(&session, &orchestrator),
            Command::Message(text) => match orchestrator.run_turn(text).await {
                Ok(outcome) => {
                    if let Some(summary) = outcome.summary() {
                        println!("AI: {}\n", summary.text);
                        println!(
                            "[Messages: {} | Tokens: ~{} | Cost: {} | Total: {}]\n",
                            orchestrator.transcript().len(),
                            summary.total_tokens(),
                            format_cost(summary.cost),
                            format_cost(orchestrator.session_cost()),
                        );
                    }
                }
                Err(e) if e.is_recoverable() => {
                    eprintln!("\nError: {e}\n");
                }
                Err(e) => {
                    eprintln!("\nFatal: {e}");
                    std::process::exit(1);
                }
            },
        }
    }

    print_stats(&session, &orchestrator);
    if interactive && orchestrator.turns() > 0 {
        prompt("Save conversation before exiting? (y/n): ");
        if let Ok(Some(answer)) = lines.next_line().await
            && answer.trim().eq_ignore_ascii_case("y")
        {
            save(&session, &orchestrator, &cli.save_dir);
        }
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

fn save<B: ChatBackend>(session: &Session, orchestrator: &Orchestrator<B>, dir: &std::path::Path) {
    match session.save_snapshot(dir, orchestrator.transcript(), orchestrator.session_cost()) {
        Ok(path) => println!("\nConversation saved to {}\n", path.display()),
        Err(e) => eprintln!("\nError: {e}\n"),
    }
}

fn print_stats<B: ChatBackend>(session: &Session, orchestrator: &Orchestrator<B>) {
    let stats = session.conversation_stats(
        orchestrator.transcript(),
        orchestrator.estimated_transcript_tokens(),
        orchestrator.session_cost(),
    );
    println!("\n{stats}");
    println!("{}\n", orchestrator.ledger().stats().summary());
}
