//! Scout CLI - research assistant over MCP tool providers
//!
//! A command-line interface for asking the scout agent questions.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use scout::session::ChatSession;
use scout_cli::config::{ConfigError, IssueLevel, init_config_at, load_config_from, resolve_path};
use scout_cli::error::Result;
use scout_cli::host::{build_orchestrator, load, render_event, render_probe, render_tools};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Scout - ask a local model questions it answers with MCP tools
#[derive(Parser)]
#[command(name = "scout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "SCOUT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask(AskArgs),

    /// Start an interactive chat session
    Chat(ChatArgs),

    /// Check which tool providers are reachable
    Probe,

    /// List the tools every provider offers
    Tools,

    /// Write a default configuration file
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the ask command
#[derive(Args)]
struct AskArgs {
    /// The question
    #[arg(required = true)]
    query: Vec<String>,

    /// Print tool calls as they happen
    #[arg(short, long)]
    events: bool,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Custom prompt prefix
    #[arg(short, long, default_value = "You: ")]
    prompt: String,
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show configuration file path
    Path,
    /// Show effective configuration
    Show,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    match rt.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "scout_cli={level},scout={level},{}",
            if verbosity >= 3 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Ask(args) => cmd_ask(args, cli.config).await,
        Commands::Chat(args) => cmd_chat(args, cli.config).await,
        Commands::Probe => cmd_probe(cli.config).await,
        Commands::Tools => cmd_tools(cli.config).await,
        Commands::Init(args) => cmd_init(args, cli.config).await,
        Commands::Config(args) => cmd_config(args, cli.config).await,
    }
}

/// Answer one question.
async fn cmd_ask(args: AskArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let (_, config) = load(config_path).await?;
    let orchestrator = build_orchestrator(&config)?;
    let query = args.query.join(" ");

    let outcome = if args.events {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("{}", render_event(&event));
            }
        });
        let outcome = orchestrator.run_with_events(&query, &tx).await;
        drop(tx);
        let _ = printer.await;
        outcome
    } else {
        orchestrator.run(&query).await
    };

    println!("{}", outcome.render());
    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Start interactive chat.
async fn cmd_chat(args: ChatArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let (_, config) = load(config_path).await?;
    let orchestrator = build_orchestrator(&config)?;
    let mut session = ChatSession::new();

    println!("Scout Chat | model {} | type 'exit' to quit\n", config.agent.model);
    if let Some(greeting) = session.last() {
        println!("Scout: {}\n", greeting.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", args.prompt);
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        session.submit(&orchestrator, text).await;
        if let Some(reply) = session.last() {
            println!("\nScout: {}\n", reply.text);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Check provider liveness once.
async fn cmd_probe(config_path: Option<PathBuf>) -> Result<ExitCode> {
    let (_, config) = load(config_path).await?;
    let orchestrator = build_orchestrator(&config)?;

    let statuses = orchestrator.probe_providers().await;
    print!("{}", render_probe(&statuses));

    Ok(if statuses.iter().all(|s| s.reachable) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// List provider tools.
async fn cmd_tools(config_path: Option<PathBuf>) -> Result<ExitCode> {
    let (_, config) = load(config_path).await?;
    let orchestrator = build_orchestrator(&config)?;

    let tools = orchestrator.list_tools().await?;
    if tools.is_empty() {
        println!("No tools available.");
    } else {
        print!("{}", render_tools(&tools));
    }
    Ok(ExitCode::SUCCESS)
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let path = resolve_path(config_path);

    if !init_config_at(&path, args.force).await? {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Configuration created: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. ollama pull llama3.2:latest");
    println!("  2. start the MCP servers listed under [providers]");
    println!("  3. scout probe");
    println!("  4. scout chat");

    Ok(ExitCode::SUCCESS)
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let path = resolve_path(config_path);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let config = load_config_from(&path).await?.with_env();
            let rendered = toml::to_string_pretty(&config).map_err(ConfigError::from)?;
            if !path.exists() {
                println!("# {} does not exist, showing defaults", path.display());
            }
            println!("{rendered}");
        }
        ConfigCommands::Validate => {
            let config = load_config_from(&path).await?.with_env();
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.level == IssueLevel::Error) {
                return Ok(ExitCode::FAILURE);
            }
            println!("Configuration is valid");
        }
    }

    Ok(ExitCode::SUCCESS)
}
