//! toolpilot command-line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use toolpilot_agent::{ChatService, LoopStatus, SkillCatalog};
use toolpilot_core::config::{Config, ConfigLoader};
use toolpilot_core::logging::init_logging;
use toolpilot_core::utils::{expand_tilde, mask_secret, preview};
use toolpilot_core::AgentEvent;
use toolpilot_manager::{run_server, shutdown_signal, AppState};
use toolpilot_providers::Message;
use toolpilot_tools::build_registry;
use tracing::{info, warn};

/// Config keys whose values are never printed in clear
const SECRET_PATHS: &[&[&str]] = &[
    &["provider", "api_key"],
    &["telegram", "token"],
    &["tools", "google", "access_token"],
    &["tools", "notion", "api_key"],
];

#[derive(Parser)]
#[command(name = "toolpilot")]
#[command(about = "Tool-calling chat assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory (defaults to ~/.toolpilot)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (and the Telegram bot when enabled)
    Serve {
        /// Port to listen on, overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send one message and stream the answer
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Model to use for this request
        #[arg(long)]
        model: Option<String>,
    },
    /// List the registered tools
    Tools,
    /// List the skill catalog
    Skills,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    // Keep logs off stdout while answers stream there
    if matches!(cli.command, Commands::Chat { .. }) && std::env::var("RUST_LOG").is_err() {
        config.logging.level = "warn".to_string();
    }
    let _guard = init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port } => run_serve(config, port).await,
        Commands::Chat { message, model } => run_chat(&config, &message, model).await,
        Commands::Tools => run_tools(&config),
        Commands::Skills => run_skills(&config),
        Commands::Config => run_config(&loader, &config),
    }
}

async fn run_serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let state = AppState::from_config(&config);

    println!("{}", style("Starting toolpilot...").bold().cyan());
    println!(
        "  Tools: {}  Skills: {}",
        state.service.tools().len(),
        state.service.catalog().len()
    );

    if config.telegram.enabled {
        match state.telegram.start(None).await {
            Ok(status) => {
                let bot = status.bot_username.unwrap_or_default();
                println!("  Telegram: {} @{}", style("polling").green(), bot);
            }
            Err(e) => {
                warn!("Telegram bot did not start: {}", e);
                println!("  Telegram: {} ({})", style("failed").red(), e);
            }
        }
    } else {
        println!("  Telegram: {}", style("disabled").dim());
    }

    println!(
        "{}",
        style(format!(
            "Listening on http://{}:{}. Press Ctrl+C to stop.",
            config.server.host, port
        ))
        .green()
    );
    info!("Serving on {}:{}", config.server.host, port);

    run_server(state, &config.server.host, port, shutdown_signal()).await?;
    println!("{}", style("Stopped.").green());
    Ok(())
}

async fn run_chat(config: &Config, message: &str, model: Option<String>) -> Result<()> {
    let service = ChatService::from_config(config);
    let history = vec![Message::user(message)];

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = event_rx.recv().await {
            print_event(&mut stdout, event);
        }
    });

    let outcome = service.handle(&history, model, &event_tx).await;
    drop(event_tx);
    printer.await?;
    println!();

    match outcome.status {
        LoopStatus::Completed | LoopStatus::NoAnswer => Ok(()),
        LoopStatus::Failed(e) => anyhow::bail!("Request failed: {}", e),
        LoopStatus::MaxIterationsExceeded => {
            anyhow::bail!("Request stopped at the iteration limit")
        }
    }
}

/// Answer text to stdout, tool activity and errors to stderr
fn print_event(stdout: &mut impl Write, event: AgentEvent) {
    match event {
        AgentEvent::Content { content } => {
            let _ = write!(stdout, "{}", content);
            let _ = stdout.flush();
        }
        AgentEvent::ToolCall {
            name,
            arguments,
            command,
            label,
            ..
        } => {
            let detail = command
                .or_else(|| arguments.map(|a| preview(&a.to_string(), 120)))
                .unwrap_or_default();
            eprintln!(
                "{} {} {}",
                style("→").cyan(),
                style(label.unwrap_or(name)).bold(),
                style(detail).dim()
            );
        }
        AgentEvent::ToolResult {
            name,
            success,
            error,
            url,
            ..
        } => {
            if success {
                let suffix = url.map(|u| format!(" {}", u)).unwrap_or_default();
                eprintln!("{} {}{}", style("✓").green(), name, style(suffix).dim());
            } else {
                eprintln!(
                    "{} {} {}",
                    style("✗").red(),
                    name,
                    style(error.unwrap_or_default()).red()
                );
            }
        }
        AgentEvent::Error { error } => {
            eprintln!("{} {}", style("Error:").red().bold(), error);
        }
        AgentEvent::Iteration { .. } => {}
    }
}

fn run_tools(config: &Config) -> Result<()> {
    let registry = build_registry(&config.tools);

    println!("{}", style("Registered Tools").bold().cyan());
    if registry.is_empty() {
        println!("  No tools registered.");
        return Ok(());
    }
    for schema in registry.list_schemas() {
        let function = &schema["function"];
        let name = function["name"].as_str().unwrap_or_default();
        let description = function["description"].as_str().unwrap_or_default();
        println!("  {}  {}", style(name).bold(), preview(description, 80));
    }
    Ok(())
}

fn run_skills(config: &Config) -> Result<()> {
    let skills_dir = config.agent.skills_dir.as_deref().map(expand_tilde);
    let catalog = SkillCatalog::load(skills_dir.as_deref());

    println!("{}", style("Skill Catalog").bold().cyan());
    for skill in catalog.iter() {
        println!("  {}  {}", style(&skill.id).bold(), skill.description);
    }
    Ok(())
}

fn run_config(loader: &ConfigLoader, config: &Config) -> Result<()> {
    let path = loader.config_path();
    let source = if path.exists() {
        style("found").green()
    } else {
        style("not found, using defaults").yellow()
    };
    println!("{}", style("Configuration").bold().cyan());
    println!("  File: {} ({})", path.display(), source);
    println!();

    let masked = masked_config(config)?;
    println!("{}", serde_json::to_string_pretty(&masked)?);
    Ok(())
}

/// The config as JSON with every secret replaced by its masked form
fn masked_config(config: &Config) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    for path in SECRET_PATHS {
        let pointer = format!("/{}", path.join("/"));
        if let Some(Value::String(secret)) = value.pointer_mut(&pointer) {
            *secret = mask_secret(secret);
        }
    }
    Ok(value)
}
