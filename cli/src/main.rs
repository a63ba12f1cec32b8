use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabletalk_core::{
    AgentError, AgentLoop, ContextBuilder, CostTracker, DataSource, LocalDataSource, QueryOutcome,
    ToolExecutor, ToolRegistry, UsageTally, config, providers,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod onboard;
mod repl;

#[derive(Parser)]
#[command(name = "tabletalk")]
#[command(about = "tabletalk - ask questions about your Doppler study files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory with the data files (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// -v for info logs, -vv for debug
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up API key, model and data directory
    Onboard,
    /// Answer a single question
    Ask { question: String },
    /// Interactive session
    Chat,
    /// List the data files the agent can see
    Files,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat
        }
    });

    if let Commands::Onboard = command {
        let onboard_config = onboard::run_onboard().map_err(|e| {
            eprintln!("{} Onboarding failed: {}", style("✗").red(), e);
            anyhow::anyhow!("Onboarding failed: {}", e)
        })?;
        config::save_config(&onboard_config)?;
        return Ok(());
    }

    let mut config = config::load_config()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    ensure_data_dir(&config.data_dir)?;
    info!(
        data_dir = %config.data_dir.display(),
        model = %config.model,
        "Loaded configuration"
    );

    match command {
        Commands::Onboard => {}
        Commands::Files => {
            let source = LocalDataSource::new(&config.data_dir);
            let files = source.list_files().await?;
            if files.is_empty() {
                println!("No data files in {}", config.data_dir.display());
            }
            for file in files {
                println!("{}", file);
            }
        }
        Commands::Ask { question } => {
            let agent = build_agent(&config)?;
            println!("\n{}\n", style("Analyzing...").dim());
            match agent.ask(&question).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => {
                    eprintln!("{} {}", style("✗").red(), e);
                    if let Some(line) =
                        partial_usage_line(&e, &UsageTally::default(), &config.cost_tracker())
                    {
                        eprintln!("{}", style(line).dim());
                    }
                    anyhow::bail!("Query failed: {}", e);
                }
            }
        }
        Commands::Chat => {
            let agent = build_agent(&config)?;
            repl::run(&agent, &config).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "tabletalk=warn",
        1 => "tabletalk=info",
        _ => "tabletalk=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.is_dir() {
        anyhow::bail!(
            "Data directory {} does not exist. Pass --data-dir or run 'tabletalk onboard'.",
            data_dir.display()
        );
    }
    Ok(())
}

fn build_agent(config: &config::Config) -> Result<AgentLoop> {
    let provider = providers::create_provider(config).context("Failed to set up LLM provider")?;
    let source: Arc<dyn DataSource> = Arc::new(LocalDataSource::new(&config.data_dir));

    let mut context_builder = ContextBuilder::new();
    if let Some(notes) = &config.notes_file {
        context_builder = context_builder.with_notes_file(notes);
    }

    Ok(AgentLoop::new(
        provider,
        context_builder,
        Arc::new(ToolRegistry::new()),
        ToolExecutor::new(source),
    )
    .with_max_iterations(config.max_iterations)
    .with_retry_policy(config.retry_policy())
    .with_cost_tracker(config.cost_tracker()))
}

fn print_outcome(outcome: &QueryOutcome) {
    termimad::print_text(&outcome.answer);
    println!(
        "\n{}",
        style(format!(
            "tokens: {} in / {} out · ${:.4}",
            outcome.usage.prompt_tokens, outcome.usage.completion_tokens, outcome.estimated_cost.total_cost
        ))
        .dim()
    );
}

/// Tokens a query spent before it stopped early, counted from `since`.
/// `None` for errors that carry no usage or when nothing was spent.
pub(crate) fn partial_usage_line(
    error: &AgentError,
    since: &UsageTally,
    pricing: &CostTracker,
) -> Option<String> {
    let usage = error.partial_usage()?.since(since);
    if usage.is_empty() {
        return None;
    }
    let cost = pricing.estimate_cost(&usage);
    Some(format!(
        "tokens used before stopping: {} in / {} out · ${:.4}",
        usage.prompt_tokens, usage.completion_tokens, cost.total_cost
    ))
}
