use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use std::path::{Path, PathBuf};
use tabletalk_core::bedrock;
use tabletalk_core::config::{Config, get_config_path};

const PROVIDERS: [&str; 3] = ["openai", "openrouter", "bedrock"];
const OPENAI_MODELS: [&str; 4] = ["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1"];
const BEDROCK_MODELS: [&str; 3] = [
    bedrock::DEFAULT_MODEL,
    "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
    "anthropic.claude-3-5-sonnet-20241022-v2:0",
];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your LLM provider")
        .items(&PROVIDERS)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(PROVIDERS[selection].to_string())
}

fn setup_api_key(provider: &str) -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt(format!("Enter your {} API key", provider))
        .interact_text()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key)
}

fn model_choices(provider: &str) -> &'static [&'static str] {
    match provider {
        "bedrock" => &BEDROCK_MODELS,
        _ => &OPENAI_MODELS,
    }
}

/// OpenRouter namespaces models by vendor.
fn model_id(provider: &str, model: &str) -> String {
    match provider {
        "openrouter" => format!("openai/{}", model),
        _ => model.to_string(),
    }
}

fn setup_model(provider: &str) -> Result<String> {
    let choices = model_choices(provider);
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(choices)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(model_id(provider, choices[selection]))
}

fn setup_region() -> Result<String> {
    let region: String = Input::new()
        .with_prompt("AWS region")
        .default(bedrock::DEFAULT_REGION.to_string())
        .interact_text()
        .context("Failed to read AWS region")?;

    Ok(region.trim().to_string())
}

fn setup_data_dir(default: &Path) -> Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("Directory with your Doppler study files")
        .default(default.display().to_string())
        .interact_text()
        .context("Failed to read data directory")?;

    Ok(PathBuf::from(path.trim()))
}

pub fn run_onboard() -> Result<Config> {
    println!();
    println!("  {}", style("Welcome to tabletalk!").white().bold());
    println!(
        "  {}",
        style("Ask questions about your study files in plain language.").dim()
    );

    let defaults = Config::default();

    print_step(1, 4, "Provider");
    let provider = setup_provider()?;

    print_step(2, 4, "API Key Setup");
    let api_key = setup_api_key(&provider)?;

    print_step(3, 4, "Model Selection");
    let model = setup_model(&provider)?;
    let aws_region = match provider.as_str() {
        "bedrock" => Some(setup_region()?),
        _ => None,
    };

    print_step(4, 4, "Data Directory");
    let data_dir = setup_data_dir(&defaults.data_dir)?;
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!(
            "  {} Warning: Could not create {}: {}",
            style("!").yellow(),
            data_dir.display(),
            e
        );
    } else {
        println!(
            "  {} Data directory ready at {}",
            style("✓").green(),
            style(data_dir.display()).cyan()
        );
    }

    let config = Config {
        provider: Some(provider),
        api_key,
        aws_region,
        model,
        data_dir,
        ..defaults
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(get_config_path().display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("tabletalk chat").cyan().bold()
    );
    println!();

    Ok(config)
}
