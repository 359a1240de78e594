use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gptoolkit_client::{ClientConfig, OpenAiClient};
use gptoolkit_core::{
    ChainedSecretProvider, CompletionPlan, Dispatcher, EnvSecretProvider, FileSecretStore,
    MatchPolicy, SecretProvider, OPENAI_SECRET,
};
use gptoolkit_db::Database;
use gptoolkit_logging::Logger;

use crate::config::AppConfig;

/// Arguments of `gptoolkit complete`.
pub struct CompleteArgs {
    pub use_case: String,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub policy: MatchPolicy,
    pub dry_run: bool,
    pub json: bool,
}

pub async fn handle_complete(
    db: &Database,
    config: &AppConfig,
    app_dir: &Path,
    logger: Arc<Logger>,
    args: CompleteArgs,
) -> Result<()> {
    let user_text = read_user_text(args.text, args.file.as_deref())?;

    let secrets = ChainedSecretProvider::new()
        .with(EnvSecretProvider::new())
        .with(FileSecretStore::in_dir(app_dir));
    let client = build_client(config, &secrets)?;

    let dispatcher = Dispatcher::new(db, &client, logger).with_policy(args.policy);

    if args.dry_run {
        let plan = dispatcher.plan(&user_text, &args.use_case)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let completion = dispatcher.complete(&user_text, &args.use_case).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&completion)?);
    } else {
        println!("{}", completion.text);
    }

    Ok(())
}

/// Build the HTTP client with the key from `secrets`, if any.
///
/// A missing key is not an error here: stored engines may carry their own.
pub fn build_client(config: &AppConfig, secrets: &dyn SecretProvider) -> Result<OpenAiClient> {
    let mut client_config = ClientConfig::new(config.api_base_url());
    if let Some(key) = secrets
        .get(OPENAI_SECRET)
        .context("Failed to read API key")?
    {
        client_config = client_config.with_api_key(key);
    }
    if let Some(timeout) = config.timeout() {
        client_config = client_config.with_timeout(timeout);
    }

    OpenAiClient::new(client_config).context("Failed to build HTTP client")
}

/// User text from the argument, a file, or stdin, in that order.
fn read_user_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }

    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read user text from stdin")?;
            buf
        }
    };

    Ok(raw.trim_end_matches(['\r', '\n']).to_string())
}

fn print_plan(plan: &CompletionPlan) {
    eprintln!("{}", "=== Dry Run ===".bold());
    eprintln!("Engine:      {}", plan.request.engine.bright_blue());
    eprintln!("Max tokens:  {}", plan.request.max_tokens);
    eprintln!("Temperature: {}", plan.request.temperature);
    eprintln!("Perplexity:  {}", format_score(plan.perplexity));
    eprintln!("Candidates:  {}", plan.candidates.len());
    for candidate in &plan.candidates {
        eprintln!(
            "  {:>14}  {:<20} {}",
            format_score(candidate.perplexity).dimmed(),
            Logger::truncate(&candidate.engine_name, 20),
            Logger::truncate(&candidate.prompt_text, 40)
        );
    }
    eprintln!("{}", "Prompt:".bold());
    println!("{}", plan.request.prompt);
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) if s < 1e6 => format!("{:.3}", s),
        Some(s) => format!("{:.3e}", s),
        None => "n/a".to_string(),
    }
}
