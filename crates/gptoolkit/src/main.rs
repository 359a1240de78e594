use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use gptoolkit_core::{MatchPolicy, TextPolicy};
use gptoolkit_db::Database;
use gptoolkit_logging::{init_tracing, LogFormat, Logger};

mod complete;
mod config;
mod configure;
mod prompts;

use complete::CompleteArgs;
use config::{default_app_dir, AppConfig};
use prompts::AddArgs;

#[derive(Parser, Debug)]
#[command(
    name = "gptoolkit",
    about = "Store prompt templates and dispatch completions",
    version,
    author
)]
struct Cli {
    /// Directory for app data (default: ~/.gptoolkit)
    #[arg(long, global = true, env = "GPTOOLKIT_HOME")]
    app_data: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store the API key and prepare the data directory
    Configure {
        /// OpenAI API key (prompted for if omitted)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Store a prompt with its engine, use case and parameters
    Add {
        /// Prompt text prepended to user input
        #[arg(short, long)]
        prompt: String,

        /// Engine (model) name
        #[arg(short, long)]
        engine: String,

        /// Use case name
        #[arg(short, long)]
        use_case: String,

        /// Use case description
        #[arg(short, long, default_value = "")]
        description: String,

        /// API key for this engine (default: the configured key)
        #[arg(long)]
        api_key: Option<String>,

        /// Maximum tokens to generate
        #[arg(long, default_value_t = 256)]
        max_tokens: u32,

        /// Sampling temperature
        #[arg(long, default_value_t = 0.5)]
        temperature: f64,
    },

    /// Search stored prompts (case-insensitive substring filters)
    Search {
        /// Filter by prompt text
        #[arg(long)]
        prompt: Option<String>,

        /// Filter by engine name
        #[arg(long)]
        engine: Option<String>,

        /// Filter by use case name
        #[arg(long)]
        use_case: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored use case names
    UseCases {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pick the best stored prompt for the input and run a completion
    Complete {
        /// Use case name
        #[arg(short, long)]
        use_case: String,

        /// Input text (reads --file or stdin if omitted)
        text: Option<String>,

        /// Read input text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// How the input narrows stored prompts (default from config)
        #[arg(long, value_enum)]
        match_prompt: Option<MatchChoice>,

        /// How the use case name is matched (default from config)
        #[arg(long, value_enum)]
        match_use_case: Option<MatchChoice>,

        /// Show the selected prompt and request without calling the API
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatchChoice {
    Ignore,
    Substring,
    Exact,
}

impl From<MatchChoice> for TextPolicy {
    fn from(choice: MatchChoice) -> Self {
        match choice {
            MatchChoice::Ignore => TextPolicy::Ignore,
            MatchChoice::Substring => TextPolicy::Substring,
            MatchChoice::Exact => TextPolicy::Exact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let app_dir = cli.app_data.clone().unwrap_or_else(default_app_dir);

    if let Commands::Configure { api_key } = &cli.command {
        return configure::handle_configure(api_key.clone(), &app_dir);
    }

    let config = AppConfig::load(&app_dir)?.unwrap_or_default();

    let logger = match config.log_path(&app_dir) {
        Some(path) => Logger::with_file(log_format, &path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    let db_path = config.database_path(&app_dir);
    let db = Database::open_at(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Commands::Configure { .. } => unreachable!("handled above"),
        Commands::Add {
            prompt,
            engine,
            use_case,
            description,
            api_key,
            max_tokens,
            temperature,
        } => prompts::handle_add(
            &db,
            &logger,
            AddArgs {
                prompt,
                engine,
                use_case,
                description,
                api_key,
                max_tokens,
                temperature,
            },
        ),
        Commands::Search {
            prompt,
            engine,
            use_case,
            json,
        } => prompts::handle_search(&db, prompt, engine, use_case, json),
        Commands::UseCases { json } => prompts::handle_use_cases(&db, json),
        Commands::Complete {
            use_case,
            text,
            file,
            match_prompt,
            match_use_case,
            dry_run,
            json,
        } => {
            let policy = MatchPolicy {
                prompt: match_prompt.map(Into::into).unwrap_or(config.matching.prompt),
                use_case: match_use_case
                    .map(Into::into)
                    .unwrap_or(config.matching.use_case),
            };
            complete::handle_complete(
                &db,
                &config,
                &app_dir,
                logger,
                CompleteArgs {
                    use_case,
                    text,
                    file,
                    policy,
                    dry_run,
                    json,
                },
            )
            .await
        }
    }
}
