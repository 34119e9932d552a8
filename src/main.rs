// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::PathBuf;

use docalign::Language;
use docalign::app_config::{self, Config, ProviderKind};
use docalign::app_controller::Controller;
use docalign::tracker::{TaskState, TaskStatus};

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    OpenRouter,
    OpenAI,
    LMStudio,
    Anthropic,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::OpenRouter => ProviderKind::OpenRouter,
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::LMStudio => ProviderKind::LMStudio,
            CliProvider::Anthropic => ProviderKind::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align a document with its translation
    Align(AlignArgs),

    /// List supported languages
    Languages,

    /// Generate shell completions for docalign
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct AlignArgs {
    /// Original document (.docx, .pptx, .xlsx, .txt)
    #[arg(value_name = "ORIGINAL")]
    source_path: PathBuf,

    /// Translated document
    #[arg(value_name = "TRANSLATION")]
    target_path: PathBuf,

    /// Oracle provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use for alignment
    #[arg(short, long)]
    model: Option<String>,

    /// Language of the original (name or ISO code, e.g. 'en', 'English')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Language of the translation
    #[arg(short, long)]
    target_language: Option<String>,

    /// Root directory for task output
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Overlap buffer at chunk boundaries, in units
    #[arg(long)]
    buffer_units: Option<usize>,

    /// Force the number of parts instead of deriving it from document size
    #[arg(long)]
    parts: Option<usize>,

    /// Disable oracle-assisted sentence splitting
    #[arg(long)]
    no_post_split: bool,

    /// Chunks aligned at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Configuration file path
    #[arg(short, long, default_value = "docalign.json", env = "DOCALIGN_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// docalign - sentence alignment of documents and their translations
///
/// Aligns an original document with its translation, sentence by sentence,
/// using a language model, and writes a bilingual table for translation memory.
#[derive(Parser, Debug)]
#[command(name = "docalign")]
#[command(version)]
#[command(about = "LLM-assisted sentence alignment of bilingual documents")]
#[command(long_about = "docalign cuts a document and its translation into matching chunks, has a language model align them sentence by sentence, and merges the result into one reviewed table.

EXAMPLES:
    docalign align report.docx report_zh.docx                  # Align using default config
    docalign align -s en -t fr deck.pptx deck_fr.pptx          # English to French slides
    docalign align prices.xlsx prices_zh.xlsx                  # Workbooks, cell by cell
    docalign align -p anthropic -m claude-3-5-sonnet-latest a.docx b.docx
    docalign align --parts 3 --concurrency 2 big.docx big_de.docx
    docalign languages                                         # List supported languages
    docalign completions bash > docalign.bash                  # Generate bash completions

CONFIGURATION:
    Configuration is stored in docalign.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    open-router - OpenRouter gateway (requires OPENROUTER_API_KEY)
    open-ai     - OpenAI API (requires OPENAI_API_KEY)
    lm-studio   - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)
    anthropic   - Anthropic API (requires ANTHROPIC_API_KEY)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The ceiling is Trace; the effective level is applied with set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "docalign", &mut std::io::stdout());
            Ok(())
        }
        Commands::Languages => {
            list_languages();
            Ok(())
        }
        Commands::Align(args) => run_align(args).await,
    }
}

fn list_languages() {
    println!("{:<6} {:<12} {:<12} UNIT", "CODE", "NAME", "NATIVE");
    for language in Language::all() {
        println!(
            "{:<6} {:<12} {:<12} {}",
            language.code(),
            language.name(),
            language.native_name(),
            if language.is_logographic() { "character" } else { "word" }
        );
    }
}

/// Load the configuration and apply command line overrides
fn load_config(options: &AlignArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = &options.provider {
        config.oracle.provider = provider.clone().into();
    }

    if let Some(model) = &options.model {
        config.oracle.active_provider_config_mut().model = model.clone();
    }

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }

    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }

    if let Some(output_dir) = &options.output_dir {
        config.output_dir = output_dir.clone();
    }

    if let Some(buffer_units) = options.buffer_units {
        config.alignment.buffer_units = buffer_units;
    }

    if let Some(parts) = options.parts {
        config.alignment.forced_parts = Some(parts);
    }

    if options.no_post_split {
        config.alignment.enable_post_split = false;
    }

    if let Some(concurrency) = options.concurrency {
        config.alignment.max_concurrent_chunks = concurrency;
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    Ok(config)
}

async fn run_align(options: AlignArgs) -> Result<()> {
    // Apply the command line level before the config is read
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = load_config(&options)?;
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    info!(
        "Aligning {} ({}) with {} ({}) using {}",
        options.source_path.display(),
        config.source_language,
        options.target_path.display(),
        config.target_language,
        config.oracle.get_model()
    );

    let controller = Controller::with_config(config)?;
    let state = controller
        .run(options.source_path.clone(), options.target_path.clone())
        .await?;

    print_summary(&state)
}

fn print_summary(state: &TaskState) -> Result<()> {
    match state.status {
        TaskStatus::Done => {
            let result = state
                .result
                .as_ref()
                .ok_or_else(|| anyhow!("Task finished without a result"))?;
            println!("Output:        {}", result.output_path.display());
            println!("Rows:          {}", result.row_count);
            println!("Flagged rows:  {}", result.flagged_rows);
            println!("Parts:         {}", result.split_parts);
            if !result.failed_chunks.is_empty() {
                warn!("Failed parts: {:?} (their content is missing from the output)", result.failed_chunks);
            }
            println!("Issues:        {}", result.issue_count);
            for issue in &result.issues {
                println!("  - {}", issue);
            }
            if result.issue_count > result.issues.len() {
                println!("  ... {} more", result.issue_count - result.issues.len());
            }
            Ok(())
        }
        _ => Err(anyhow!(
            "{}: {}",
            state.message,
            state.error.as_deref().unwrap_or("unknown error")
        )),
    }
}
