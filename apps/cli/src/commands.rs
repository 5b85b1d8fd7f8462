//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::info;

use clearmind_core::companion::ReadingCompanion;
use clearmind_core::credential::CredentialStore;
use clearmind_core::dashboard::{Dashboard, FeatureId};
use clearmind_core::focus::{FocusCursor, split_sentences};
use clearmind_core::pipeline::TransformationPipeline;
use clearmind_shared::{AppConfig, TaskResult, init_config, load_config, load_config_from};
use clearmind_storage::Storage;

use crate::render::{self, SpinnerObserver};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ClearMind: make overwhelming text manageable.
#[derive(Parser)]
#[command(
    name = "clearmind",
    version,
    about = "Simplify, segment, and organise overwhelming text with a language model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this config file instead of ~/.clearmind/clearmind.toml.
    #[arg(long, global = true, env = "CLEARMIND_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the text to transform comes from: argument, `--file`, or stdin.
#[derive(Args)]
pub(crate) struct TextSource {
    /// Text to transform. Reads stdin when neither this nor --file is given.
    text: Option<String>,

    /// Read the text from a file.
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Summarise text, list its key points, and rewrite it plainly.
    Simplify(TextSource),

    /// Split text into sentences.
    Segment(TextSource),

    /// Turn notes into memory cards.
    Extract(TextSource),

    /// Break a goal into small, prioritised steps.
    Decompose {
        #[command(flatten)]
        source: TextSource,

        /// Step ids to tick off once the plan is ready (comma-separated).
        #[arg(long, value_delimiter = ',')]
        check: Vec<u32>,
    },

    /// Read text one sentence at a time.
    Focus {
        #[command(flatten)]
        source: TextSource,

        /// Split sentences locally instead of asking the model.
        #[arg(long)]
        local: bool,
    },

    /// Ask the reading companion a question about a document.
    Ask {
        /// Document the question is about.
        #[arg(short, long)]
        document: PathBuf,

        /// The question.
        question: String,
    },

    /// Explain a passage of a document in plain words.
    Explain {
        /// Document the passage comes from.
        #[arg(short, long)]
        document: PathBuf,

        /// The highlighted passage.
        selection: String,
    },

    /// Manage the model API key.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// API key subcommands.
#[derive(Subcommand)]
pub(crate) enum KeyAction {
    /// Save a key (read from stdin).
    Set,
    /// Remove the saved key.
    Clear,
    /// Show whether a key is saved, masked.
    Status,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "clearmind=warn",
        1 => "clearmind=info",
        2 => "clearmind=debug",
        _ => "clearmind=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Simplify(source) => {
            cmd_transform(config_path, FeatureId::Simplifier, &source).await
        }
        Command::Segment(source) => cmd_transform(config_path, FeatureId::Focus, &source).await,
        Command::Extract(source) => cmd_transform(config_path, FeatureId::Memory, &source).await,
        Command::Decompose { source, check } => cmd_decompose(config_path, &source, &check).await,
        Command::Focus { source, local } => cmd_focus(config_path, &source, local).await,
        Command::Ask { document, question } => cmd_ask(config_path, &document, &question).await,
        Command::Explain {
            document,
            selection,
        } => cmd_explain(config_path, &document, &selection).await,
        Command::Key { action } => match action {
            KeyAction::Set => cmd_key_set(config_path).await,
            KeyAction::Clear => cmd_key_clear(config_path).await,
            KeyAction::Status => cmd_key_status(config_path).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Config plus the credential store backed by the local database.
async fn open_credentials(config: &AppConfig) -> Result<Arc<CredentialStore>> {
    let db_path = config.storage.resolved_path()?;
    let storage = Storage::open(&db_path)
        .await
        .wrap_err_with(|| format!("opening {}", db_path.display()))?;
    Ok(Arc::new(CredentialStore::load(Arc::new(storage)).await?))
}

async fn open_dashboard(config_path: Option<PathBuf>) -> Result<Dashboard> {
    let config = resolve_config(config_path)?;
    let credentials = open_credentials(&config).await?;
    let pipeline = TransformationPipeline::from_config(&config.model, credentials)?;
    info!(model = %config.model.model, "pipeline ready");
    Ok(Dashboard::with_observer(
        Arc::new(pipeline),
        Arc::new(SpinnerObserver::new()),
    ))
}

async fn read_source(source: &TextSource) -> Result<String> {
    if let Some(text) = &source.text {
        return Ok(text.clone());
    }
    if let Some(path) = &source.file {
        return read_file(path).await;
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .wrap_err("reading stdin")?;
    Ok(text)
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("reading {}", path.display()))
}

async fn read_line() -> Result<Option<String>> {
    BufReader::new(tokio::io::stdin())
        .lines()
        .next_line()
        .await
        .wrap_err("reading stdin")
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_transform(
    config_path: Option<PathBuf>,
    feature: FeatureId,
    source: &TextSource,
) -> Result<()> {
    let dashboard = open_dashboard(config_path).await?;
    let text = read_source(source).await?;

    dashboard.run(feature, &text).await;
    print_final(&dashboard, feature, source.json)
}

fn print_final(dashboard: &Dashboard, feature: FeatureId, json: bool) -> Result<()> {
    let state = dashboard.state(feature);
    match (json, state.result()) {
        (true, Some(result)) => {
            println!("{}", serde_json::to_string_pretty(result)?);
            Ok(())
        }
        _ => render::print_state(&state),
    }
}

async fn cmd_decompose(
    config_path: Option<PathBuf>,
    source: &TextSource,
    check: &[u32],
) -> Result<()> {
    let dashboard = open_dashboard(config_path).await?;
    let goal = read_source(source).await?;

    dashboard.run(FeatureId::Tasks, &goal).await;
    for &id in check {
        if !dashboard.toggle_step(id) {
            eprintln!("No step {id} to tick off.");
        }
    }
    print_final(&dashboard, FeatureId::Tasks, source.json)
}

async fn cmd_focus(config_path: Option<PathBuf>, source: &TextSource, local: bool) -> Result<()> {
    let text = read_source(source).await?;

    let cursor = if local {
        FocusCursor::new(split_sentences(&text))
    } else {
        let dashboard = open_dashboard(config_path).await?;
        dashboard.run(FeatureId::Focus, &text).await;
        let state = dashboard.state(FeatureId::Focus);
        if let Some(failure) = state.failure() {
            return Err(render::failure_report(failure));
        }
        state.result().and_then(FocusCursor::from_result)
    };
    let Some(mut cursor) = cursor else {
        return Err(eyre!("Type or paste some text first."));
    };

    // Text piped through stdin leaves no terminal to step with.
    if source.text.is_none() && source.file.is_none() {
        let all = TaskResult::SentenceList(cursor.sentences().to_vec());
        print!("{}", render::format_result(&all));
        return Ok(());
    }

    println!("Enter/n: next   p: previous   q: quit\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let (position, total) = cursor.position();
        println!("[{position}/{total}] {}", cursor.current());

        let Some(line) = lines.next_line().await.wrap_err("reading stdin")? else {
            break;
        };
        match line.trim() {
            "" | "n" => {
                if !cursor.next() {
                    println!("That was the last sentence. Well done.");
                    break;
                }
            }
            "p" => {
                cursor.previous();
            }
            "q" => break,
            other => eprintln!("Unknown key '{other}'."),
        }
    }
    Ok(())
}

async fn cmd_ask(config_path: Option<PathBuf>, document: &Path, question: &str) -> Result<()> {
    let dashboard = open_dashboard(config_path).await?;
    let text = read_file(document).await?;
    let mut companion = ReadingCompanion::new(
        dashboard.pipeline().clone(),
        dashboard.slot(FeatureId::CompanionChat).clone(),
        dashboard.slot(FeatureId::CompanionExplain).clone(),
        text,
    );

    if companion.ask(question).await.is_none() {
        return Err(eyre!("Type a question first."));
    }
    print!("{}", render::format_transcript(companion.transcript()));

    match dashboard.state(FeatureId::CompanionChat).failure() {
        Some(failure) => Err(render::failure_report(failure)),
        None => Ok(()),
    }
}

async fn cmd_explain(
    config_path: Option<PathBuf>,
    document: &Path,
    selection: &str,
) -> Result<()> {
    let dashboard = open_dashboard(config_path).await?;
    let text = read_file(document).await?;
    let companion = ReadingCompanion::new(
        dashboard.pipeline().clone(),
        dashboard.slot(FeatureId::CompanionChat).clone(),
        dashboard.slot(FeatureId::CompanionExplain).clone(),
        text,
    );

    if companion.explain(selection).await.is_none() {
        println!("Select more than three characters to get an explanation.");
        return Ok(());
    }
    render::print_state(&dashboard.state(FeatureId::CompanionExplain))
}

async fn cmd_key_set(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let credentials = open_credentials(&config).await?;

    if let Some(current) = credentials.get() {
        println!("Current key: {current}");
    }
    eprint!("Paste your API key and press Enter: ");
    let line = read_line().await?.unwrap_or_default();

    credentials.set(&line).await?;
    if let Some(saved) = credentials.get() {
        println!("Saved key {saved}.");
    }
    Ok(())
}

async fn cmd_key_clear(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let credentials = open_credentials(&config).await?;
    credentials.clear().await?;
    println!("API key removed.");
    Ok(())
}

async fn cmd_key_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let credentials = open_credentials(&config).await?;
    match credentials.get() {
        Some(key) => println!("API key: {key}"),
        None => println!("No API key configured. Run `clearmind key set` to add one."),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
