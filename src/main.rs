//! llama-stream CLI - submit a Llama-2 generation and stream the tokens

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use llama_stream::{
    api::GenerationOverrides,
    config::Config,
    tui::{render_stream, ThinkingSpinner},
    Connector, GenerationRequest,
};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "llama-stream")]
#[command(about = "Stream Llama-2 chat generations from a hosted inference API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Config file (default: ~/.config/llama-stream/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a prompt and stream the generated text to stdout
    Generate(PromptArgs),

    /// Submit a prompt and print the stream URL without reading it
    Submit(PromptArgs),

    /// Stream the output of an already submitted prediction
    Stream {
        /// Stream URL returned by `submit`
        #[arg(short, long)]
        url: String,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct PromptArgs {
    /// User prompt
    #[arg(short, long)]
    prompt: String,

    /// System prompt (default: from config)
    #[arg(short, long)]
    system: Option<String>,

    #[arg(long)]
    top_k: Option<i64>,

    #[arg(long)]
    top_p: Option<i64>,

    #[arg(short, long)]
    temperature: Option<f64>,

    #[arg(long)]
    length_penalty: Option<i64>,

    #[arg(short, long)]
    max_new_tokens: Option<i64>,

    /// Template with {system_prompt} and {prompt} placeholders
    #[arg(long)]
    prompt_template: Option<String>,

    #[arg(long)]
    presence_penalty: Option<i64>,

    #[command(flatten)]
    endpoint: EndpointArgs,
}

#[derive(Args)]
struct EndpointArgs {
    /// Predictions endpoint (overrides config/env)
    #[arg(long)]
    api_url: Option<String>,

    /// API token (overrides config/env)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (API key masked)
    Show,

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

impl PromptArgs {
    fn overrides(&self) -> GenerationOverrides {
        GenerationOverrides {
            top_k: self.top_k,
            top_p: self.top_p,
            temperature: self.temperature,
            length_penalty: self.length_penalty,
            max_new_tokens: self.max_new_tokens,
            prompt_template: self.prompt_template.clone(),
            presence_penalty: self.presence_penalty,
        }
    }

    fn request(&self, config: &Config) -> GenerationRequest {
        let system = self
            .system
            .clone()
            .unwrap_or_else(|| config.generation.system_prompt.clone());
        let overrides = self.overrides().or(config.generation.overrides.clone());
        GenerationRequest::new_custom(self.prompt.clone(), system, overrides)
    }
}

impl EndpointArgs {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.connector.api_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.connector.api_key = Some(key.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG takes precedence over --log-level
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Generate(args) => {
            run_generate(&config_path, args).await?;
        }
        Commands::Submit(args) => {
            run_submit(&config_path, args).await?;
        }
        Commands::Stream { url, endpoint } => {
            run_stream(&config_path, url, endpoint).await?;
        }
        Commands::Config(cmd) => {
            run_config_command(&config_path, cmd)?;
        }
    }

    Ok(())
}

fn load_connector(config_path: &Path, endpoint: &EndpointArgs) -> Result<(Config, Connector)> {
    let config = endpoint.apply(Config::load_from(config_path.to_path_buf())?);
    let connector = config
        .connector()
        .context("Cannot build connector; run `llama-stream config init` or set LLAMA_STREAM_API_KEY")?;
    Ok((config, connector))
}

async fn run_generate(config_path: &Path, args: PromptArgs) -> Result<()> {
    let (config, connector) = load_connector(config_path, &args.endpoint)?;
    let request = args.request(&config);

    let stream = connector
        .generate(&request)
        .await
        .context("Prediction submission failed")?;

    let spinner = if io::stderr().is_terminal() {
        ThinkingSpinner::new()
    } else {
        ThinkingSpinner::hidden()
    };

    let mut stdout = io::stdout().lock();
    let summary = render_stream(stream, &mut stdout, spinner).await?;
    writeln!(stdout)?;

    info!(
        fragments = summary.fragments,
        bytes = summary.bytes,
        first_fragment_ms = summary.first_fragment_after.map(|d| d.as_millis() as u64),
        "Generation complete"
    );
    Ok(())
}

async fn run_submit(config_path: &Path, args: PromptArgs) -> Result<()> {
    let (config, connector) = load_connector(config_path, &args.endpoint)?;
    let request = args.request(&config);

    let url = connector
        .submit(&request)
        .await
        .context("Prediction submission failed")?;
    println!("{}", url);
    Ok(())
}

async fn run_stream(config_path: &Path, url: String, endpoint: EndpointArgs) -> Result<()> {
    let (_, connector) = load_connector(config_path, &endpoint)?;
    let stream = connector.stream(url);

    let mut stdout = io::stdout().lock();
    let summary = render_stream(stream, &mut stdout, ThinkingSpinner::hidden()).await?;
    writeln!(stdout)?;

    info!(fragments = summary.fragments, "Stream complete");
    Ok(())
}

fn run_config_command(config_path: &Path, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            config_init(config_path, force)?;
        }
        ConfigCommands::Show => {
            config_show(config_path)?;
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
        }
        ConfigCommands::Validate => {
            let config = Config::load_from(config_path.to_path_buf())?;
            config.validate()?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn config_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(config_path.to_path_buf())?;

    println!("Configuration file created at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to add your API token, or");
    println!("  2. Set an environment variable:");
    println!("     export LLAMA_STREAM_API_KEY=your_token");
    Ok(())
}

fn config_show(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path.to_path_buf())?.redacted();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
