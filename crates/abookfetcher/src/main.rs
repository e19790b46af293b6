use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use abookfetcher::http::HttpClient;
use abookfetcher::{
    doctor, fetch_descriptor, FetchError, Fetcher, FetcherConfig, FfmpegRunner, SiteLoader,
};

#[derive(Parser)]
#[command(
    name = "abookfetcher",
    about = "Download an audiobook page into a chaptered m4b",
    version,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true,
    after_help = "PATH may contain @author, @title and @narrator, e.g. \"$HOME/Books/@author/@title.m4b\"."
)]
struct Cli {
    /// Book page URL
    #[arg(required = true)]
    url: Option<String>,

    /// Output path template
    #[arg(required = true)]
    path: Option<String>,

    /// Enable verbose/debug logging and show ffmpeg output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Chromium executable (overrides ABOOK_CHROMIUM_PATH)
    #[arg(long, global = true)]
    chromium: Option<PathBuf>,

    /// ffmpeg executable (overrides ABOOK_FFMPEG_PATH)
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Overall deadline for reading the book page, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the book descriptor as JSON without downloading anything
    Describe {
        /// Book page URL
        url: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

impl Cli {
    fn config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::from_env();
        if let Some(p) = &self.chromium {
            config.chromium_path = Some(p.clone());
        }
        if let Some(p) = &self.ffmpeg {
            config.ffmpeg_path = Some(p.clone());
        }
        if let Some(secs) = self.timeout {
            config.descriptor_timeout = Duration::from_secs(secs);
        }
        if self.headful {
            config.headless = false;
        }
        config.verbose = self.verbose;
        config
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw.trim()).map_err(|e| FetchError::Usage(format!("invalid URL '{raw}': {e}")))
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let config = cli.config();

    match cli.command {
        Some(Commands::Describe { url }) => {
            let url = parse_url(&url)?;
            let loader = SiteLoader::new(config.renderer_options(), config.loader_settings());
            let book = fetch_descriptor(&loader, &url, config.descriptor_timeout, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&book)?);
            Ok(())
        }
        Some(Commands::Doctor) => {
            doctor::print(&doctor::check(&config));
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "abookfetcher", &mut std::io::stdout());
            Ok(())
        }
        None => {
            let (Some(url), Some(template)) = (cli.url, cli.path) else {
                return Err(FetchError::Usage("expected <URL> <PATH>".to_string()).into());
            };
            let url = parse_url(&url)?;

            let runner = FfmpegRunner::locate(config.ffmpeg_path.as_deref(), !config.verbose)?;
            let http = HttpClient::new(config.http_timeout)?;
            let loader = SiteLoader::new(config.renderer_options(), config.loader_settings());
            let fetcher = Fetcher::new(Arc::new(loader), Arc::new(runner), http, config);

            let output = fetcher
                .fetch(&url, &template, cancel)
                .await
                .with_context(|| format!("failed to fetch {url}"))?;
            info!("saved {}", output.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, shutting down");
            interrupt.cancel();
        }
    });

    let result = run(cli, &cancel).await;

    // 0=success, 1=error, 130=interrupted
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        let interrupted = cancel.is_cancelled()
            || matches!(e.downcast_ref::<FetchError>(), Some(FetchError::Cancelled));
        std::process::exit(if interrupted { 130 } else { 1 });
    }

    result
}
