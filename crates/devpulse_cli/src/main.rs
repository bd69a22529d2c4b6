//! DevPulse CLI - run one extraction from GitHub into the warehouse.

mod config;
mod progress;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::{Term, style};
use devpulse::github::DEFAULT_API_URL;
use devpulse::{ApiRateLimiter, ExtractionMode, GitHubClient, Orchestrator, SqlWarehouse};
use tracing_subscriber::EnvFilter;

use crate::progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(version)]
#[command(about = "Extract GitHub activity into an analytical warehouse")]
#[command(
    long_about = "DevPulse lists your GitHub repositories and loads their commits, pull \
requests, reviews and language breakdowns into raw warehouse tables. Incremental runs \
only fetch commits and pull requests newer than the last successful extraction."
)]
#[command(after_long_help = r#"EXAMPLES
    Incremental run (default):
        $ devpulse

    Re-extract everything, ignoring watermarks:
        $ devpulse --full

    Process four repositories at a time:
        $ devpulse -c 4

CONFIGURATION
    DevPulse reads configuration from:
      1. ~/.config/devpulse/config.toml (or $XDG_CONFIG_HOME/devpulse/config.toml)
      2. ./devpulse.toml
      3. Environment variables (DEVPULSE_* prefix, e.g., DEVPULSE_WAREHOUSE_URL)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITHUB_TOKEN              GitHub personal access token (required)
    GITHUB_USERNAME           Account to extract (required)
    GCP_PROJECT_ID            Warehouse project identifier (required)
    DEVPULSE_WAREHOUSE_URL    Warehouse connection string
                              (default: ~/.local/state/devpulse/<project>.db)
    RUST_LOG                  Log filter (default: devpulse=info,devpulse_cli=info)

EXIT STATUS
    0 when every step succeeded, 1 when any step failed or startup failed.
"#)]
struct Cli {
    /// Ignore watermarks and extract everything
    #[arg(long)]
    full: bool,

    /// Repositories to process concurrently (default from config or 1)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long)]
    no_rate_limit: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Extraction could not start");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Structured logs on stdout when piped; warnings only on stderr for a TTY,
/// where progress bars own the screen.
fn init_tracing() {
    if Term::stdout().is_term() {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("devpulse=warn,devpulse_cli=warn"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("devpulse=info,devpulse_cli=info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = config::Config::load();
    let credentials = config.credentials()?;

    let warehouse_url = config
        .warehouse_url(&credentials.project)
        .ok_or("Failed to determine warehouse URL")?;
    ensure_sqlite_parent_dir(&warehouse_url)?;

    let warehouse = Arc::new(SqlWarehouse::connect(&warehouse_url).await?);

    let rate_limiter = (!(cli.no_rate_limit || config.extract.no_rate_limit))
        .then(|| ApiRateLimiter::new(config.extract.requests_per_second));
    let api_url = config.github.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
    let client = Arc::new(GitHubClient::with_api_url(
        api_url,
        &credentials.token,
        &credentials.username,
        rate_limiter,
    )?);

    let mode = if cli.full {
        ExtractionMode::Full
    } else {
        ExtractionMode::Incremental
    };
    let concurrency = cli.concurrency.unwrap_or(config.extract.concurrency);
    tracing::info!(
        mode = ?mode,
        username = %credentials.username,
        project = %credentials.project,
        concurrency,
        "Starting DevPulse extraction"
    );

    let reporter = Arc::new(ProgressReporter::new());
    let summary = Orchestrator::new(client, warehouse.clone(), warehouse)
        .with_concurrency(concurrency)
        .with_progress(reporter.as_callback())
        .run(mode)
        .await;
    reporter.finish();

    println!("{summary}");

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Create the directory holding a file-backed SQLite warehouse.
fn ensure_sqlite_parent_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = Path::new(db_path.split('?').next().unwrap_or(db_path));

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Warehouse path '{}' is relative - behavior depends on current directory",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
