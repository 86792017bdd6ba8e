use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arxiv_safety_trends::collector::{self, RunSummary};
use arxiv_safety_trends::config::{load_config, write_config, PipelineConfig};
use arxiv_safety_trends::fetch::ArxivClient;
use arxiv_safety_trends::publish::publish_artifacts;
use arxiv_safety_trends::serve;

const DEFAULT_LOG_FILTER: &str = "arxiv_safety_trends=info,info";

#[derive(Parser, Debug)]
#[command(
    name = "arxiv-safety-trends",
    version,
    about = "Collects recent arXiv papers, flags AI safety research and publishes dashboard data"
)]
struct Cli {
    #[arg(long, global = true, default_value = "pipeline_config.json")]
    config: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Write the resolved pipeline config to disk before running"
    )]
    write_config: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the trailing window and rewrite the artifacts (default).
    #[command(name = "update")]
    Update,
    /// Fetch whole past months into the historical artifacts.
    #[command(name = "backfill")]
    Backfill(BackfillArgs),
    /// Copy the artifacts into the frontend data directory.
    #[command(name = "publish")]
    Publish,
    #[command(name = "run-all", alias = "run_all")]
    RunAll,
    #[command(name = "serve")]
    Serve(ServeCommandArgs),
}

#[derive(Args, Debug, Clone)]
struct BackfillArgs {
    #[arg(long, help = "Months to fetch, current month included [default: history_months]")]
    months: Option<u32>,
}

#[derive(Args, Debug, Clone)]
struct ServeCommandArgs {
    #[arg(long, default_value_t = 5000, help = "port to serve on")]
    port: u16,
    #[arg(long = "per-page", help = "papers per page in /api/papers")]
    per_page: Option<usize>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
}

fn run_update(config: &PipelineConfig) -> Result<RunSummary, String> {
    let client = ArxivClient::new(config).map_err(|err| err.to_string())?;
    let summary = collector::run_update(&client, config, Local::now().naive_local())
        .map_err(|err| err.to_string())?;
    if !summary.failed.is_empty() {
        warn!(failed = ?summary.failed, "some categories could not be fetched");
    }
    Ok(summary)
}

fn run_backfill(config: &PipelineConfig, args: &BackfillArgs) -> Result<RunSummary, String> {
    let months = args.months.unwrap_or(config.history_months);
    let client = ArxivClient::new(config).map_err(|err| err.to_string())?;
    collector::run_backfill(&client, config, Local::now().naive_local(), months)
        .map_err(|err| err.to_string())
}

fn run_publish(config: &PipelineConfig) -> Result<(), String> {
    publish_artifacts(&config.output_dir, &config.frontend_data_dir)
        .map(|copied| info!(copied, "publish finished"))
        .map_err(|err| err.to_string())
}

fn static_root(frontend_data_dir: &Path) -> PathBuf {
    frontend_data_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| frontend_data_dir.to_path_buf())
}

fn dispatch_command(command: Commands, config: &PipelineConfig) -> Result<(), String> {
    match command {
        Commands::Update => run_update(config).map(|_| ()),
        Commands::Backfill(args) => run_backfill(config, &args).map(|_| ()),
        Commands::Publish => run_publish(config),
        Commands::RunAll => {
            let summary = run_update(config)?;
            if summary.written {
                run_publish(config)
            } else {
                info!("nothing new written, skipping publish");
                Ok(())
            }
        }
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|err| format!("Failed to create runtime: {err}"))?;
            let serve_args = serve::ServeArgs::new(
                args.port,
                args.per_page,
                config.frontend_data_dir.clone(),
                static_root(&config.frontend_data_dir),
            );
            rt.block_on(serve::run_with_args(serve_args))
                .map_err(|err| format!("serve failed: {err}"))
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    if cli.write_config {
        if let Err(err) = write_config(&cli.config, &config) {
            error!("{err}");
            std::process::exit(1);
        }
    }

    let command = cli.command.unwrap_or(Commands::Update);
    if let Err(err) = dispatch_command(command, &config) {
        error!("{err}");
        std::process::exit(1);
    }
}
