mod config;
mod output;
mod server;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use config::{AppConfig, PipelineArgs};
use georoute_model::RouteFile;
use georoute_trace::{HopSource, ReplayHopSource, SystemHopSource};
use server::AppState;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const ENV_LOG: &str = "GEOROUTE_LOG";
const ROUTE_FILE_VERSION: u32 = 1;

#[derive(Parser)]
#[command(name = "georoute", version, about = "Geolocated traceroute service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the trace API over HTTP
    Serve(ServeArgs),
    /// Run one trace and print or save the route
    Trace(TraceArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "GEOROUTE_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "GEOROUTE_PORT", default_value_t = 5000)]
    port: u16,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct TraceArgs {
    /// Domain or address to trace (defaults to --default-target)
    #[arg(long)]
    target: Option<String>,

    /// Write a route document here instead of printing the route
    #[arg(long)]
    out: Option<PathBuf>,

    /// Read hops from saved `traceroute -n` output instead of probing
    #[arg(long)]
    replay: Option<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        handler_token.cancel();
    })
    .context("failed to install interrupt handler")?;

    match cli.command {
        Commands::Serve(args) => run_serve(args, cancel).await,
        Commands::Trace(args) => run_trace(args, cancel).await,
    }
}

fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    // stdout carries the route; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .init();
}

async fn run_serve(args: ServeArgs, shutdown: CancellationToken) -> Result<()> {
    let config = AppConfig::from(&args.pipeline);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|err| anyhow!("invalid listen address {}:{}: {}", args.host, args.port, err))?;

    let source = Arc::new(SystemHopSource::new(config.trace.clone()));
    let pipeline = config.build_pipeline(source)?;
    tracing::info!(
        traceroute = %config.trace.program,
        geo_url = %config.geo.base_url,
        strict_exit = config.pipeline.strict_exit,
        "trace pipeline ready"
    );

    server::serve(addr, AppState::new(pipeline, shutdown)).await
}

async fn run_trace(args: TraceArgs, cancel: CancellationToken) -> Result<()> {
    let config = AppConfig::from(&args.pipeline);

    let mut target = args.target.clone();
    let source: Arc<dyn HopSource> = match &args.replay {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|err| anyhow!("failed to read replay file {:?}: {}", path, err))?;
            let fallback = target.as_deref().unwrap_or(&config.pipeline.default_target);
            let replay = ReplayHopSource::from_output(&contents, fallback)
                .with_context(|| format!("failed to parse replay file {:?}", path))?;
            tracing::info!(hops = replay.len(), path = %path.display(), "replaying saved trace");
            if target.is_none() {
                target = replay.target().map(str::to_string);
            }
            Arc::new(replay)
        }
        None => Arc::new(SystemHopSource::new(config.trace.clone())),
    };

    let pipeline = config.build_pipeline(source)?;
    let outcome = pipeline
        .trace(target.as_deref(), cancel)
        .await
        .context("traceroute failed")?;

    match args.out {
        Some(path) => {
            let file = RouteFile {
                version: ROUTE_FILE_VERSION,
                target: outcome.target,
                timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                route: outcome.route,
            };
            output::write_json(&path, &file)?;
            println!("wrote {} route entries to {}", file.route.len(), path.display());
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&outcome.route)?);
        }
    }

    Ok(())
}
