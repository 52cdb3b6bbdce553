mod config;
mod format;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use chunkup_client::{
    HttpStore, RemoteStore, UploadDriver, UploadRegistry, UploadRequest,
};
use chunkup_protocol::{FileCategory, UploadMetadata, UploadStatus};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "chunkup", version, about = "Chunked, resumable file uploads")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/chunkup/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store API base URL
    #[arg(long, env = "CHUNKUP_SERVER", global = true)]
    server: Option<String>,

    /// Bearer token for the store
    #[arg(long, env = "CHUNKUP_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one or more files
    Upload(UploadArgs),

    /// Show what the store holds for an upload
    Status {
        /// Upload id assigned by the store
        server_upload_id: String,
    },
}

#[derive(clap::Args)]
struct UploadArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// File category; detected from --mime-type when omitted
    #[arg(long, value_enum)]
    category: Option<Category>,

    #[arg(long)]
    mime_type: Option<String>,

    #[arg(long)]
    project_id: Option<Uuid>,

    #[arg(long)]
    client_id: Option<Uuid>,

    #[arg(long)]
    stage_id: Option<Uuid>,

    #[arg(long)]
    description: Option<String>,

    /// Chunk transfers in flight per file
    #[arg(long)]
    concurrency: Option<usize>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    Document,
    Image,
    Video,
    Plan,
    Render,
    Contract,
}

impl From<Category> for FileCategory {
    fn from(c: Category) -> Self {
        match c {
            Category::Document => FileCategory::Document,
            Category::Image => FileCategory::Image,
            Category::Video => FileCategory::Video,
            Category::Plan => FileCategory::Plan,
            Category::Render => FileCategory::Render,
            Category::Contract => FileCategory::Contract,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chunkup=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = CliConfig::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        cfg.server_url = server;
    }
    if let Some(token) = cli.token {
        cfg.auth_token = Some(token);
    }

    match cli.command {
        Command::Upload(args) => upload(cfg, args).await,
        Command::Status { server_upload_id } => {
            status(cfg, &server_upload_id).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn http_store(cfg: &CliConfig) -> anyhow::Result<Arc<HttpStore>> {
    let store = HttpStore::new(
        &cfg.server_url,
        cfg.auth_token.as_deref(),
        cfg.upload.request_timeout(),
    )
    .with_context(|| format!("cannot create client for {}", cfg.server_url))?;
    Ok(Arc::new(store))
}

/// Exit status of a run interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

async fn upload(mut cfg: CliConfig, args: UploadArgs) -> anyhow::Result<ExitCode> {
    if let Some(concurrency) = args.concurrency {
        cfg.upload.concurrency = concurrency;
    }
    if let Some(chunk_size) = args.chunk_size {
        cfg.upload.chunk_size = chunk_size;
    }

    let store = http_store(&cfg)?;
    let registry = Arc::new(UploadRegistry::new(UploadDriver::new(store, cfg.upload)));

    let ctrl_c_registry = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling uploads");
            ctrl_c_registry.cancel_all();
        }
    });

    let bars = MultiProgress::new();
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .context("invalid progress template")?
        .progress_chars("=>-");

    let mut watchers = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let mut request = UploadRequest::new(path);
        if let Some(mime_type) = &args.mime_type {
            request = request.with_mime_type(mime_type.clone());
        }
        let metadata = UploadMetadata {
            category: args
                .category
                .map(FileCategory::from)
                .unwrap_or(request.metadata.category),
            project_id: args.project_id,
            client_id: args.client_id,
            stage_id: args.stage_id,
            description: args.description.clone(),
        };
        let request = request.with_metadata(metadata);

        let bar = bars.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(request.display_name());

        let upload_id = registry.start(request);
        let rx = registry
            .progress_of(&upload_id)
            .context("upload vanished right after start")?;
        watchers.push(tokio::spawn(watch_upload(rx, bar)));
    }

    let mut failed = 0;
    let mut cancelled = 0;
    for watcher in watchers {
        match watcher.await? {
            UploadStatus::Error => failed += 1,
            UploadStatus::Cancelled => cancelled += 1,
            _ => {}
        }
    }
    // Cancelled drivers still have to tell the store to discard their chunks.
    registry.wait_idle().await;

    let counts = registry.counts();
    tracing::info!(
        completed = counts.completed,
        failed,
        cancelled,
        overall = registry.overall_progress(),
        "all uploads finished"
    );
    match batch_outcome(failed, cancelled) {
        BatchOutcome::Failed => bail!("{failed} of {} uploads failed", args.files.len()),
        BatchOutcome::Interrupted => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        BatchOutcome::Succeeded => Ok(ExitCode::SUCCESS),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum BatchOutcome {
    Succeeded,
    Failed,
    Interrupted,
}

/// Any failure outranks cancellation.
fn batch_outcome(failed: usize, cancelled: usize) -> BatchOutcome {
    if failed > 0 {
        BatchOutcome::Failed
    } else if cancelled > 0 {
        BatchOutcome::Interrupted
    } else {
        BatchOutcome::Succeeded
    }
}

/// Mirrors one upload's progress stream onto `bar` until it is terminal.
async fn watch_upload(
    mut rx: tokio::sync::watch::Receiver<chunkup_protocol::ProgressSnapshot>,
    bar: ProgressBar,
) -> UploadStatus {
    loop {
        let snapshot = rx.borrow_and_update().clone();
        bar.set_position(snapshot.progress.round() as u64);
        bar.set_message(format::status_line(&snapshot));
        if snapshot.status.is_terminal() {
            match snapshot.status {
                UploadStatus::Completed => bar.finish(),
                _ => bar.abandon(),
            }
            return snapshot.status;
        }
        if rx.changed().await.is_err() {
            bar.abandon();
            return rx.borrow().status;
        }
    }
}

async fn status(cfg: CliConfig, server_upload_id: &str) -> anyhow::Result<()> {
    let store = http_store(&cfg)?;
    let status = store
        .status(server_upload_id)
        .await
        .with_context(|| format!("cannot fetch status of {server_upload_id}"))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
