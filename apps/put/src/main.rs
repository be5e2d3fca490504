//! SFTT upload entry point.

mod config;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sftt_client::{
    BatchTally, HttpUploader, ProgressEvent, ProgressKind, TransferOrchestrator,
};

use crate::config::{ConfigLayer, Settings, Source};

/// Uploads a file or a directory tree to an SFTT server.
#[derive(Debug, Parser)]
#[command(name = "sftt-put", version, about)]
struct Args {
    /// File to upload
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Directory to upload recursively
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Server address, host:port/path [default: 127.0.0.1:12345/data]
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Per-file timeout in milliseconds, 0 to disable [default: 20000]
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl Args {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            file: self.file,
            dir: self.dir,
            server: self.server,
            timeout_ms: self.timeout_ms,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = Args::parse();
    let file_layer = match args.config.take() {
        Some(path) => ConfigLayer::load(&path)?,
        None => ConfigLayer::default(),
    };
    let settings = Settings::resolve(file_layer.overlay(args.into_layer()))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(settings))
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let uploader = HttpUploader::new(settings.server)?;
    let orchestrator = TransferOrchestrator::new(uploader).with_timeout(settings.timeout);
    tracing::info!(server = %orchestrator.uploader().address(), "remote server");

    match settings.source {
        Source::File(path) => upload_file(&orchestrator, &path).await,
        Source::Dir(path) => upload_dir(&orchestrator, &path).await,
        Source::Nothing => anyhow::bail!("nothing to upload: pass --file or --dir"),
    }
}

async fn upload_file(
    orchestrator: &TransferOrchestrator<HttpUploader>,
    path: &Path,
) -> anyhow::Result<()> {
    tracing::info!("[1/1] uploading {}", path.display());
    let result = orchestrator.put_file(path).await?;
    tracing::info!(
        key = %result.key,
        md5 = %result.checksum,
        "[1/1] uploaded {}",
        path.display()
    );
    Ok(())
}

async fn upload_dir(
    orchestrator: &TransferOrchestrator<HttpUploader>,
    path: &Path,
) -> anyhow::Result<()> {
    tracing::info!("uploading directory {}", path.display());

    let mut tally = BatchTally::default();
    orchestrator
        .put_dir(path, |event| {
            tally.record(event);
            log_event(event);
        })
        .await?;

    if tally.failed > 0 {
        tracing::error!("uploaded {} files, {} failed", tally.total, tally.failed);
        anyhow::bail!("{} of {} uploads failed", tally.failed, tally.total);
    }
    tracing::info!("uploaded {} files, {} failed", tally.total, tally.failed);
    Ok(())
}

fn log_event(event: &ProgressEvent) {
    let file = event.item.source_path.display();
    let (done, total) = (event.completed_count, event.total_count);
    match &event.kind {
        ProgressKind::Started => tracing::info!("[{done}/{total}] uploading {file}"),
        ProgressKind::Succeeded(result) => tracing::info!(
            key = %result.key,
            md5 = %result.checksum,
            "[{done}/{total}] uploaded {file}"
        ),
        ProgressKind::Failed(err) => {
            tracing::error!(key = %event.item.key, "[{done}/{total}] upload failed {file}: {err}")
        }
    }
}
