//! SFTT file server entry point.

mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sftt_server::FileServer;

use crate::config::{ConfigLayer, Settings};

/// Serves a directory over HTTP: GET downloads, PUT uploads.
#[derive(Debug, Parser)]
#[command(name = "sftt-server", version, about)]
struct Args {
    /// Allowed source IP addresses, comma-separated [default: 127.0.0.1]
    #[arg(short = 'i', long = "ip")]
    ip: Option<String>,

    /// Port to listen on [default: 12345]
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Root directory to serve [default: .]
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Directory for in-progress uploads [default: system temp dir]
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Reject upload bodies larger than this many bytes
    #[arg(long)]
    max_body_bytes: Option<u64>,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl Args {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            ip: self.ip,
            port: self.port,
            host: self.host,
            dir: self.dir,
            staging_dir: self.staging_dir,
            max_body_bytes: self.max_body_bytes,
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
    let settings = Settings::resolve(file_layer.overlay(args.into_layer()));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting SFTT server");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(settings))?;

    tracing::info!("server shut down cleanly");
    Ok(())
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.bind_addr()?;
    let server = FileServer::new(settings.server_options())?;

    tracing::info!(root = %server.root().display(), "serving directory");
    tracing::info!(allow = %server.allow_list().join(", "), "allowed source addresses");
    tracing::info!(staging = %server.staging_dir().display(), "staging uploads");

    let cancel = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    server.run(addr).await?;
    Ok(())
}
