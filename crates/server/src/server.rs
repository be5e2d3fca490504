//! File server runtime.
//!
//! Owns the resolved root and the shared request state, binds the
//! listener, and serves until cancelled.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use sftt_protocol::DEFAULT_ALLOWED_IP;
use sftt_transfer::AtomicFileWriter;

use crate::router::{ServerState, build_router};
use crate::{AccessGate, PathResolver, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory to serve. Canonicalized when the server is created.
    pub root: PathBuf,
    /// Source addresses allowed to issue requests.
    pub allow_list: Vec<String>,
    /// Where uploads are staged before publishing (system temp dir if unset).
    pub staging_dir: Option<PathBuf>,
    /// Largest accepted upload body (unlimited if unset).
    pub max_body_bytes: Option<u64>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            allow_list: vec![DEFAULT_ALLOWED_IP.to_string()],
            staging_dir: None,
            max_body_bytes: None,
        }
    }
}

/// The SFTT HTTP server.
pub struct FileServer {
    state: Arc<ServerState>,
    cancel: CancellationToken,
}

impl FileServer {
    /// Validates the options and prepares the shared state.
    ///
    /// Fails if the root does not exist or is not a directory, or if the
    /// staging directory cannot be created.
    pub fn new(options: ServerOptions) -> Result<Self, ServerError> {
        let root = std::fs::canonicalize(&options.root)?;
        if !root.is_dir() {
            return Err(ServerError::InvalidRoot(root));
        }

        let staging_dir = options.staging_dir.unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&staging_dir)?;

        let state = ServerState {
            gate: AccessGate::new(&options.allow_list),
            resolver: PathResolver::new(root),
            writer: AtomicFileWriter::new(staging_dir).with_max_bytes(options.max_body_bytes),
        };

        Ok(Self {
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.state.resolver.root()
    }

    pub fn allow_list(&self) -> &[String] {
        self.state.gate.allowed()
    }

    pub fn staging_dir(&self) -> &Path {
        self.state.writer.staging_dir()
    }

    /// Builds the axum router. Must be served with connect info, see
    /// [`FileServer::serve`].
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Token that stops [`FileServer::serve`] when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops accepting connections and lets in-flight requests finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds `addr` and serves until shutdown.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            root = %self.root().display(),
            allow = ?self.allow_list(),
            "file server listening on {local_addr}"
        );

        let cancel = self.cancel.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

        tracing::info!("file server shutting down");
        Ok(())
    }
}
