//! Request dispatch and the failure boundary.
//!
//! There are no routes: every request lands in one fallback that checks
//! the allow-list, dispatches on the method, and turns handler errors
//! into statuses. Once a streamed body has started, a failure can only
//! abort the connection; hyper does that when the body stream errors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, info_span, warn};

use sftt_transfer::AtomicFileWriter;

use crate::handlers;
use crate::{AccessGate, PathResolver, RequestError};

/// Shared per-server state handed to every request.
pub(crate) struct ServerState {
    pub(crate) gate: AccessGate,
    pub(crate) resolver: PathResolver,
    pub(crate) writer: AtomicFileWriter,
}

pub(crate) fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    let peer = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    info_span!(
                        "request",
                        peer,
                        method = %request.method(),
                        path = request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

async fn dispatch(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match handle(&state, peer, request).await {
        Ok(response) => {
            info!(%peer, %method, path, status = response.status().as_u16(), "request served");
            response
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!(%peer, %method, path, status = status.as_u16(), "request failed: {e}");
            } else {
                warn!(%peer, %method, path, status = status.as_u16(), "request rejected: {e}");
            }
            e.into_response()
        }
    }
}

async fn handle(
    state: &ServerState,
    peer: SocketAddr,
    request: Request,
) -> Result<Response, RequestError> {
    if !state.gate.admits(peer.ip()) {
        return Err(RequestError::AccessDenied(peer.ip()));
    }

    match *request.method() {
        Method::GET => handlers::get_entry(state, request.uri().path()).await,
        Method::PUT => {
            let (parts, body) = request.into_parts();
            handlers::put_entry(state, parts.uri.path(), &parts.headers, body).await
        }
        ref other => Err(RequestError::MethodNotAllowed(other.to_string())),
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
