//! HTTP server implementation
//!
//! hyper http1 with TokioIo. Bodies are buffered (and capped) before routing,
//! so every handler works on a plain `Request<Bytes>`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::LockGate;
use crate::config::Args;
use crate::db::ScriptStore;
use crate::negotiate::classify_headers;
use crate::routes;
use crate::services::ScriptService;
use crate::templates::Templates;
use crate::types::{GateError, Result};

/// Request bodies above this size are rejected with 413
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Storage backend shared by every component
    pub store: Arc<dyn ScriptStore>,
    /// Locked-script gate
    pub gate: LockGate,
    /// Admin write/read paths
    pub scripts: ScriptService,
    /// Generated shell helpers rendered against the public base URL
    pub templates: Templates,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn ScriptStore>) -> Self {
        let templates = Templates::new(args.base_url());
        Self {
            gate: LockGate::new(Arc::clone(&store)),
            scripts: ScriptService::new(Arc::clone(&store)),
            templates,
            store,
            args,
            started_at: Instant::now(),
        }
    }
}

/// Accept connections until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "shgate listening on {} (public URL {}, store {})",
        state.args.listen,
        state.templates.base_url(),
        state.store.backend()
    );

    if state.args.admin_token().is_none() {
        warn!("ADMIN_TOKEN not set - /api/* is open to anyone who can reach this server");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Buffer the body, then route
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(ip = %addr.ip(), path = %parts.uri.path(), "Request body too large");
            return Ok(routes::text_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large\n",
                None,
            ));
        }
        Err(e) => {
            return Ok(routes::text_error(&GateError::BadRequest(format!(
                "Failed to read body: {e}"
            ))));
        }
    };

    Ok(dispatch(&state, Some(addr), Request::from_parts(parts, bytes)).await)
}

/// Route a buffered request
pub async fn dispatch(
    state: &AppState,
    remote: Option<SocketAddr>,
    req: Request<Bytes>,
) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let kind = classify_headers(req.headers());
    // HEAD is routed as GET; the body is dropped below
    let is_head = method == Method::HEAD;
    let route_method = if is_head { Method::GET } else { method.clone() };

    let response = match (route_method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),

        (Method::GET, "/") => routes::root(state, kind),
        (Method::GET, "/help.sh") => routes::help(state),
        (Method::GET, "/search.sh") => routes::search(state),
        (Method::GET, "/_catalog.json") => routes::catalog(state).await,
        (Method::POST, "/_auth/unlock") => routes::unlock(state, &req, remote).await,

        // Admin API
        (_, p) if p == "/api" || p.starts_with("/api/") => {
            routes::handle_admin(state, &req, remote).await
        }

        // Scripts by path
        (Method::GET, p) if p.ends_with(crate::paths::SCRIPT_SUFFIX) => {
            routes::script(state, &req).await
        }

        (Method::GET, p) => routes::fallback(state, kind, p),

        _ => routes::text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed\n",
            None,
        ),
    };

    let response = if is_head {
        let (parts, _) = response.into_parts();
        Response::from_parts(parts, Full::new(Bytes::new()))
    } else {
        response
    };

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        client = ?kind,
        "request"
    );

    response
}
