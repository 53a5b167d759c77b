//! Public endpoints consumed by `curl | sh` and browsers

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::AUTHORIZATION;
use hyper::{Request, Response, StatusCode};
use tracing::debug;

use super::{html_response, json_cached, query_param, text_error, text_response};
use crate::auth::{extract_token, Access};
use crate::negotiate::ClientKind;
use crate::paths::validate_script_path;
use crate::server::AppState;
use crate::templates::render_preview;
use crate::types::GateError;

/// GET /
pub fn root(state: &AppState, kind: ClientKind) -> Response<Full<Bytes>> {
    match kind {
        ClientKind::Cli => text_response(StatusCode::OK, state.templates.root_hint(), None),
        ClientKind::Browser => html_response(state.templates.index_html()),
    }
}

/// GET /help.sh
pub fn help(state: &AppState) -> Response<Full<Bytes>> {
    text_response(StatusCode::OK, state.templates.help(), Some("max-age=300"))
}

/// GET /search.sh
pub fn search(state: &AppState) -> Response<Full<Bytes>> {
    text_response(StatusCode::OK, state.templates.search(), Some("no-cache"))
}

/// GET /_catalog.json
pub async fn catalog(state: &AppState) -> Response<Full<Bytes>> {
    match state.scripts.catalog().await {
        Ok(entries) => json_cached(StatusCode::OK, &entries, "max-age=60"),
        Err(e) => super::error_response(&e),
    }
}

/// GET /<path>.sh
///
/// The path is percent-decoded before validation.
/// Public scripts are cacheable; anything touching the gate is `no-store`.
pub async fn script(state: &AppState, req: &Request<Bytes>) -> Response<Full<Bytes>> {
    let decoded = match urlencoding::decode(req.uri().path()) {
        Ok(decoded) => decoded,
        Err(_) => {
            return text_error(&GateError::InvalidPath(
                "path is not valid percent-encoded UTF-8".into(),
            ))
        }
    };
    let path = match validate_script_path(&decoded) {
        Ok(path) => path,
        Err(e) => return text_error(&e),
    };

    let script = match state.store.get_script_by_path(&path).await {
        Ok(Some(script)) => script,
        Ok(None) => return text_error(&GateError::NotFound("Script not found".into())),
        Err(e) => return text_error(&e),
    };

    if query_param(req.uri(), "preview").as_deref() == Some("1") {
        return text_response(StatusCode::OK, render_preview(&script), Some("no-store"));
    }

    if !state.gate.is_locked(&script) {
        return text_response(StatusCode::OK, script.content, Some("max-age=60"));
    }

    let query_token = query_param(req.uri(), "token");
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = extract_token(query_token.as_deref(), auth_header);

    match state.gate.request_access(&script, token).await {
        Ok(Access::Granted) => text_response(StatusCode::OK, script.content, Some("no-store")),
        Ok(Access::NeedsPassword) => {
            debug!(path = %path, "Serving unlock prompt");
            text_response(
                StatusCode::OK,
                state.templates.unlock_prompt(&path),
                Some("no-store"),
            )
        }
        Err(e) => text_error(&e),
    }
}

/// Anything else: browsers get the landing page, CLI clients a 404
pub fn fallback(state: &AppState, kind: ClientKind, path: &str) -> Response<Full<Bytes>> {
    match kind {
        ClientKind::Browser => html_response(state.templates.index_html()),
        ClientKind::Cli => text_error(&GateError::NotFound(format!("No such path: {path}"))),
    }
}
