//! Admin JSON API under /api/*
//!
//! Guarded by `X-Admin-Token: <t>` or `Authorization: Bearer <t>` when an
//! admin token is configured.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::AUTHORIZATION;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use tracing::warn;

use super::{error_response, json_response, no_content, parse_json_body, provenance, query_param};
use crate::server::AppState;
use crate::services::{FolderInput, ScriptInput};
use crate::types::{GateError, Result};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// True when the request may use the admin API
pub fn is_admin(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    let header_token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let bearer_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    [header_token, bearer_token]
        .into_iter()
        .flatten()
        .any(|supplied| constant_time_eq(supplied.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Entry point for every /api/* request
pub async fn handle_admin(
    state: &AppState,
    req: &Request<Bytes>,
    remote: Option<SocketAddr>,
) -> Response<Full<Bytes>> {
    if !is_admin(state.args.admin_token(), req.headers()) {
        warn!(path = %req.uri().path(), ip = ?remote.map(|a| a.ip()), "Rejected admin request");
        return error_response(&GateError::Unauthorized("Admin token required".into()));
    }

    match route(state, req, remote).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn route(
    state: &AppState,
    req: &Request<Bytes>,
    remote: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>> {
    let path = req.uri().path();
    let segments: Vec<&str> = path
        .trim_start_matches("/api")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let svc = &state.scripts;
    let method = if *req.method() == Method::HEAD {
        Method::GET
    } else {
        req.method().clone()
    };

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["scripts"]) => json_response(StatusCode::OK, &svc.list_scripts().await?),
        (&Method::POST, ["scripts"]) => {
            let input: ScriptInput = parse_json_body(req.body())?;
            let created = svc.create_script(input, provenance(req, remote)).await?;
            json_response(StatusCode::CREATED, &created)
        }
        (&Method::GET, ["scripts", id]) => json_response(StatusCode::OK, &svc.get_script(id).await?),
        (&Method::PUT, ["scripts", id]) => {
            let input: ScriptInput = parse_json_body(req.body())?;
            let updated = svc.update_script(id, input, provenance(req, remote)).await?;
            json_response(StatusCode::OK, &updated)
        }
        (&Method::DELETE, ["scripts", id]) => {
            svc.delete_script(id, provenance(req, remote)).await?;
            no_content()
        }
        (&Method::GET, ["scripts", id, "versions"]) => {
            json_response(StatusCode::OK, &svc.list_versions(id).await?)
        }
        (&Method::GET, ["tree"]) => json_response(StatusCode::OK, &svc.tree().await?),
        (&Method::GET, ["folders"]) => json_response(StatusCode::OK, &svc.list_folders().await?),
        (&Method::POST, ["folders"]) => {
            let input: FolderInput = parse_json_body(req.body())?;
            json_response(StatusCode::CREATED, &svc.create_folder(input).await?)
        }
        (&Method::DELETE, ["folders", id]) => {
            svc.delete_folder(id).await?;
            no_content()
        }
        (&Method::GET, ["search"]) => {
            let query = query_param(req.uri(), "q").unwrap_or_default();
            json_response(StatusCode::OK, &svc.search(&query).await?)
        }
        _ => return Err(GateError::NotFound(format!("No admin route for {} {}", req.method(), path))),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_open_when_no_token_configured() {
        assert!(is_admin(None, &HeaderMap::new()));
    }

    #[test]
    fn test_accepts_either_header() {
        assert!(is_admin(Some("s3cret"), &headers(&[("x-admin-token", "s3cret")])));
        assert!(is_admin(Some("s3cret"), &headers(&[("authorization", "Bearer s3cret")])));
    }

    #[test]
    fn test_rejects_wrong_or_missing() {
        assert!(!is_admin(Some("s3cret"), &HeaderMap::new()));
        assert!(!is_admin(Some("s3cret"), &headers(&[("x-admin-token", "s3cre")])));
        assert!(!is_admin(Some("s3cret"), &headers(&[("authorization", "s3cret")])));
    }
}
