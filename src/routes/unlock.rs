//! POST /_auth/unlock

use bytes::Bytes;
use chrono::SecondsFormat;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use super::{error_response, json_response, parse_json_body, provenance};
use crate::paths::validate_script_path;
use crate::server::AppState;
use crate::types::GateError;

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub path: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub token: String,
    /// RFC 3339
    pub expires_at: String,
}

pub async fn unlock(
    state: &AppState,
    req: &Request<Bytes>,
    remote: Option<SocketAddr>,
) -> Response<Full<Bytes>> {
    let body: UnlockRequest = match parse_json_body(req.body()) {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };

    let path = match validate_script_path(&body.path) {
        Ok(path) => path,
        Err(e) => return error_response(&e),
    };

    let script = match state.store.get_script_by_path(&path).await {
        Ok(Some(script)) => script,
        Ok(None) => return error_response(&GateError::NotFound("Script not found".into())),
        Err(e) => return error_response(&e),
    };

    match state
        .gate
        .verify_password(&script, &body.password, provenance(req, remote))
        .await
    {
        Ok(issued) => {
            let mut response = json_response(
                StatusCode::OK,
                &UnlockResponse {
                    token: issued.token,
                    expires_at: issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            );
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(e) => error_response(&e),
    }
}
