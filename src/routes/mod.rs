//! HTTP route handlers
//!
//! Handlers receive a fully buffered `Request<Bytes>` and return
//! `Response<Full<Bytes>>`; the server owns body collection and logging.

pub mod admin;
pub mod health;
pub mod public;
pub mod unlock;

pub use admin::{handle_admin, is_admin};
pub use health::health_check;
pub use public::{catalog, fallback, help, root, script, search};
pub use unlock::unlock;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use hyper::{Request, Response, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use tracing::error;

use crate::db::Provenance;
use crate::types::GateError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(json)))
            .unwrap(),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from_static(
                    br#"{"error":"Internal serialization error","code":"INTERNAL"}"#,
                )))
                .unwrap()
        }
    }
}

/// JSON response with an explicit Cache-Control value
pub fn json_cached<T: Serialize>(
    status: StatusCode,
    body: &T,
    cache_control: &'static str,
) -> Response<Full<Bytes>> {
    let mut response = json_response(status, body);
    if response.status() == status {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }
    response
}

pub fn text_response(
    status: StatusCode,
    body: impl Into<Bytes>,
    cache_control: Option<&'static str>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, TEXT_PLAIN);
    if let Some(value) = cache_control {
        builder = builder.header(CACHE_CONTROL, value);
    }
    builder.body(Full::new(body.into())).unwrap()
}

pub fn html_response(body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(body.into()))
        .unwrap()
}

pub fn no_content() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn log_server_error(err: &GateError) {
    if err.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
        error!(code = err.code(), "Request failed: {}", err);
    }
}

/// Error as `{"error", "code"}`
pub fn error_response(err: &GateError) -> Response<Full<Bytes>> {
    log_server_error(err);
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.public_message(),
            code: err.code().to_string(),
        },
    )
}

/// Error as plain text, for routes consumed by `curl | sh`
pub fn text_error(err: &GateError) -> Response<Full<Bytes>> {
    log_server_error(err);
    text_response(err.status_code(), format!("{}\n", err.public_message()), None)
}

/// Decode a JSON request body
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, GateError> {
    serde_json::from_slice(body)
        .map_err(|e| GateError::BadRequest(format!("Invalid request body: {e}")))
}

/// First value of a query parameter
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Caller details recorded in the audit log
pub fn provenance(req: &Request<Bytes>, remote: Option<SocketAddr>) -> Provenance {
    Provenance {
        ip_address: remote.map(|addr| addr.ip().to_string()),
        user_agent: req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_decodes() {
        let uri: Uri = "/a.sh?preview=1&token=abc%2Ddef&token=second".parse().unwrap();
        assert_eq!(query_param(&uri, "token").as_deref(), Some("abc-def"));
        assert_eq!(query_param(&uri, "preview").as_deref(), Some("1"));
        assert_eq!(query_param(&uri, "missing"), None);
        assert_eq!(query_param(&"/a.sh".parse().unwrap(), "token"), None);
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(&GateError::NotFound("Script not found".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}
