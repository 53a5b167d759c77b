//! Content negotiation
//!
//! Decides whether a request comes from a command-line fetcher (which gets
//! plain-text shell) or from a browser (which gets HTML). All header
//! heuristics live here so handlers only see a [`ClientKind`].

use hyper::header::{HeaderName, ACCEPT, USER_AGENT};
use hyper::HeaderMap;

/// User-Agent fragments of known command-line HTTP clients
const CLI_SIGNATURES: &[&str] = &[
    "curl",
    "wget",
    "httpie",
    "fetch",
    "libfetch",
    "aria2",
    "python-requests",
    "go-http-client",
];

/// Who is asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Cli,
    Browser,
}

/// Classify a request from its User-Agent and Accept values.
///
/// Order matters: a CLI signature wins over Accept, an explicit `text/html`
/// Accept wins over the empty-UA fallback.
pub fn classify(user_agent: &str, accept: &str) -> ClientKind {
    let ua = user_agent.to_lowercase();
    if CLI_SIGNATURES.iter().any(|sig| ua.contains(sig)) {
        return ClientKind::Cli;
    }

    let wants_html = accept.contains("text/html");
    if wants_html {
        return ClientKind::Browser;
    }

    if ua.is_empty() {
        return ClientKind::Cli;
    }

    ClientKind::Browser
}

/// Classify from request headers; missing or non-UTF-8 headers count as empty
pub fn classify_headers(headers: &HeaderMap) -> ClientKind {
    classify(header_str(headers, USER_AGENT), header_str(headers, ACCEPT))
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> &str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}
