//! Token supply and expiry sweep

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::ScriptStore;

/// Pick the gating token a caller supplied.
///
/// The `token` query parameter wins over an `Authorization: Bearer` header.
pub fn extract_token<'a>(
    query_token: Option<&'a str>,
    auth_header: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Some(token);
    }
    auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Periodically delete expired tokens.
///
/// Expiry is enforced on read, so this only keeps the table small.
pub fn spawn_token_sweep_task(store: Arc<dyn ScriptStore>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match store.delete_expired_tokens(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => debug!("Token sweep: removed {} expired tokens", removed),
                Err(e) => warn!("Token sweep failed: {}", e),
            }
        }
    });
    info!("Token sweep task started (every {}s)", interval.as_secs());
}
