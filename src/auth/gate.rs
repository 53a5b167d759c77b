//! Password -> token -> gated content
//!
//! Validation is lazy: a token is checked against its script and expiry on
//! every gated request. Callers never learn why a token was refused.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::password;
use crate::db::{AuditAction, AuditEntry, AuthTokenRecord, Provenance, ScriptRecord, ScriptStore};
use crate::types::{GateError, Result};

/// Lifetime of a gating token. Fixed, never renewed.
pub const TOKEN_TTL_SECS: i64 = 300;

/// Outcome of asking for a script's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    NeedsPassword,
}

/// A freshly minted gating token
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// True when `record` unlocks `script_id` at instant `now`
pub fn token_grants(record: &AuthTokenRecord, script_id: &str, now: DateTime<Utc>) -> bool {
    record.script_id == script_id && record.expires_at > now
}

pub struct LockGate {
    store: Arc<dyn ScriptStore>,
}

impl LockGate {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self { store }
    }

    pub fn is_locked(&self, script: &ScriptRecord) -> bool {
        script.locked
    }

    pub async fn request_access(
        &self,
        script: &ScriptRecord,
        supplied_token: Option<&str>,
    ) -> Result<Access> {
        self.request_access_at(script, supplied_token, Utc::now()).await
    }

    /// Decide access at an explicit instant
    pub async fn request_access_at(
        &self,
        script: &ScriptRecord,
        supplied_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Access> {
        if !script.locked {
            return Ok(Access::Granted);
        }

        let Some(token) = supplied_token.filter(|t| !t.is_empty()) else {
            return Ok(Access::NeedsPassword);
        };

        let granted = match self.store.get_auth_token(token).await? {
            Some(record) => token_grants(&record, &script.id, now),
            None => false,
        };

        if granted {
            debug!(path = %script.path, "Gating token accepted");
            Ok(Access::Granted)
        } else {
            debug!(path = %script.path, "Gating token rejected");
            Ok(Access::NeedsPassword)
        }
    }

    pub async fn verify_password(
        &self,
        script: &ScriptRecord,
        password: &str,
        provenance: Provenance,
    ) -> Result<IssuedToken> {
        self.verify_password_at(script, password, provenance, Utc::now())
            .await
    }

    /// Check a password and mint a token expiring `TOKEN_TTL_SECS` after `now`
    pub async fn verify_password_at(
        &self,
        script: &ScriptRecord,
        password: &str,
        provenance: Provenance,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        if !script.locked {
            return Err(GateError::NotLocked(format!(
                "{} does not require a password",
                script.path
            )));
        }
        let Some(hash) = script.password_hash.clone() else {
            error!(path = %script.path, "Locked script has no password hash");
            return Err(GateError::Misconfigured(
                "Script is locked but has no password configured".into(),
            ));
        };

        let candidate = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&candidate, &hash))
                .await
                .map_err(|e| GateError::Internal(format!("Password check aborted: {e}")))??;

        if !matches {
            warn!(path = %script.path, ip = ?provenance.ip_address, "Unlock failed");
            self.audit(AuditAction::UnlockFailed, script, provenance)
                .await;
            return Err(GateError::Unauthorized("Invalid password".into()));
        }

        let record = AuthTokenRecord {
            token: Uuid::new_v4().to_string(),
            script_id: script.id.clone(),
            expires_at: now + Duration::seconds(TOKEN_TTL_SECS),
            created_at: now,
            provenance: provenance.clone(),
        };
        self.store.create_auth_token(&record).await?;

        info!(path = %script.path, expires_at = %record.expires_at, "Unlock succeeded");
        self.audit(AuditAction::UnlockSuccess, script, provenance)
            .await;

        Ok(IssuedToken {
            token: record.token,
            expires_at: record.expires_at,
        })
    }

    /// Audit writes on the unlock path never change the outcome
    async fn audit(&self, action: AuditAction, script: &ScriptRecord, provenance: Provenance) {
        let entry = AuditEntry::for_script(action, script, provenance);
        if let Err(e) = self.store.create_audit_log(&entry).await {
            error!(action = %action, path = %script.path, "Failed to write audit entry: {}", e);
        }
    }
}
