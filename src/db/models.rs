//! Records persisted by the storage layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GateError;

/// How careful a caller should be before piping a script into `sh`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DangerLevel {
    #[default]
    Safe,
    Caution,
    Destructive,
}

impl TryFrom<u8> for DangerLevel {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DangerLevel::Safe),
            1 => Ok(DangerLevel::Caution),
            2 => Ok(DangerLevel::Destructive),
            other => Err(GateError::BadRequest(format!(
                "danger_level must be 0, 1 or 2 (got {other})"
            ))),
        }
    }
}

impl From<DangerLevel> for u8 {
    fn from(level: DangerLevel) -> Self {
        match level {
            DangerLevel::Safe => 0,
            DangerLevel::Caution => 1,
            DangerLevel::Destructive => 2,
        }
    }
}

/// A stored script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    pub id: String,
    pub path: String,
    pub name: String,
    pub content: String,
    pub locked: bool,
    /// Argon2id PHC string; present iff locked and a password was set
    pub password_hash: Option<String>,
    pub danger_level: DangerLevel,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub requires: Option<String>,
    pub examples: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An explicit folder record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderRecord {
    pub id: String,
    pub path: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Where a request came from. Recorded for audit, never enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A gating token bound to exactly one script
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokenRecord {
    pub token: String,
    pub script_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

/// Audit event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UnlockSuccess,
    UnlockFailed,
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UnlockSuccess => "UNLOCK_SUCCESS",
            AuditAction::UnlockFailed => "UNLOCK_FAILED",
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit log entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub entity_path: Option<String>,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Audit entry about a script
    pub fn for_script(action: AuditAction, script: &ScriptRecord, provenance: Provenance) -> Self {
        Self {
            action,
            entity_type: "script".to_string(),
            entity_id: Some(script.id.clone()),
            entity_path: Some(script.path.clone()),
            provenance,
            created_at: Utc::now(),
        }
    }
}

/// Historical content of a script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionRecord {
    pub script_id: String,
    pub version: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
