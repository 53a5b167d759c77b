//! Storage collaborator
//!
//! Everything the gate, catalog and admin paths need from durable storage is
//! expressed by [`ScriptStore`]. Components receive an `Arc<dyn ScriptStore>`
//! at construction time, so the SQLite backend and the in-memory backend are
//! interchangeable.
//!
//! Uniqueness of script paths, folder paths and token strings is the store's
//! responsibility; duplicate inserts fail with [`GateError::Conflict`].
//!
//! [`GateError::Conflict`]: crate::types::GateError::Conflict

pub mod memory;
pub mod models;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Result;

pub use memory::MemoryStore;
pub use models::{
    AuditAction, AuditEntry, AuthTokenRecord, DangerLevel, FolderRecord, Provenance, ScriptRecord,
    VersionRecord,
};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn get_script_by_path(&self, path: &str) -> Result<Option<ScriptRecord>>;
    async fn get_script(&self, id: &str) -> Result<Option<ScriptRecord>>;
    /// All scripts ordered by path
    async fn list_scripts(&self) -> Result<Vec<ScriptRecord>>;
    /// Substring match on path, name, description and tags. Only ASCII
    /// letters are case-folded, matching SQLite's `LIKE`.
    async fn search_scripts(&self, query: &str) -> Result<Vec<ScriptRecord>>;
    async fn create_script(&self, script: &ScriptRecord) -> Result<()>;
    /// Replace the record with the same id; may change its path
    async fn update_script(&self, script: &ScriptRecord) -> Result<()>;
    /// Delete a script together with its tokens and versions
    async fn delete_script(&self, id: &str) -> Result<bool>;

    /// All folders ordered by path
    async fn list_folders(&self) -> Result<Vec<FolderRecord>>;
    async fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>>;
    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>>;
    async fn create_folder(&self, folder: &FolderRecord) -> Result<()>;
    /// Delete the folder at `path` and every folder below it, matching the
    /// prefix case-sensitively. Scripts are untouched.
    async fn delete_folder_tree(&self, path: &str) -> Result<usize>;

    async fn get_auth_token(&self, token: &str) -> Result<Option<AuthTokenRecord>>;
    async fn create_auth_token(&self, record: &AuthTokenRecord) -> Result<()>;
    /// Remove tokens whose expiry is at or before `now`
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn create_audit_log(&self, entry: &AuditEntry) -> Result<()>;

    async fn create_version(&self, version: &VersionRecord) -> Result<()>;
    /// Versions of a script, newest first
    async fn list_versions(&self, script_id: &str) -> Result<Vec<VersionRecord>>;
}

/// True when `record` matches a search query (already ASCII lower-cased)
pub(crate) fn matches_query(record: &ScriptRecord, needle: &str) -> bool {
    let hit = |field: &str| field.to_ascii_lowercase().contains(needle);
    hit(&record.path)
        || hit(&record.name)
        || record.description.as_deref().is_some_and(hit)
        || record.tags.as_deref().is_some_and(hit)
}
