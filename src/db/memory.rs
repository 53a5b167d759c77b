//! In-memory store
//!
//! Concurrent maps keyed the same way the SQL schema is constrained, so the
//! uniqueness guarantees match the SQLite backend. Used for tests and for
//! `--in-memory` dev runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::debug;

use super::{
    matches_query, AuditEntry, AuthTokenRecord, FolderRecord, ScriptRecord, ScriptStore,
    VersionRecord,
};
use crate::types::{GateError, Result};

/// Store backed by concurrent hash maps
pub struct MemoryStore {
    /// Scripts by id
    scripts: DashMap<String, ScriptRecord>,
    /// Unique path index: path -> script id
    script_paths: DashMap<String, String>,
    /// Folders by path
    folders: DashMap<String, FolderRecord>,
    /// Tokens by token string
    tokens: DashMap<String, AuthTokenRecord>,
    /// Versions by script id, oldest first
    versions: DashMap<String, Vec<VersionRecord>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            scripts: DashMap::new(),
            script_paths: DashMap::new(),
            folders: DashMap::new(),
            tokens: DashMap::new(),
            versions: DashMap::new(),
            audit: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the audit log, oldest first
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of live token records (expired ones included until swept)
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_script_by_path(&self, path: &str) -> Result<Option<ScriptRecord>> {
        let id = match self.script_paths.get(path) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        Ok(self.scripts.get(&id).map(|s| s.value().clone()))
    }

    async fn get_script(&self, id: &str) -> Result<Option<ScriptRecord>> {
        Ok(self.scripts.get(id).map(|s| s.value().clone()))
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptRecord>> {
        let mut scripts: Vec<ScriptRecord> =
            self.scripts.iter().map(|s| s.value().clone()).collect();
        scripts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(scripts)
    }

    async fn search_scripts(&self, query: &str) -> Result<Vec<ScriptRecord>> {
        let needle = query.to_ascii_lowercase();
        let mut scripts: Vec<ScriptRecord> = self
            .scripts
            .iter()
            .filter(|s| matches_query(s.value(), &needle))
            .map(|s| s.value().clone())
            .collect();
        scripts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(scripts)
    }

    async fn create_script(&self, script: &ScriptRecord) -> Result<()> {
        if self.scripts.contains_key(&script.id) {
            return Err(GateError::Conflict(format!("script id {} already exists", script.id)));
        }
        match self.script_paths.entry(script.path.clone()) {
            Entry::Occupied(_) => Err(GateError::Conflict(format!(
                "script with path {} already exists",
                script.path
            ))),
            Entry::Vacant(slot) => {
                slot.insert(script.id.clone());
                self.scripts.insert(script.id.clone(), script.clone());
                Ok(())
            }
        }
    }

    async fn update_script(&self, script: &ScriptRecord) -> Result<()> {
        let old_path = match self.scripts.get(&script.id) {
            Some(existing) => existing.path.clone(),
            None => return Err(GateError::NotFound(format!("script {}", script.id))),
        };

        if old_path != script.path {
            match self.script_paths.entry(script.path.clone()) {
                Entry::Occupied(_) => {
                    return Err(GateError::Conflict(format!(
                        "script with path {} already exists",
                        script.path
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(script.id.clone());
                }
            }
            self.script_paths.remove_if(&old_path, |_, id| id == &script.id);
        }

        self.scripts.insert(script.id.clone(), script.clone());
        Ok(())
    }

    async fn delete_script(&self, id: &str) -> Result<bool> {
        let Some((_, removed)) = self.scripts.remove(id) else {
            return Ok(false);
        };
        self.script_paths.remove_if(&removed.path, |_, owner| owner == id);
        self.tokens.retain(|_, token| token.script_id != id);
        self.versions.remove(id);
        Ok(true)
    }

    async fn list_folders(&self) -> Result<Vec<FolderRecord>> {
        let mut folders: Vec<FolderRecord> =
            self.folders.iter().map(|f| f.value().clone()).collect();
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(folders)
    }

    async fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>> {
        Ok(self
            .folders
            .iter()
            .find(|f| f.value().id == id)
            .map(|f| f.value().clone()))
    }

    async fn get_folder_by_path(&self, path: &str) -> Result<Option<FolderRecord>> {
        Ok(self.folders.get(path).map(|f| f.value().clone()))
    }

    async fn create_folder(&self, folder: &FolderRecord) -> Result<()> {
        match self.folders.entry(folder.path.clone()) {
            Entry::Occupied(_) => Err(GateError::Conflict(format!(
                "folder {} already exists",
                folder.path
            ))),
            Entry::Vacant(slot) => {
                slot.insert(folder.clone());
                Ok(())
            }
        }
    }

    async fn delete_folder_tree(&self, path: &str) -> Result<usize> {
        let prefix = format!("{path}/");
        let before = self.folders.len();
        self.folders
            .retain(|folder_path, _| folder_path != path && !folder_path.starts_with(&prefix));
        Ok(before.saturating_sub(self.folders.len()))
    }

    async fn get_auth_token(&self, token: &str) -> Result<Option<AuthTokenRecord>> {
        Ok(self.tokens.get(token).map(|t| t.value().clone()))
    }

    async fn create_auth_token(&self, record: &AuthTokenRecord) -> Result<()> {
        if !self.scripts.contains_key(&record.script_id) {
            return Err(GateError::NotFound(format!("script {}", record.script_id)));
        }
        match self.tokens.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(GateError::Conflict("token already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.expires_at > now);
        let removed = before.saturating_sub(self.tokens.len());
        debug!(removed, "Swept expired tokens from memory store");
        Ok(removed)
    }

    async fn create_audit_log(&self, entry: &AuditEntry) -> Result<()> {
        let mut log = self
            .audit
            .lock()
            .map_err(|e| GateError::Internal(format!("Lock poisoned: {}", e)))?;
        log.push(entry.clone());
        Ok(())
    }

    async fn create_version(&self, version: &VersionRecord) -> Result<()> {
        self.versions
            .entry(version.script_id.clone())
            .or_default()
            .push(version.clone());
        Ok(())
    }

    async fn list_versions(&self, script_id: &str) -> Result<Vec<VersionRecord>> {
        let mut versions = self
            .versions
            .get(script_id)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }
}
