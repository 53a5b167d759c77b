//! Script and folder management
//!
//! Create, update (including moves) and delete keep ancestor folders in place
//! before the script row is written. Version history and the audit log are
//! written after the row and are best-effort: a failure there is logged and
//! the write still succeeds, so a retry never meets a half-created script.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::catalog::{build_catalog, build_tree, CatalogEntry, TreeNode};
use crate::db::{
    AuditAction, AuditEntry, DangerLevel, FolderRecord, Provenance, ScriptRecord, ScriptStore,
    VersionRecord,
};
use crate::folders::FolderSynthesizer;
use crate::paths::{leaf_name, validate_folder_path, validate_script_path};
use crate::types::{GateError, Result};

/// Body of create and update requests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptInput {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub locked: bool,
    /// Plain-text password; only meaningful when `locked`
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub danger_level: DangerLevel,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub examples: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderInput {
    pub path: String,
}

/// Admin view of a script. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptView {
    pub id: String,
    pub path: String,
    pub name: String,
    pub content: String,
    pub description: String,
    pub tags: String,
    pub locked: bool,
    pub danger_level: DangerLevel,
    pub requires: String,
    pub examples: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScriptRecord> for ScriptView {
    fn from(s: ScriptRecord) -> Self {
        Self {
            id: s.id,
            path: s.path,
            name: s.name,
            content: s.content,
            description: s.description.unwrap_or_default(),
            tags: s.tags.unwrap_or_default(),
            locked: s.locked,
            danger_level: s.danger_level,
            requires: s.requires.unwrap_or_default(),
            examples: s.examples.unwrap_or_default(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Empty strings are stored as absent
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn hash_off_thread(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| GateError::Internal(format!("Password hashing aborted: {e}")))?
}

pub struct ScriptService {
    store: Arc<dyn ScriptStore>,
    folders: FolderSynthesizer,
}

impl ScriptService {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self {
            folders: FolderSynthesizer::new(Arc::clone(&store)),
            store,
        }
    }

    pub async fn list_scripts(&self) -> Result<Vec<ScriptView>> {
        Ok(self
            .store
            .list_scripts()
            .await?
            .into_iter()
            .map(ScriptView::from)
            .collect())
    }

    pub async fn get_script(&self, id: &str) -> Result<ScriptView> {
        self.require_script(id).await.map(ScriptView::from)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<ScriptView>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GateError::BadRequest("Query parameter 'q' is required".into()));
        }
        Ok(self
            .store
            .search_scripts(query)
            .await?
            .into_iter()
            .map(ScriptView::from)
            .collect())
    }

    pub async fn create_script(
        &self,
        input: ScriptInput,
        provenance: Provenance,
    ) -> Result<ScriptView> {
        let path = validate_script_path(&input.path)?;

        let password_hash = match input.password.filter(|p| !p.is_empty()) {
            Some(password) if input.locked => Some(hash_off_thread(password).await?),
            _ => None,
        };
        if input.locked && password_hash.is_none() {
            warn!(path = %path, "Locked script created without a password; unlock will fail");
        }

        self.folders.ensure_ancestors(&path).await?;

        let now = Utc::now();
        let script = ScriptRecord {
            id: Uuid::new_v4().to_string(),
            name: leaf_name(&path).to_string(),
            path,
            content: input.content,
            locked: input.locked,
            password_hash,
            danger_level: input.danger_level,
            description: optional(input.description),
            tags: optional(input.tags),
            requires: optional(input.requires),
            examples: optional(input.examples),
            created_at: now,
            updated_at: now,
        };

        self.store.create_script(&script).await.map_err(|e| match e {
            GateError::Conflict(_) => {
                GateError::Conflict("Script with this path already exists".into())
            }
            other => other,
        })?;

        self.record_version(&script, 1, now).await;
        self.record_audit(AuditAction::Create, &script, provenance)
            .await;

        info!(id = %script.id, path = %script.path, locked = script.locked, "Script created");
        Ok(script.into())
    }

    pub async fn update_script(
        &self,
        id: &str,
        input: ScriptInput,
        provenance: Provenance,
    ) -> Result<ScriptView> {
        let path = validate_script_path(&input.path)?;
        let existing = self.require_script(id).await?;

        let password_hash = if input.locked {
            match input.password.filter(|p| !p.is_empty()) {
                Some(password) => Some(hash_off_thread(password).await?),
                None => existing.password_hash.clone(),
            }
        } else {
            None
        };

        if path != existing.path {
            if let Some(owner) = self.store.get_script_by_path(&path).await? {
                if owner.id != existing.id {
                    return Err(GateError::Conflict(format!(
                        "Script with path {path} already exists"
                    )));
                }
            }
            self.folders.ensure_ancestors(&path).await?;
            debug!(id = %id, from = %existing.path, to = %path, "Moving script");
        }

        let now = Utc::now();
        let content_changed = existing.content != input.content;
        let script = ScriptRecord {
            id: existing.id.clone(),
            name: leaf_name(&path).to_string(),
            path,
            content: input.content,
            locked: input.locked,
            password_hash,
            danger_level: input.danger_level,
            description: optional(input.description),
            tags: optional(input.tags),
            requires: optional(input.requires),
            examples: optional(input.examples),
            created_at: existing.created_at,
            updated_at: now,
        };
        self.store.update_script(&script).await?;

        if content_changed {
            match self.store.list_versions(id).await {
                Ok(versions) => {
                    let next = versions.first().map_or(1, |latest| latest.version + 1);
                    self.record_version(&script, next, now).await;
                }
                Err(e) => {
                    error!(id = %script.id, "Failed to read version history: {}", e);
                }
            }
        }

        self.record_audit(AuditAction::Update, &script, provenance)
            .await;

        info!(id = %script.id, path = %script.path, content_changed, "Script updated");
        Ok(script.into())
    }

    pub async fn delete_script(&self, id: &str, provenance: Provenance) -> Result<()> {
        let script = self.require_script(id).await?;
        if !self.store.delete_script(id).await? {
            return Err(GateError::NotFound("Script not found".into()));
        }
        self.record_audit(AuditAction::Delete, &script, provenance)
            .await;

        info!(id = %id, path = %script.path, "Script deleted");
        Ok(())
    }

    pub async fn list_versions(&self, id: &str) -> Result<Vec<VersionRecord>> {
        self.require_script(id).await?;
        self.store.list_versions(id).await
    }

    pub async fn list_folders(&self) -> Result<Vec<FolderRecord>> {
        self.store.list_folders().await
    }

    pub async fn create_folder(&self, input: FolderInput) -> Result<FolderRecord> {
        let path = validate_folder_path(&input.path)?;
        let folder = self.folders.ensure_folder(&path).await?;
        info!(id = %folder.id, path = %folder.path, "Folder ensured");
        Ok(folder)
    }

    /// Remove a folder and every folder below it; scripts stay where they are
    pub async fn delete_folder(&self, id: &str) -> Result<usize> {
        let folder = self
            .store
            .get_folder(id)
            .await?
            .ok_or_else(|| GateError::NotFound("Folder not found".into()))?;
        let removed = self.store.delete_folder_tree(&folder.path).await?;
        info!(path = %folder.path, removed, "Folder tree deleted");
        Ok(removed)
    }

    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(build_catalog(&self.store.list_scripts().await?))
    }

    pub async fn tree(&self) -> Result<TreeNode> {
        let scripts = self.store.list_scripts().await?;
        let folders = self.store.list_folders().await?;
        Ok(build_tree(&scripts, &folders))
    }

    async fn record_version(&self, script: &ScriptRecord, version: i64, at: DateTime<Utc>) {
        let record = VersionRecord {
            script_id: script.id.clone(),
            version,
            content: script.content.clone(),
            created_at: at,
        };
        if let Err(e) = self.store.create_version(&record).await {
            error!(id = %script.id, version, "Failed to write script version: {}", e);
        }
    }

    async fn record_audit(&self, action: AuditAction, script: &ScriptRecord, provenance: Provenance) {
        let entry = AuditEntry::for_script(action, script, provenance);
        if let Err(e) = self.store.create_audit_log(&entry).await {
            error!(action = %action, path = %script.path, "Failed to write audit entry: {}", e);
        }
    }

    async fn require_script(&self, id: &str) -> Result<ScriptRecord> {
        self.store
            .get_script(id)
            .await?
            .ok_or_else(|| GateError::NotFound("Script not found".into()))
    }
}
