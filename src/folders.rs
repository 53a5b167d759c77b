//! Folder synthesis on the write path
//!
//! Every ancestor of a script gets an explicit folder record. The walk is
//! get-before-create and treats a losing insert race as success, so concurrent
//! writers converge on exactly one record per path.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::db::{FolderRecord, ScriptStore};
use crate::paths::{ancestor_folders, leaf_name};
use crate::types::{GateError, Result};

pub struct FolderSynthesizer {
    store: Arc<dyn ScriptStore>,
}

impl FolderSynthesizer {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self { store }
    }

    /// Make sure every proper prefix of `script_path` exists as a folder
    pub async fn ensure_ancestors(&self, script_path: &str) -> Result<()> {
        for (path, name) in ancestor_folders(script_path) {
            self.create_if_missing(&path, &name).await?;
        }
        Ok(())
    }

    /// Create `folder_path` and its ancestors, returning the folder's record
    pub async fn ensure_folder(&self, folder_path: &str) -> Result<FolderRecord> {
        self.ensure_ancestors(folder_path).await?;
        self.create_if_missing(folder_path, leaf_name(folder_path))
            .await
    }

    async fn create_if_missing(&self, path: &str, name: &str) -> Result<FolderRecord> {
        if let Some(existing) = self.store.get_folder_by_path(path).await? {
            return Ok(existing);
        }

        let folder = FolderRecord {
            id: Uuid::new_v4().to_string(),
            path: path.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        match self.store.create_folder(&folder).await {
            Ok(()) => {
                debug!(path = %path, "Created folder");
                Ok(folder)
            }
            // Lost the race to another writer
            Err(GateError::Conflict(_)) => self
                .store
                .get_folder_by_path(path)
                .await?
                .ok_or_else(|| GateError::Internal(format!("folder {path} vanished after conflict"))),
            Err(e) => Err(e),
        }
    }
}
