//! Read-only projections over scripts and folders

pub mod tree;

use serde::Serialize;

use crate::db::ScriptRecord;

pub use tree::{build_tree, NodeKind, TreeNode};

/// Public listing entry. Carries no content and no password material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub locked: bool,
}

impl From<&ScriptRecord> for CatalogEntry {
    fn from(script: &ScriptRecord) -> Self {
        Self {
            path: script.path.clone(),
            name: script.name.clone(),
            description: non_empty(script.description.as_deref()),
            tags: non_empty(script.tags.as_deref()),
            locked: script.locked,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Flat listing of every script, sorted by path (byte order)
pub fn build_catalog(scripts: &[ScriptRecord]) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = scripts.iter().map(CatalogEntry::from).collect();
    entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DangerLevel;
    use chrono::Utc;

    fn script(path: &str, locked: bool) -> ScriptRecord {
        let now = Utc::now();
        ScriptRecord {
            id: path.to_string(),
            path: path.to_string(),
            name: crate::paths::leaf_name(path).to_string(),
            content: "echo top-secret".to_string(),
            locked,
            password_hash: locked.then(|| "$argon2id$v=19$hash".to_string()),
            danger_level: DangerLevel::Safe,
            description: Some(String::new()),
            tags: Some("ops".to_string()),
            requires: None,
            examples: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sorted_by_path_bytes() {
        let scripts = vec![script("/b.sh", false), script("/B.sh", false), script("/a/z.sh", false)];
        let paths: Vec<String> = build_catalog(&scripts).into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/B.sh", "/a/z.sh", "/b.sh"]);
    }

    #[test]
    fn test_never_leaks_secrets() {
        let json = serde_json::to_string(&build_catalog(&[script("/s.sh", true)])).unwrap();
        assert!(json.contains(r#""locked":true"#));
        assert!(!json.contains("top-secret"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("content"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_empty_metadata_omitted() {
        let value = serde_json::to_value(CatalogEntry::from(&script("/s.sh", false))).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["tags"], "ops");
    }
}
