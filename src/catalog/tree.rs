//! Hierarchical view built as an explicit trie over scripts and folders
//!
//! Folder records and the ancestor chains of script paths are inserted
//! segment by segment, so every node has exactly one parent no matter the
//! insertion order. Implied folders carry no id until a folder record with
//! the same path supplies one.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{FolderRecord, ScriptRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "is_false")]
    pub locked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TreeNode {
    /// Find a descendant by absolute path
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

/// Working node; children keyed so folders sort before scripts
struct TrieNode {
    id: Option<String>,
    name: String,
    path: String,
    kind: NodeKind,
    locked: bool,
    children: BTreeMap<(NodeKind, String), TrieNode>,
}

impl TrieNode {
    fn folder(name: &str, path: String) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            path,
            kind: NodeKind::Folder,
            locked: false,
            children: BTreeMap::new(),
        }
    }

    /// Walk (creating as needed) the folder chain for `segments`
    fn descend(&mut self, segments: &[&str]) -> &mut TrieNode {
        let mut node = self;
        for segment in segments {
            let path = child_path(&node.path, segment);
            node = node
                .children
                .entry((NodeKind::Folder, segment.to_string()))
                .or_insert_with(|| TrieNode::folder(segment, path));
        }
        node
    }

    fn freeze(self) -> TreeNode {
        TreeNode {
            id: self.id,
            name: self.name,
            path: self.path,
            kind: self.kind,
            locked: self.locked,
            children: self.children.into_values().map(TrieNode::freeze).collect(),
        }
    }
}

fn child_path(parent: &str, segment: &str) -> String {
    if parent == "/" {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Merge explicit folders with folders implied by script paths
pub fn build_tree(scripts: &[ScriptRecord], folders: &[FolderRecord]) -> TreeNode {
    let mut root = TrieNode::folder("/", "/".to_string());
    root.id = Some("root".to_string());

    for folder in folders {
        let parts = segments(&folder.path);
        if parts.is_empty() {
            continue;
        }
        root.descend(&parts).id = Some(folder.id.clone());
    }

    for script in scripts {
        let parts = segments(&script.path);
        let Some((leaf, parents)) = parts.split_last() else {
            continue;
        };
        let parent = root.descend(parents);
        let path = child_path(&parent.path, leaf);
        parent.children.insert(
            (NodeKind::Script, leaf.to_string()),
            TrieNode {
                id: Some(script.id.clone()),
                name: leaf.to_string(),
                path,
                kind: NodeKind::Script,
                locked: script.locked,
                children: BTreeMap::new(),
            },
        );
    }

    root.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DangerLevel;
    use chrono::Utc;

    fn script(id: &str, path: &str) -> ScriptRecord {
        let now = Utc::now();
        ScriptRecord {
            id: id.to_string(),
            path: path.to_string(),
            name: crate::paths::leaf_name(path).to_string(),
            content: String::new(),
            locked: false,
            password_hash: None,
            danger_level: DangerLevel::Safe,
            description: None,
            tags: None,
            requires: None,
            examples: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn folder(id: &str, path: &str) -> FolderRecord {
        FolderRecord {
            id: id.to_string(),
            path: path.to_string(),
            name: crate::paths::leaf_name(path).to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_tree_is_bare_root() {
        let tree = build_tree(&[], &[]);
        assert_eq!(tree.id.as_deref(), Some("root"));
        assert_eq!(tree.path, "/");
        assert!(tree.children.is_empty());
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "folder");
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_implied_folders_have_no_id() {
        let tree = build_tree(&[script("s", "/x/y/z.sh")], &[]);
        let x = tree.find("/x").unwrap();
        assert_eq!(x.id, None);
        assert_eq!(x.kind, NodeKind::Folder);
        assert_eq!(tree.find("/x/y/z.sh").unwrap().id.as_deref(), Some("s"));
    }

    #[test]
    fn test_explicit_folder_id_survives_script_insert() {
        let tree = build_tree(&[script("s", "/a/b.sh")], &[folder("fa", "/a")]);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.find("/a").unwrap().id.as_deref(), Some("fa"));
    }

    #[test]
    fn test_folders_before_scripts() {
        let tree = build_tree(&[script("1", "/a.sh"), script("2", "/z/q.sh")], &[]);
        let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a.sh"]);
    }

    #[test]
    fn test_locked_flag_serialized_only_when_set() {
        let mut locked = script("1", "/l.sh");
        locked.locked = true;
        let tree = build_tree(&[locked, script("2", "/o.sh")], &[]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["children"][0]["locked"], true);
        assert!(json["children"][1].get("locked").is_none());
    }
}
